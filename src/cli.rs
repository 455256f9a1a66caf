use clap::Parser;
use std::path::PathBuf;

use crate::config::{DEFAULT_MAX_CSV_LINES, DEFAULT_OUTPUT_FILE_NAME};
use crate::record::MetadataField;

#[derive(Parser, Debug)]
#[command(name = "storage-report")]
#[command(version)]
#[command(about = "Pack file metadata into a zip of CSV chunks", long_about = None)]
#[command(after_help = "Examples:\n  \
  storage-report /srv /home            walk both trees, write storage_analytics_data.zip\n  \
  storage-report -m 1000 -f mtime,bytes,path /data\n  \
  storage-report -r storage_analytics_data.zip   read an archive back and summarize it\n  \
  storage-report -g '????_contents.csv' -o contents.zip /data   zip matching CSVs as they are\n  \
  storage-report -c '*.csv' -o contents.zip /data   merge matching CSVs under one header")]
pub struct Cli {
    /// Filesystem roots to walk (directories to search with --gather/--concat)
    #[arg(value_name = "PATHS", required_unless_present = "read")]
    pub paths: Vec<PathBuf>,

    /// Directory to write the archive into (default: current directory)
    #[arg(short = 'd', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Archive file name
    #[arg(
        short = 'o',
        long = "output-file-name",
        value_name = "NAME",
        default_value = DEFAULT_OUTPUT_FILE_NAME
    )]
    pub output_file_name: String,

    /// Data rows per CSV chunk
    #[arg(
        short = 'm',
        long = "max-csv-lines",
        value_name = "N",
        default_value_t = DEFAULT_MAX_CSV_LINES
    )]
    pub max_csv_lines: usize,

    /// Comma separated fields: mtime, bytes, atime, mode, path
    #[arg(
        short = 'f',
        long = "fields",
        value_name = "FIELDS",
        value_delimiter = ',',
        default_values_t = MetadataField::DEFAULT
    )]
    pub fields: Vec<MetadataField>,

    /// Store chunks uncompressed
    #[arg(long)]
    pub stored: bool,

    /// Read ARCHIVE back into one table and print a summary
    #[arg(short = 'r', long = "read", value_name = "ARCHIVE", conflicts_with = "paths")]
    pub read: Option<PathBuf>,

    /// Zip the CSV files in PATHS whose name matches PATTERN, unchanged
    #[arg(
        short = 'g',
        long = "gather",
        value_name = "PATTERN",
        conflicts_with_all = ["read", "concat"]
    )]
    pub gather: Option<String>,

    /// Merge the CSV files in PATHS whose name matches PATTERN into one CSV and zip it
    #[arg(short = 'c', long = "concat", value_name = "PATTERN", conflicts_with = "read")]
    pub concat: Option<String>,

    /// Rows to print with --read
    #[arg(long = "head", value_name = "N", default_value_t = 10, requires = "read")]
    pub head: usize,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Verbose logging
    #[arg(short = 'v', action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (0, 0) => "info",
            (1, _) => "warn",
            (q, _) if q > 1 => "error",
            (_, 1) => "debug",
            _ => "trace",
        }
    }
}
