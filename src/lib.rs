//! # storage-report
//!
//! Batch filesystem metadata into size-bounded CSV chunks packed into a zip
//! archive, and read such archives back into a single table.
//!
//! The writer walks one or more roots, records `mtime` and `bytes` (or any
//! configured [`MetadataField`]s) for every file, and flushes every
//! `max_csv_lines` records to a numbered CSV that is folded into the zip.
//! The reader extracts the CSV members one at a time and concatenates them
//! into an Arrow [`RecordBatch`](arrow::record_batch::RecordBatch).
//!
//! ## Features
//!
//! - Bounded memory: at most one chunk of records is held at a time
//! - Nothing is left at the destination or in temporary storage when a run
//!   fails or is interrupted
//! - Self-contained ZIP reader/appender (STORED and DEFLATE, ZIP64 reading)
//! - Per-field conversion hooks when reading, `mtime` to timestamp by default
//! - Packing existing CSV files by glob, as-is or merged under one header
//!
//! ## Example
//!
//! ```no_run
//! use storage_report::{ArchiveExtractor, Cancellation, ReportConfig, run_storage_report};
//!
//! fn main() -> storage_report::Result<()> {
//!     let config = ReportConfig::new(["/srv/data"])?.with_max_csv_lines(50_000);
//!     let archive = run_storage_report(&config, &Cancellation::new())?;
//!
//!     let table = ArchiveExtractor::new().extract_and_concat(&archive)?;
//!     println!("{} files", table.num_rows());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod pack;
pub mod record;
pub mod report;
mod scratch;
pub mod table;
pub mod zip;

pub use cli::Cli;
pub use config::ReportConfig;
pub use error::{Error, Result};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use pack::{CsvPacker, CsvSelection};
pub use record::{MetadataField, Record, Value};
pub use report::{
    ArchiveAppender, Cancellation, ChunkWriter, RecordBuffer, ReportRunner, run_storage_report,
};
pub use table::{ArchiveExtractor, ExtractOptions, Summary, UnifiedTable};
pub use zip::{ZipAppender, ZipExtractor, ZipFileEntry};
