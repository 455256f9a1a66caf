use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::record::MetadataField;
use crate::zip::CompressionMethod;

pub const DEFAULT_OUTPUT_FILE_NAME: &str = "storage_analytics_data.zip";
pub const DEFAULT_MAX_CSV_LINES: usize = 100_000;

/// Settings for one storage report run.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Filesystem roots to walk
    pub paths: Vec<PathBuf>,
    /// Header row and per-path transform, in column order
    pub csv_fieldnames: Vec<MetadataField>,
    /// Directory the finished archive is moved into
    pub output_path: PathBuf,
    pub output_file_name: String,
    /// Data rows per chunk file
    pub max_csv_lines: usize,
    pub compression: CompressionMethod,
    /// Parent of the scoped working directory; the system temp dir when unset
    pub temp_root: Option<PathBuf>,
}

impl ReportConfig {
    /// Defaults with `output_path` set to the current working directory.
    pub fn new<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Ok(Self {
            paths: paths.into_iter().map(Into::into).collect(),
            csv_fieldnames: MetadataField::DEFAULT.to_vec(),
            output_path: std::env::current_dir()?,
            output_file_name: DEFAULT_OUTPUT_FILE_NAME.to_string(),
            max_csv_lines: DEFAULT_MAX_CSV_LINES,
            compression: CompressionMethod::Deflate,
            temp_root: None,
        })
    }

    pub fn with_fieldnames(mut self, fields: Vec<MetadataField>) -> Self {
        self.csv_fieldnames = fields;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_output_file_name(mut self, name: impl Into<String>) -> Self {
        self.output_file_name = name.into();
        self
    }

    pub fn with_max_csv_lines(mut self, lines: usize) -> Self {
        self.max_csv_lines = lines;
        self
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_csv_lines == 0 {
            return Err(Error::InvalidConfig(
                "max_csv_lines must be at least 1".into(),
            ));
        }
        if self.csv_fieldnames.is_empty() {
            return Err(Error::InvalidConfig("no csv fields configured".into()));
        }
        let name = Path::new(&self.output_file_name);
        if self.output_file_name.is_empty() || name.file_name() != Some(name.as_os_str()) {
            return Err(Error::InvalidConfig(format!(
                "output file name `{}` must be a plain file name",
                self.output_file_name
            )));
        }
        Ok(())
    }

    /// Where the finished archive ends up.
    pub fn destination(&self) -> PathBuf {
        self.output_path.join(&self.output_file_name)
    }

    /// Chunk base name: the output file name without its extension.
    pub fn chunk_base(&self) -> String {
        Path::new(&self.output_file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output_file_name.clone())
    }

    pub fn header(&self) -> Vec<&'static str> {
        self.csv_fieldnames.iter().map(MetadataField::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_surface() {
        let config = ReportConfig::new(["/data"]).unwrap();
        assert_eq!(config.paths, vec![PathBuf::from("/data")]);
        assert_eq!(config.header(), vec!["mtime", "bytes"]);
        assert_eq!(config.output_file_name, "storage_analytics_data.zip");
        assert_eq!(config.max_csv_lines, 100_000);
        assert_eq!(config.output_path, std::env::current_dir().unwrap());
        assert_eq!(config.chunk_base(), "storage_analytics_data");
        config.validate().unwrap();
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let config = ReportConfig::new(["/data"]).unwrap().with_max_csv_lines(0);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn rejects_nested_output_name() {
        let config = ReportConfig::new(["/data"])
            .unwrap()
            .with_output_file_name("sub/out.zip");
        assert!(config.validate().is_err());
    }
}
