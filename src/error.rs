//! Error types shared by the report writer, the zip container and the
//! archive extractor.

use std::path::PathBuf;

use arrow::error::ArrowError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The archive could not be opened or is not a zip file.
    #[error("Cannot open archive `{}`: {source}", .path.display())]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("CRC mismatch for `{name}`: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Folding a chunk into the archive failed; the chunk stays on disk.
    #[error("Cannot add `{}` to archive `{}`: {source}", .chunk.display(), .archive.display())]
    AppendChunk {
        archive: PathBuf,
        chunk: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Record has {actual} values but {expected} fields are configured")]
    RecordWidth { expected: usize, actual: usize },

    #[error("Unknown metadata field `{0}`")]
    UnknownField(String),

    #[error(transparent)]
    Arrow(#[from] ArrowError),

    #[error("Cannot convert `{value}` in field `{field}`")]
    Convert { field: String, value: String },

    #[error("Interrupted")]
    Interrupted,

    #[error("Invalid file name pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}
