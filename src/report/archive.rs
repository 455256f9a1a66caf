use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::zip::{CompressionMethod, ZipAppender};

/// Folds finished chunk files into the output archive.
#[derive(Debug, Clone, Copy)]
pub struct ArchiveAppender {
    compression: CompressionMethod,
}

impl Default for ArchiveAppender {
    fn default() -> Self {
        Self::new(CompressionMethod::Deflate)
    }
}

impl ArchiveAppender {
    pub fn new(compression: CompressionMethod) -> Self {
        Self { compression }
    }

    /// Add `chunk` to `archive` under its base name, then delete `chunk`.
    ///
    /// The archive is created on first use. If it cannot be opened or
    /// written, the chunk is left on disk and the error is returned.
    pub fn append(&self, archive: &Path, chunk: &Path) -> Result<()> {
        let wrap = |source: Error| Error::AppendChunk {
            archive: archive.to_path_buf(),
            chunk: chunk.to_path_buf(),
            source: Box::new(source),
        };

        let name = chunk
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| wrap(Error::InvalidConfig("chunk path has no file name".into())))?;

        let mut zip = ZipAppender::open_or_create(archive)
            .map_err(wrap)?
            .with_compression(self.compression);
        zip.add_file(&name, chunk).map_err(wrap)?;
        let count = zip.entries().len();
        zip.finish().map_err(wrap)?;

        fs::remove_file(chunk)?;
        info!(
            "added {} to {} ({} entries)",
            name,
            archive.display(),
            count
        );
        Ok(())
    }
}
