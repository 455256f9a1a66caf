//! Drives a record source through the buffer, chunk writer and archive.
//!
//! All intermediate files live in a scoped working directory. The finished
//! archive is moved to its destination only after every chunk made it in;
//! any error or interruption drops the working directory and everything in
//! it, and nothing appears at the destination.

use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};

use super::archive::ArchiveAppender;
use super::buffer::RecordBuffer;
use super::cancel::Cancellation;
use super::chunk::{ChunkWriter, is_chunk_file};
use crate::config::ReportConfig;
use crate::error::Result;
use crate::record::Record;
use crate::scratch::{clean_up, move_file, scoped_dir};

pub struct ReportRunner {
    config: ReportConfig,
    cancel: Cancellation,
}

/// State owned by a single run.
struct Run<'a> {
    header: Vec<&'static str>,
    buffer: RecordBuffer,
    writer: ChunkWriter,
    appender: ArchiveAppender,
    archive: PathBuf,
    cancel: &'a Cancellation,
}

impl Run<'_> {
    fn flush(&mut self) -> Result<()> {
        self.cancel.check()?;
        debug!(records = self.buffer.len(), "flushing buffer");
        let chunk = self.writer.write(self.buffer.records(), &self.header)?;
        self.appender.append(&self.archive, &chunk)?;
        self.buffer.clear();
        Ok(())
    }
}

impl ReportRunner {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            cancel: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Turn every item of `source` into a record via `transform` and pack
    /// them into the output archive. Returns the archive's final path.
    ///
    /// Items whose transform fails are skipped with a warning. A trailing
    /// partial buffer is flushed after the source ends; an empty source
    /// still yields an archive holding one header-only CSV.
    pub fn run<I, F>(&self, source: I, mut transform: F) -> Result<PathBuf>
    where
        I: IntoIterator,
        I::Item: Debug,
        F: FnMut(&I::Item) -> io::Result<Record>,
    {
        self.config.validate()?;

        let workdir = scoped_dir(".storage-report-", self.config.temp_root.as_deref())?;
        debug!(workdir = %workdir.path().display(), "created working directory");

        match self.run_in(workdir.path(), source, &mut transform) {
            Ok(archive) => {
                let destination = self.config.destination();
                if let Err(e) = move_file(&archive, &destination) {
                    error!("Cannot move archive to {}: {}", destination.display(), e);
                    self.clean_up(workdir);
                    return Err(e.into());
                }
                workdir.close()?;
                info!("archive written to {}", destination.display());
                Ok(destination)
            }
            Err(e) => {
                if e.is_interrupted() {
                    error!("Interrupted, cleaning up temporary data");
                } else {
                    error!("Caught {}, cleaning up temporary data", e);
                }
                self.clean_up(workdir);
                Err(e)
            }
        }
    }

    fn run_in<I, F>(&self, dir: &Path, source: I, transform: &mut F) -> Result<PathBuf>
    where
        I: IntoIterator,
        I::Item: Debug,
        F: FnMut(&I::Item) -> io::Result<Record>,
    {
        let mut run = Run {
            header: self.config.header(),
            buffer: RecordBuffer::new(self.config.max_csv_lines),
            writer: ChunkWriter::new(dir, self.config.chunk_base()),
            appender: ArchiveAppender::new(self.config.compression),
            archive: dir.join(&self.config.output_file_name),
            cancel: &self.cancel,
        };

        let mut skipped = 0u64;
        for item in source {
            self.cancel.check()?;
            match transform(&item) {
                Ok(record) => {
                    run.buffer.push(record);
                    if run.buffer.is_full() {
                        run.flush()?;
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping path {:?}: {}", item, e);
                }
            }
        }

        // Trailing partial chunk; an empty source still gets its header-only chunk
        if !run.buffer.is_empty() || run.writer.next_seq() == 0 {
            run.flush()?;
        }
        if skipped > 0 {
            warn!("{} items skipped", skipped);
        }
        Ok(run.archive)
    }

    /// Remove loose chunks, then the working directory with whatever is left.
    fn clean_up(&self, workdir: TempDir) {
        let base = self.config.chunk_base();
        clean_up(workdir, |path| is_chunk_file(path, &base));
    }
}
