//! Chunked CSV-to-zip report writer.
//!
//! [`ReportRunner`] pulls items from a record source, buffers the records
//! in a [`RecordBuffer`], and on every full buffer has the [`ChunkWriter`]
//! write a numbered CSV which the [`ArchiveAppender`] folds into the output
//! zip. [`run_storage_report`] wires this up with the filesystem walker and
//! the per-path metadata lookup.

mod archive;
mod buffer;
mod cancel;
mod chunk;
mod runner;
mod walk;

pub use archive::ArchiveAppender;
pub use buffer::RecordBuffer;
pub use cancel::Cancellation;
pub use chunk::ChunkWriter;
pub use runner::ReportRunner;
pub use walk::walk_paths;

use std::path::PathBuf;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::record::stat_record;

/// Walk `config.paths`, stat every file and write the archive.
pub fn run_storage_report(config: &ReportConfig, cancel: &Cancellation) -> Result<PathBuf> {
    let runner = ReportRunner::new(config.clone()).with_cancellation(cancel.clone());
    let settings = runner.config();
    runner.run(walk_paths(&settings.paths), |path| {
        stat_record(path, &settings.csv_fieldnames)
    })
}
