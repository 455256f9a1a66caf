//! Packing CSV files that already exist on disk.
//!
//! [`CsvPacker::gather`] zips every selected file as it is.
//! [`CsvPacker::concat`] merges them into a single CSV with one header row
//! and zips that. Both build the archive in a scoped working directory and
//! move it into place only when complete.

use arrow::array::new_null_array;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use glob::Pattern;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::report::{ArchiveAppender, Cancellation};
use crate::scratch::{clean_up, move_file, scoped_dir};
use crate::zip::{CompressionMethod, ZipAppender};

/// Files directly inside a set of directories whose name matches a glob.
#[derive(Debug, Clone)]
pub struct CsvSelection {
    dirs: Vec<PathBuf>,
    pattern: Pattern,
}

impl CsvSelection {
    pub fn new<I, P>(dirs: I, pattern: &str) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Ok(Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            pattern: Pattern::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Matching regular files, directory by directory, sorted by name
    /// within each directory.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let mut selected = Vec::new();
        for dir in &self.dirs {
            let mut matches = Vec::new();
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let name = entry.file_name();
                if entry.file_type()?.is_file() && self.pattern.matches(&name.to_string_lossy()) {
                    matches.push(entry.path());
                }
            }
            matches.sort();
            selected.append(&mut matches);
        }
        Ok(selected)
    }
}

#[derive(Debug, Clone)]
pub struct CsvPacker {
    selection: CsvSelection,
    compression: CompressionMethod,
    cancel: Cancellation,
    temp_root: Option<PathBuf>,
}

impl CsvPacker {
    pub fn new(selection: CsvSelection) -> Self {
        Self {
            selection,
            compression: CompressionMethod::Deflate,
            cancel: Cancellation::new(),
            temp_root: None,
        }
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Zip every selected file under its own name into `archive`, replacing
    /// it. Returns how many files were added; the sources stay in place.
    pub fn gather(&self, archive: &Path) -> Result<usize> {
        let files = self.selection.files()?;
        self.build(archive, |staged| {
            let mut zip = ZipAppender::create(staged)?.with_compression(self.compression);
            for file in &files {
                self.cancel.check()?;
                let name = file
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        Error::InvalidConfig(format!("{} has no file name", file.display()))
                    })?;
                zip.add_file(&name, file)?;
            }
            let count = zip.entries().len();
            debug!(archive = %zip.path().display(), entries = count, "gathered");
            zip.finish()?;
            Ok(count)
        })
        .inspect(|count| info!("{} files added to {}", count, archive.display()))
    }

    /// Merge the selected files into one CSV named after `archive` and zip
    /// it into `archive`, replacing it. Returns the number of data rows.
    ///
    /// The header is the union of all file headers in first-seen order;
    /// cells are copied as text and columns a file lacks are left empty.
    pub fn concat(&self, archive: &Path) -> Result<usize> {
        let files = self.selection.files()?;
        let stem = archive
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::InvalidConfig(format!("{} has no file name", archive.display()))
            })?;

        self.build(archive, |staged| {
            let merged = staged.with_file_name(format!("{stem}.csv"));
            let rows = concat_csv(&files, &merged, &self.cancel)?;
            ArchiveAppender::new(self.compression).append(staged, &merged)?;
            Ok(rows)
        })
        .inspect(|rows| {
            info!(
                "{} rows from {} files packed into {}",
                rows,
                files.len(),
                archive.display()
            )
        })
    }

    /// Run `fill` against an archive path inside a scoped working directory
    /// and move the result to `archive` on success.
    fn build<T>(&self, archive: &Path, fill: impl FnOnce(&Path) -> Result<T>) -> Result<T> {
        let workdir = scoped_dir(".storage-pack-", self.temp_root.as_deref())?;
        let staged = workdir.path().join("pack.zip");

        let result = fill(&staged).and_then(|value| {
            move_file(&staged, archive)?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                workdir.close()?;
                Ok(value)
            }
            Err(e) => {
                error!("Caught {}, cleaning up.", e);
                clean_up(workdir, |_| true);
                Err(e)
            }
        }
    }
}

/// Write `files` to `output` as one CSV with a single header row.
/// Returns the number of data rows written.
pub fn concat_csv(files: &[PathBuf], output: &Path, cancel: &Cancellation) -> Result<usize> {
    let mut schemas = Vec::with_capacity(files.len());
    for file in files {
        schemas.push(text_schema(file)?);
    }
    let header = union_schema(&schemas);

    let mut writer = WriterBuilder::new()
        .with_header(true)
        .build(BufWriter::new(File::create(output)?));
    // Header row even when no file has data
    writer.write(&RecordBatch::new_empty(Arc::clone(&header)))?;

    let mut rows = 0;
    for (file, schema) in files.iter().zip(schemas) {
        cancel.check()?;
        if schema.fields().is_empty() {
            warn!("{} has no header, skipping", file.display());
            continue;
        }
        let reader = ReaderBuilder::new(schema)
            .with_header(true)
            .build(File::open(file)?)?;
        for batch in reader {
            let batch = project(&batch?, &header)?;
            rows += batch.num_rows();
            writer.write(&batch)?;
        }
        debug!(file = %file.display(), "merged");
    }

    let mut out = writer.into_inner();
    out.flush()?;
    out.get_ref().sync_all()?;
    Ok(rows)
}

/// The file's header with every column typed as text.
fn text_schema(path: &Path) -> Result<SchemaRef> {
    let (inferred, _) = Format::default()
        .with_header(true)
        .infer_schema(File::open(path)?, Some(0))?;
    Ok(Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|field| Field::new(field.name(), DataType::Utf8, true))
            .collect::<Vec<_>>(),
    )))
}

fn union_schema(schemas: &[SchemaRef]) -> SchemaRef {
    let mut names: Vec<&str> = Vec::new();
    for schema in schemas {
        for field in schema.fields() {
            if !names.contains(&field.name().as_str()) {
                names.push(field.name());
            }
        }
    }
    Arc::new(Schema::new(
        names
            .into_iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

/// Reorder `batch` to `header`, null-filling the columns it lacks.
fn project(batch: &RecordBatch, header: &SchemaRef) -> Result<RecordBatch> {
    let columns = header
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(column) => Arc::clone(column),
            None => new_null_array(field.data_type(), batch.num_rows()),
        })
        .collect::<Vec<_>>();
    Ok(RecordBatch::try_new(Arc::clone(header), columns)?)
}
