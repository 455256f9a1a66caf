//! Archive to unified table.
//!
//! Members are materialized one at a time in a scoped directory, parsed,
//! and deleted straight away. Their columns are merged rather than forced
//! into the first member's shape. Any failure or interruption removes what is
//! left of the directory and returns the error; there are no partial tables.

use arrow::array::{Array, ArrayRef, AsArray, new_null_array};
use arrow::compute::{CastOptions, cast_with_options, concat_batches};
use arrow::csv::ReaderBuilder;
use arrow::csv::reader::Format;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use std::fs::{self, File};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use super::convert::Converters;
use crate::error::{Error, Result};
use crate::io::LocalFileReader;
use crate::report::Cancellation;
use crate::scratch::{clean_up, scoped_dir};
use crate::zip::{ZipExtractor, ZipFileEntry};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Members whose name ends with this suffix are parsed
    pub suffix: String,
    pub converters: Converters,
    /// Rows per batch while reading a member
    pub batch_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            suffix: ".csv".to_string(),
            converters: Converters::default(),
            batch_size: 8192,
        }
    }
}

/// All CSV members of one archive, concatenated in archive order.
#[derive(Debug, Clone)]
pub struct UnifiedTable {
    members: Vec<String>,
    batch: RecordBatch,
}

impl UnifiedTable {
    /// Member names, in the order their rows appear.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveExtractor {
    options: ExtractOptions,
    cancel: Cancellation,
    temp_root: Option<PathBuf>,
}

impl ArchiveExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
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

    fn open(&self, archive: &Path) -> Result<ZipExtractor<LocalFileReader>> {
        let wrap = |source: Error| Error::OpenArchive {
            path: archive.to_path_buf(),
            source: Box::new(source),
        };
        let zip = ZipExtractor::new(LocalFileReader::new(archive).map_err(|e| wrap(e.into()))?);
        // Reading the directory is what proves the file is an archive
        zip.list_files().map_err(wrap)?;
        Ok(zip)
    }

    fn select(&self, entries: Vec<ZipFileEntry>) -> Vec<ZipFileEntry> {
        entries
            .into_iter()
            .filter(|e| !e.is_directory && e.file_name.ends_with(&self.options.suffix))
            .collect()
    }

    /// Names of the members that [`extract_and_concat`](Self::extract_and_concat) would read.
    pub fn members(&self, archive: &Path) -> Result<Vec<String>> {
        let zip = self.open(archive).inspect_err(|e| error!("{}", e))?;
        Ok(self
            .select(zip.list_files()?)
            .into_iter()
            .map(|e| e.file_name)
            .collect())
    }

    pub fn extract_and_concat(&self, archive: &Path) -> Result<UnifiedTable> {
        let zip = self.open(archive).inspect_err(|e| error!("{}", e))?;
        let members = self.select(zip.list_files()?);
        debug!(archive = %archive.display(), members = members.len(), "extracting");

        let workdir = scoped_dir(".storage-extract-", self.temp_root.as_deref())?;

        match self.read_members(&zip, &members, workdir.path()) {
            Ok(batches) => {
                workdir.close()?;
                let batch = concat_members(batches)?;
                info!(
                    "{} rows read from {} members of {}",
                    batch.num_rows(),
                    members.len(),
                    archive.display()
                );
                Ok(UnifiedTable {
                    members: members.into_iter().map(|e| e.file_name).collect(),
                    batch,
                })
            }
            Err(e) => {
                error!("Caught {}, cleaning up.", e);
                let suffix = &self.options.suffix;
                clean_up(workdir, |path| {
                    path.file_name()
                        .is_some_and(|name| name.to_string_lossy().ends_with(suffix.as_str()))
                });
                Err(e)
            }
        }
    }

    fn read_members(
        &self,
        zip: &ZipExtractor<LocalFileReader>,
        members: &[ZipFileEntry],
        dir: &Path,
    ) -> Result<Vec<RecordBatch>> {
        let mut batches = Vec::with_capacity(members.len());
        for entry in members {
            self.cancel.check()?;
            let path = dir.join(entry.base_name());
            zip.extract_to_file(entry, &path)?;
            let batch = read_csv(&path, &self.options)?;
            fs::remove_file(&path)?;
            debug!(member = %entry.file_name, rows = batch.num_rows(), "parsed member");
            batches.push(batch);
        }
        Ok(batches)
    }
}

/// Parse one CSV file, applying the configured converters.
pub fn read_csv(path: &Path, options: &ExtractOptions) -> Result<RecordBatch> {
    let mut file = File::open(path)?;
    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut file, None)?;
    file.seek(SeekFrom::Start(0))?;

    // Converted fields are read as text first
    let read_schema = Arc::new(Schema::new(
        inferred
            .fields()
            .iter()
            .map(|field| match options.converters.get(field.name()) {
                Some(_) => Field::new(field.name(), DataType::Utf8, true),
                None => field.as_ref().clone(),
            })
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(Arc::clone(&read_schema))
        .with_format(format)
        .with_batch_size(options.batch_size)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    let raw = concat_batches(&read_schema, &batches)?;

    let mut fields = Vec::with_capacity(raw.num_columns());
    let mut columns = Vec::with_capacity(raw.num_columns());
    for (field, column) in read_schema.fields().iter().zip(raw.columns()) {
        match options.converters.get(field.name()) {
            Some(converter) => {
                let converted = converter.convert(field.name(), column.as_string::<i32>())?;
                fields.push(Field::new(field.name(), converter.data_type(), true));
                columns.push(converted);
            }
            None => {
                fields.push(field.as_ref().clone());
                columns.push(Arc::clone(column));
            }
        }
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Stack member batches into one. Columns are the union over all members
/// in first-seen order. A column's type is widened across the members that
/// have rows (integers to floats, any other conflict to text), and members
/// lacking a column get nulls there.
fn concat_members(batches: Vec<RecordBatch>) -> Result<RecordBatch> {
    let schema = merged_schema(&batches);
    let aligned = batches
        .into_iter()
        .filter(|b| b.num_rows() > 0)
        .map(|b| align(b, &schema))
        .collect::<Result<Vec<_>>>()?;

    Ok(concat_batches(&schema, &aligned)?)
}

fn merged_schema(batches: &[RecordBatch]) -> SchemaRef {
    // (name, type, whether the type comes from a member with rows)
    let mut merged: Vec<(String, DataType, bool)> = Vec::new();
    for batch in batches {
        let has_rows = batch.num_rows() > 0;
        let schema = batch.schema();
        for field in schema.fields() {
            match merged.iter_mut().find(|(name, ..)| name == field.name()) {
                Some((_, data_type, typed)) if has_rows => {
                    *data_type = if *typed {
                        widen(data_type, field.data_type())
                    } else {
                        field.data_type().clone()
                    };
                    *typed = true;
                }
                Some(_) => {}
                None => merged.push((field.name().clone(), field.data_type().clone(), has_rows)),
            }
        }
    }

    Arc::new(Schema::new(
        merged
            .into_iter()
            .map(|(name, data_type, _)| Field::new(name, data_type, true))
            .collect::<Vec<_>>(),
    ))
}

/// Common type for a column seen as both `a` and `b`.
fn widen(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        _ if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        _ if a.is_integer() && b.is_integer() => DataType::Int64,
        _ if a.is_numeric() && b.is_numeric() => DataType::Float64,
        _ => DataType::Utf8,
    }
}

fn align(batch: RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    if batch.schema() == *schema {
        return Ok(batch);
    }

    // Casts only widen here; a value that does not survive is an error, not a null
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let columns = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(column) if column.data_type() == field.data_type() => Ok(Arc::clone(column)),
            Some(column) => cast_with_options(column, field.data_type(), &options),
            None => Ok(new_null_array(field.data_type(), batch.num_rows())),
        })
        .collect::<std::result::Result<Vec<_>, ArrowError>>()?;

    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}
