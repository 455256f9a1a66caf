//! Numbered CSV chunk files.

use arrow::array::{
    ArrayRef, Float64Builder, Int64Builder, StringBuilder, TimestampMicrosecondBuilder,
    UInt64Builder,
};
use arrow::csv::WriterBuilder;
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use crate::record::{Record, TIMESTAMP_FORMAT, Value};

/// Writes each flushed buffer to `{base}__{seq:04}.csv` inside `dir`.
#[derive(Debug)]
pub struct ChunkWriter {
    dir: PathBuf,
    base: String,
    next_seq: u32,
}

impl ChunkWriter {
    pub fn new(dir: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base: base.into(),
            next_seq: 0,
        }
    }

    /// Sequence number the next chunk will get.
    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn chunk_name(base: &str, seq: u32) -> String {
        format!("{base}__{seq:04}.csv")
    }

    /// Write a header row plus one row per record; the file is closed on return.
    ///
    /// The sequence number is consumed even when `records` is empty or the
    /// write fails.
    pub fn write(&mut self, records: &[Record], fieldnames: &[&str]) -> Result<PathBuf> {
        let seq = self.next_seq;
        self.next_seq += 1;

        let name = Self::chunk_name(&self.base, seq);
        let path = self.dir.join(&name);
        let batch = records_to_batch(records, fieldnames)?;

        let file = BufWriter::new(File::create(&path)?);
        let mut writer = WriterBuilder::new()
            .with_header(true)
            .with_timestamp_format(TIMESTAMP_FORMAT.to_string())
            .build(file);
        writer.write(&batch)?;
        let mut file = writer.into_inner();
        file.flush()?;
        file.get_ref().sync_all()?;

        info!("{} lines written to {}", records.len(), name);
        Ok(path)
    }
}

/// Column-wise batch from positional records.
fn records_to_batch(records: &[Record], fieldnames: &[&str]) -> Result<RecordBatch> {
    if let Some(bad) = records.iter().find(|r| r.len() != fieldnames.len()) {
        return Err(Error::RecordWidth {
            expected: fieldnames.len(),
            actual: bad.len(),
        });
    }

    let mut fields = Vec::with_capacity(fieldnames.len());
    let mut columns = Vec::with_capacity(fieldnames.len());
    for (i, name) in fieldnames.iter().enumerate() {
        let column = build_column(records.iter().map(|r| &r[i]), records.len());
        fields.push(Field::new(*name, column.data_type().clone(), true));
        columns.push(column);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Timestamp,
    Int,
    UInt,
    Float,
    Text,
}

fn kind_of(value: &Value) -> ColumnKind {
    match value {
        Value::Timestamp(_) => ColumnKind::Timestamp,
        Value::Int(_) => ColumnKind::Int,
        Value::UInt(_) => ColumnKind::UInt,
        Value::Float(_) => ColumnKind::Float,
        Value::Text(_) => ColumnKind::Text,
    }
}

/// Typed array when every value agrees on a type, text otherwise.
fn build_column<'a, I>(values: I, len: usize) -> ArrayRef
where
    I: Iterator<Item = &'a Value> + Clone,
{
    let mut kinds = values.clone().map(kind_of);
    let kind = match kinds.next() {
        Some(first) if kinds.all(|k| k == first) => first,
        _ => ColumnKind::Text,
    };

    match kind {
        ColumnKind::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(len);
            for value in values {
                if let Value::Timestamp(ts) = value {
                    builder.append_value(ts.and_utc().timestamp_micros());
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Int => {
            let mut builder = Int64Builder::with_capacity(len);
            for value in values {
                if let Value::Int(v) = value {
                    builder.append_value(*v);
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::UInt => {
            let mut builder = UInt64Builder::with_capacity(len);
            for value in values {
                if let Value::UInt(v) = value {
                    builder.append_value(*v);
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Float => {
            let mut builder = Float64Builder::with_capacity(len);
            for value in values {
                if let Value::Float(v) = value {
                    builder.append_value(*v);
                }
            }
            Arc::new(builder.finish())
        }
        ColumnKind::Text => {
            let mut builder = StringBuilder::with_capacity(len, len * 16);
            for value in values {
                builder.append_value(value.to_string());
            }
            Arc::new(builder.finish())
        }
    }
}

/// `true` if `path` looks like a chunk produced for `base`.
pub fn is_chunk_file(path: &Path, base: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix(base))
        .and_then(|rest| rest.strip_prefix("__"))
        .and_then(|rest| rest.strip_suffix(".csv"))
        .is_some_and(|seq| seq.len() >= 4 && seq.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn record(day: u32, bytes: u64) -> Record {
        let ts = NaiveDate::from_ymd_opt(2020, 1, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        vec![Value::Timestamp(ts), Value::UInt(bytes)]
    }

    #[test]
    fn writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), "report");

        let path = writer
            .write(&[record(1, 10), record(2, 20)], &["mtime", "bytes"])
            .unwrap();

        assert_eq!(path, dir.path().join("report__0000.csv"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "mtime,bytes\n\
             2020-01-01 12:00:00.000000,10\n\
             2020-01-02 12:00:00.000000,20\n"
        );
    }

    #[test]
    fn empty_buffer_gets_header_only() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), "report");

        let path = writer.write(&[], &["mtime", "bytes"]).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "mtime,bytes\n");
    }

    #[test]
    fn sequence_advances_every_call() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), "seq");

        let names: Vec<_> = (0..3)
            .map(|_| {
                let path = writer.write(&[], &["bytes"]).unwrap();
                path.file_name().unwrap().to_string_lossy().into_owned()
            })
            .collect();

        assert_eq!(names, ["seq__0000.csv", "seq__0001.csv", "seq__0002.csv"]);
        assert_eq!(writer.next_seq(), 3);
    }

    #[test]
    fn width_mismatch_still_consumes_sequence() {
        let dir = TempDir::new().unwrap();
        let mut writer = ChunkWriter::new(dir.path(), "bad");

        let err = writer
            .write(&[vec![Value::UInt(1)]], &["mtime", "bytes"])
            .unwrap_err();
        assert!(matches!(err, Error::RecordWidth { expected: 2, actual: 1 }));
        assert_eq!(writer.next_seq(), 1);
    }

    #[test]
    fn mixed_values_fall_back_to_text() {
        let batch = records_to_batch(
            &[vec![Value::UInt(1)], vec![Value::Text("n/a".into())]],
            &["bytes"],
        )
        .unwrap();
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);
    }

    #[test]
    fn recognizes_chunk_names() {
        assert!(is_chunk_file(Path::new("/tmp/x/report__0003.csv"), "report"));
        assert!(!is_chunk_file(Path::new("report__03.csv"), "report"));
        assert!(!is_chunk_file(Path::new("report.zip"), "report"));
    }
}
