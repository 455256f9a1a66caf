//! Records and the metadata fields they are built from.

use chrono::{DateTime, Local, NaiveDateTime};
use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A single scalar in a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Timestamp(NaiveDateTime),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
        }
    }
}

/// Text form of timestamps in chunk files.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Values positionally aligned to the configured field names.
pub type Record = Vec<Value>;

/// File metadata that can be reported per path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    /// Modification time, local wall clock
    Mtime,
    /// Size in bytes
    Bytes,
    /// Access time, local wall clock
    Atime,
    /// Permission bits (0 where the platform has none)
    Mode,
    Path,
}

impl MetadataField {
    pub const DEFAULT: [MetadataField; 2] = [MetadataField::Mtime, MetadataField::Bytes];

    pub fn name(&self) -> &'static str {
        match self {
            MetadataField::Mtime => "mtime",
            MetadataField::Bytes => "bytes",
            MetadataField::Atime => "atime",
            MetadataField::Mode => "mode",
            MetadataField::Path => "path",
        }
    }

    /// Read this field for `path` out of its metadata.
    pub fn value(&self, path: &Path, metadata: &Metadata) -> std::io::Result<Value> {
        Ok(match self {
            MetadataField::Mtime => Value::Timestamp(local_time(metadata.modified()?)),
            MetadataField::Bytes => Value::UInt(metadata.len()),
            MetadataField::Atime => Value::Timestamp(local_time(metadata.accessed()?)),
            MetadataField::Mode => Value::UInt(mode(metadata)),
            MetadataField::Path => Value::Text(path.to_string_lossy().into_owned()),
        })
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetadataField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "mtime" => Ok(MetadataField::Mtime),
            "bytes" | "size" => Ok(MetadataField::Bytes),
            "atime" => Ok(MetadataField::Atime),
            "mode" => Ok(MetadataField::Mode),
            "path" => Ok(MetadataField::Path),
            other => Err(Error::UnknownField(other.to_string())),
        }
    }
}

/// Build the record for `path`, one value per field, in field order.
pub fn stat_record(path: &Path, fields: &[MetadataField]) -> std::io::Result<Record> {
    let metadata = std::fs::metadata(path)?;
    fields
        .iter()
        .map(|field| field.value(path, &metadata))
        .collect()
}

fn local_time(time: std::time::SystemTime) -> NaiveDateTime {
    DateTime::<Local>::from(time).naive_local()
}

#[cfg(unix)]
fn mode(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::PermissionsExt;
    (metadata.permissions().mode() & 0o7777) as u64
}

#[cfg(not(unix))]
fn mode(_metadata: &Metadata) -> u64 {
    0
}
