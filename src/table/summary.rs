use arrow::array::{Array, AsArray};
use arrow::compute::{cast, max, min, sum};
use arrow::datatypes::{DataType, TimeUnit, TimestampMicrosecondType, UInt64Type};
use chrono::{DateTime, NaiveDateTime};
use std::fmt;

use super::extract::UnifiedTable;
use crate::error::Result;

/// Headline numbers for a unified table.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub members: usize,
    pub rows: usize,
    /// Sum of `bytes`, when the table has that column
    pub total_bytes: Option<u64>,
    pub oldest: Option<NaiveDateTime>,
    pub newest: Option<NaiveDateTime>,
}

impl Summary {
    pub fn of(table: &UnifiedTable) -> Result<Self> {
        let total_bytes = match table.column("bytes") {
            Some(column) if column.data_type().is_numeric() => {
                let column = cast(column, &DataType::UInt64)?;
                Some(sum(column.as_primitive::<UInt64Type>()).unwrap_or(0))
            }
            _ => None,
        };

        let (oldest, newest) = match table.column("mtime") {
            Some(column)
                if column.data_type() == &DataType::Timestamp(TimeUnit::Microsecond, None) =>
            {
                let column = column.as_primitive::<TimestampMicrosecondType>();
                (micros(min(column)), micros(max(column)))
            }
            _ => (None, None),
        };

        Ok(Self {
            members: table.members().len(),
            rows: table.num_rows(),
            total_bytes,
            oldest,
            newest,
        })
    }
}

fn micros(value: Option<i64>) -> Option<NaiveDateTime> {
    value
        .and_then(DateTime::from_timestamp_micros)
        .map(|ts| ts.naive_utc())
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "members: {}", self.members)?;
        writeln!(f, "rows:    {}", self.rows)?;
        if let Some(total) = self.total_bytes {
            writeln!(f, "bytes:   {total}")?;
        }
        if let (Some(oldest), Some(newest)) = (self.oldest, self.newest) {
            writeln!(f, "oldest:  {oldest}")?;
            writeln!(f, "newest:  {newest}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ArchiveExtractor;
    use crate::zip::ZipAppender;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn summarizes_bytes_and_mtime_range() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("s.zip");
        let mut zip = ZipAppender::create(&archive).unwrap();
        zip.add_bytes(
            "s__0000.csv",
            b"mtime,bytes\n2019-07-01 10:00:00,100\n2018-03-02 09:30:00,20\n",
        )
        .unwrap();
        zip.add_bytes("s__0001.csv", b"mtime,bytes\n2020-12-31 23:59:59,3\n")
            .unwrap();
        zip.finish().unwrap();

        let table = ArchiveExtractor::new()
            .with_temp_root(dir.path())
            .extract_and_concat(&archive)
            .unwrap();
        let summary = Summary::of(&table).unwrap();

        assert_eq!(summary.members, 2);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.total_bytes, Some(123));
        assert_eq!(
            summary.oldest,
            NaiveDate::from_ymd_opt(2018, 3, 2).unwrap().and_hms_opt(9, 30, 0)
        );
        assert_eq!(
            summary.newest,
            NaiveDate::from_ymd_opt(2020, 12, 31)
                .unwrap()
                .and_hms_opt(23, 59, 59)
        );
        assert!(summary.to_string().contains("rows:    3"));
    }
}
