//! Per-field conversion hooks applied while parsing CSV members.
//!
//! A converted field is read as text and handed to its
//! [`ColumnConverter`], which produces the typed column.

use arrow::array::{Array, ArrayRef, StringArray, TimestampMicrosecondBuilder};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};

pub trait ColumnConverter: Send + Sync {
    /// Type of the column produced by [`convert`](Self::convert).
    fn data_type(&self) -> DataType;

    fn convert(&self, field: &str, column: &StringArray) -> Result<ArrayRef>;
}

/// Free-text timestamps to `Timestamp(Microsecond, None)`. Empty cells become null.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampConverter;

impl ColumnConverter for TimestampConverter {
    fn data_type(&self) -> DataType {
        DataType::Timestamp(TimeUnit::Microsecond, None)
    }

    fn convert(&self, field: &str, column: &StringArray) -> Result<ArrayRef> {
        let mut builder = TimestampMicrosecondBuilder::with_capacity(column.len());
        for value in column.iter() {
            match value.map(str::trim) {
                None | Some("") => builder.append_null(),
                Some(text) => {
                    let ts = parse_timestamp(text).ok_or_else(|| Error::Convert {
                        field: field.to_string(),
                        value: text.to_string(),
                    })?;
                    builder.append_value(ts.and_utc().timestamp_micros());
                }
            }
        }
        Ok(Arc::new(builder.finish()))
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp written in any of the common textual forms.
///
/// Offsets are normalized to UTC; bare numbers are epoch seconds in
/// local time, matching how modification times are recorded.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(ts.naive_utc());
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }

    let seconds: f64 = text.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    Local
        .timestamp_opt(whole as i64, nanos)
        .earliest()
        .map(|ts| ts.naive_local())
}

/// Converters keyed by field name.
#[derive(Clone)]
pub struct Converters {
    by_field: Vec<(String, Arc<dyn ColumnConverter>)>,
}

impl Converters {
    /// No conversions at all.
    pub fn none() -> Self {
        Self {
            by_field: Vec::new(),
        }
    }

    /// Register (or replace) the converter for `field`.
    pub fn with(
        mut self,
        field: impl Into<String>,
        converter: impl ColumnConverter + 'static,
    ) -> Self {
        let field = field.into();
        self.by_field.retain(|(name, _)| *name != field);
        self.by_field.push((field, Arc::new(converter)));
        self
    }

    pub fn get(&self, field: &str) -> Option<&dyn ColumnConverter> {
        self.by_field
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, converter)| converter.as_ref())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.by_field.iter().map(|(name, _)| name.as_str())
    }
}

/// `mtime` as a timestamp.
impl Default for Converters {
    fn default() -> Self {
        Self::none().with("mtime", TimestampConverter)
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.fields()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::TimestampMicrosecondArray;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn parses_common_forms() {
        let expected = ts(2016, 2, 29, 17, 5, 9);
        for text in [
            "2016-02-29 17:05:09",
            "2016-02-29T17:05:09",
            "2016/02/29 17:05:09",
            "2016-02-29T17:05:09Z",
            "2016-02-29T19:05:09+02:00",
            " 2016-02-29 17:05:09.000000 ",
        ] {
            assert_eq!(parse_timestamp(text), Some(expected), "{text}");
        }
        assert_eq!(parse_timestamp("2016-02-29"), Some(ts(2016, 2, 29, 0, 0, 0)));
    }

    #[test]
    fn keeps_fractional_seconds() {
        let parsed = parse_timestamp("2016-02-29 17:05:09.125").unwrap();
        assert_eq!(parsed.and_utc().timestamp_subsec_millis(), 125);
    }

    #[test]
    fn epoch_seconds_are_local_time() {
        let expected = Local.timestamp_opt(1_000_000_000, 0).unwrap().naive_local();
        assert_eq!(parse_timestamp("1000000000"), Some(expected));
    }

    #[test]
    fn rejects_nonsense() {
        assert_eq!(parse_timestamp("last tuesday"), None);
        assert_eq!(parse_timestamp("NaN"), None);
    }

    #[test]
    fn converter_maps_blanks_to_null_and_reports_bad_cells() {
        let column = StringArray::from(vec![Some("2020-01-01 00:00:00"), Some(""), None]);
        let array = TimestampConverter.convert("mtime", &column).unwrap();
        let array = array
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .unwrap();
        assert_eq!(array.value(0), ts(2020, 1, 1, 0, 0, 0).and_utc().timestamp_micros());
        assert!(array.is_null(1));
        assert!(array.is_null(2));

        let bad = StringArray::from(vec!["soon"]);
        assert!(matches!(
            TimestampConverter.convert("mtime", &bad),
            Err(Error::Convert { field, value }) if field == "mtime" && value == "soon"
        ));
    }

    #[test]
    fn default_converts_mtime_only() {
        let converters = Converters::default();
        assert!(converters.get("mtime").is_some());
        assert!(converters.get("bytes").is_none());
        assert_eq!(converters.fields().collect::<Vec<_>>(), ["mtime"]);
    }
}
