//! Reading report archives back into one table.

mod convert;
mod extract;
mod summary;

pub use convert::{ColumnConverter, Converters, TimestampConverter, parse_timestamp};
pub use extract::{ArchiveExtractor, ExtractOptions, UnifiedTable, read_csv};
pub use summary::Summary;
