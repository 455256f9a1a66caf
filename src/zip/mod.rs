//! ZIP archive reading and appending.
//!
//! ## Architecture
//!
//! - [`structures`]: ZIP format records (EOCD, file headers), parsed and serialized
//! - [`parser`]: low-level parsing of ZIP structures from a [`ReadAt`](crate::io::ReadAt) source
//! - [`extractor`]: entry data to memory or disk
//! - [`writer`]: create-or-append writer used to fold chunks into an archive
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Appending therefore overwrites the central directory with the new
//! entry and writes a fresh directory after it.
//!
//! ## Supported Features
//!
//! - STORED and DEFLATE, both directions
//! - ZIP64 archives when reading
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No ZIP64 output

mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::ZipExtractor;
pub use parser::{CentralDirectory, ZipParser};
pub use structures::*;
pub use writer::ZipAppender;
