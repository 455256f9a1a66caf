//! Create-or-append ZIP writer.
//!
//! New entries are written over the existing central directory, and the
//! complete directory plus EOCD is rewritten by [`ZipAppender::finish`].
//! Until `finish` runs the file on disk is not a readable archive.

use flate2::Crc;
use flate2::write::DeflateEncoder;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};
use crate::io::LocalFileReader;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, EndOfCentralDirectory, ZipFileEntry, dos_datetime};

pub struct ZipAppender {
    file: File,
    path: PathBuf,
    entries: Vec<ZipFileEntry>,
    /// Where the next local header goes; the old central directory starts here.
    next_offset: u64,
    compression: CompressionMethod,
}

impl ZipAppender {
    /// Create a new, empty archive, truncating any existing file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries: Vec::new(),
            next_offset: 0,
            compression: CompressionMethod::Deflate,
        })
    }

    /// Open an existing archive for appending.
    pub fn open(path: &Path) -> Result<Self> {
        let parser = ZipParser::new(LocalFileReader::new(path)?);
        let entries = parser.list_files()?;
        let cd = parser.central_directory()?;
        drop(parser);

        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            entries,
            next_offset: cd.offset,
            compression: CompressionMethod::Deflate,
        })
    }

    /// Append to `path` if it exists, otherwise create it.
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }

    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add the contents of `source` as entry `name`.
    pub fn add_file(&mut self, name: &str, source: &Path) -> Result<()> {
        let data = fs::read(source)?;
        self.add_bytes(name, &data)
    }

    pub fn add_bytes(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let payload = match self.compression {
            CompressionMethod::Stored => data.to_vec(),
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(
                    Vec::with_capacity(data.len() / 2),
                    flate2::Compression::default(),
                );
                encoder.write_all(data)?;
                encoder.finish()?
            }
            CompressionMethod::Unknown(method) => {
                return Err(Error::UnsupportedCompression(method));
            }
        };

        let mut crc = Crc::new();
        crc.update(data);

        let (last_mod_time, last_mod_date) = dos_datetime(chrono::Local::now().naive_local());
        let entry = ZipFileEntry {
            file_name: name.to_string(),
            compression_method: self.compression,
            compressed_size: payload.len() as u64,
            uncompressed_size: data.len() as u64,
            crc32: crc.sum(),
            lfh_offset: self.next_offset,
            last_mod_time,
            last_mod_date,
            is_directory: false,
        };

        self.file.seek(SeekFrom::Start(self.next_offset))?;
        let mut out = BufWriter::new(&mut self.file);
        entry.write_local_header(&mut out)?;
        out.write_all(&payload)?;
        out.flush()?;
        drop(out);

        self.next_offset = self.file.stream_position()?;
        debug!(
            name,
            size = entry.uncompressed_size,
            compressed = entry.compressed_size,
            "added zip entry"
        );
        self.entries.push(entry);
        Ok(())
    }

    /// Write the central directory and EOCD, then drop anything that
    /// followed the old directory.
    pub fn finish(mut self) -> Result<()> {
        let total_entries = u16::try_from(self.entries.len()).map_err(|_| {
            Error::InvalidArchive(format!(
                "{} entries need ZIP64, which is not written",
                self.entries.len()
            ))
        })?;

        let mut directory = Vec::new();
        for entry in &self.entries {
            entry.write_central_header(&mut directory)?;
        }

        let cd_offset = u32::try_from(self.next_offset)
            .map_err(|_| Error::InvalidArchive("archive too large without ZIP64".into()))?;
        let cd_size = u32::try_from(directory.len())
            .map_err(|_| Error::InvalidArchive("central directory too large".into()))?;
        EndOfCentralDirectory::new(total_entries, cd_size, cd_offset).write_to(&mut directory)?;

        self.file.seek(SeekFrom::Start(self.next_offset))?;
        self.file.write_all(&directory)?;
        self.file
            .set_len(self.next_offset + directory.len() as u64)?;
        self.file.sync_all()?;
        Ok(())
    }
}
