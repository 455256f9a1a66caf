use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Cap on the up-front buffer for inflated data. Declared sizes come from
/// the archive and may be anything.
const MAX_PREALLOC: u64 = 1 << 24;

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ZipParser::new(reader),
        }
    }

    /// List all files in the archive
    pub fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Extract file data to memory, verifying its CRC-32
    pub fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.get_data_offset(entry)?;
        let data_end = data_offset.checked_add(entry.compressed_size);
        if data_end.is_none_or(|end| end > self.parser.size()) {
            return Err(Error::InvalidArchive(format!(
                "data of `{}` extends past end of file",
                entry.file_name
            )));
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser.reader().read_exact_at(data_offset, &mut raw)?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let declared = entry.uncompressed_size;
                let mut out = Vec::with_capacity(declared.min(MAX_PREALLOC) as usize);
                // One byte past the declared size is enough to see a mismatch
                DeflateDecoder::new(raw.as_slice())
                    .take(declared.saturating_add(1))
                    .read_to_end(&mut out)?;
                out
            }
            CompressionMethod::Unknown(method) => {
                return Err(Error::UnsupportedCompression(method));
            }
        };

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 || data.len() as u64 != entry.uncompressed_size {
            return Err(Error::ChecksumMismatch {
                name: entry.file_name.clone(),
                expected: entry.crc32,
                actual: crc.sum(),
            });
        }

        Ok(data)
    }

    /// Extract file to disk
    pub fn extract_to_file(&self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let data = self.extract_to_memory(entry)?;
        fs::write(output_path, data)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::zip::{CDFH_SIGNATURE, EndOfCentralDirectory, LFH_SIGNATURE};
    use byteorder::{LittleEndian, WriteBytesExt};
    use flate2::write::DeflateEncoder;
    use std::io::Write;

    const BODY: &[u8] = b"mtime,bytes\n2020-01-01 00:00:00,1\n";

    /// One DEFLATE member `a.csv` whose central header carries a ZIP64
    /// extra field with the given sizes.
    fn zip64_archive(uncompressed: u64, compressed: Option<u64>) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(BODY).unwrap();
        let payload = encoder.finish().unwrap();
        let mut crc = Crc::new();
        crc.update(BODY);
        let name = b"a.csv";

        let mut data = Vec::new();
        data.write_all(LFH_SIGNATURE).unwrap();
        for v in [20u16, 0, 8, 0, 0] {
            data.write_u16::<LittleEndian>(v).unwrap();
        }
        data.write_u32::<LittleEndian>(crc.sum()).unwrap();
        data.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        data.write_u32::<LittleEndian>(BODY.len() as u32).unwrap();
        data.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        data.write_u16::<LittleEndian>(0).unwrap();
        data.write_all(name).unwrap();
        data.write_all(&payload).unwrap();

        let mut extra = Vec::new();
        extra.write_u64::<LittleEndian>(uncompressed).unwrap();
        if let Some(size) = compressed {
            extra.write_u64::<LittleEndian>(size).unwrap();
        }

        let cd_offset = data.len() as u32;
        data.write_all(CDFH_SIGNATURE).unwrap();
        for v in [(3u16 << 8) | 45, 45, 0, 8, 0, 0] {
            data.write_u16::<LittleEndian>(v).unwrap();
        }
        data.write_u32::<LittleEndian>(crc.sum()).unwrap();
        let compressed_field = if compressed.is_some() {
            0xFFFF_FFFF
        } else {
            payload.len() as u32
        };
        data.write_u32::<LittleEndian>(compressed_field).unwrap();
        data.write_u32::<LittleEndian>(0xFFFF_FFFF).unwrap();
        data.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        data.write_u16::<LittleEndian>(4 + extra.len() as u16).unwrap();
        for v in [0u16, 0, 0] {
            data.write_u16::<LittleEndian>(v).unwrap();
        }
        data.write_u32::<LittleEndian>(0).unwrap();
        data.write_u32::<LittleEndian>(0).unwrap();
        data.write_all(name).unwrap();
        data.write_u16::<LittleEndian>(0x0001).unwrap();
        data.write_u16::<LittleEndian>(extra.len() as u16).unwrap();
        data.write_all(&extra).unwrap();

        let cd_size = data.len() as u32 - cd_offset;
        EndOfCentralDirectory::new(1, cd_size, cd_offset)
            .write_to(&mut data)
            .unwrap();
        data
    }

    fn only_entry(extractor: &ZipExtractor<MemoryReader>) -> ZipFileEntry {
        let mut entries = extractor.list_files().unwrap();
        assert_eq!(entries.len(), 1);
        entries.remove(0)
    }

    #[test]
    fn honest_zip64_sizes_extract() {
        let extractor = ZipExtractor::new(MemoryReader::new(zip64_archive(
            BODY.len() as u64,
            None,
        )));
        let entry = only_entry(&extractor);
        assert_eq!(extractor.extract_to_memory(&entry).unwrap(), BODY);
    }

    #[test]
    fn huge_declared_size_is_an_error() {
        let extractor = ZipExtractor::new(MemoryReader::new(zip64_archive(u64::MAX, None)));
        let entry = only_entry(&extractor);
        assert_eq!(entry.uncompressed_size, u64::MAX);
        assert!(matches!(
            extractor.extract_to_memory(&entry),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn output_beyond_declared_size_is_an_error() {
        let extractor = ZipExtractor::new(MemoryReader::new(zip64_archive(4, None)));
        let entry = only_entry(&extractor);
        assert!(matches!(
            extractor.extract_to_memory(&entry),
            Err(Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn huge_compressed_size_is_an_error() {
        let extractor = ZipExtractor::new(MemoryReader::new(zip64_archive(
            BODY.len() as u64,
            Some(u64::MAX),
        )));
        let entry = only_entry(&extractor);
        assert!(matches!(
            extractor.extract_to_memory(&entry),
            Err(Error::InvalidArchive(_))
        ));
    }
}
