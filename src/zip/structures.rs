use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use chrono::{Datelike, NaiveDateTime, Timelike};
use std::io::{self, Cursor, Write};

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }
}

/// Version 2.0: deflate, no ZIP64
pub const VERSION_NEEDED: u16 = 20;
/// Upper byte 3 = unix, lower byte = spec version 2.0
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;
/// General purpose flag bit 11: file name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// End of Central Directory (EOCD) - 22 bytes minimum
pub struct EndOfCentralDirectory {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn new(total_entries: u16, cd_size: u32, cd_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_cd: 0,
            disk_entries: total_entries,
            total_entries,
            cd_size,
            cd_offset,
            comment_len: 0,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::InvalidArchive(
                "invalid End of Central Directory".into(),
            ));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        // Comments are never written
        out.write_u16::<LittleEndian>(0)
    }

    pub fn is_zip64(&self) -> bool {
        self.disk_entries == 0xFFFF
            || self.total_entries == 0xFFFF
            || self.cd_size == 0xFFFFFFFF
            || self.cd_offset == 0xFFFFFFFF
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub disk_with_eocd64: u32,
    pub eocd64_offset: u64,
    pub total_disks: u32,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::InvalidArchive("invalid ZIP64 locator".into()));
        }

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_with_eocd64: cursor.read_u32::<LittleEndian>()?,
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
            total_disks: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::InvalidArchive(
                "invalid ZIP64 End of Central Directory".into(),
            ));
        }

        // Skip record size, versions and disk numbers
        let mut cursor = Cursor::new(&data[4 + 8 + 2 + 2 + 4 + 4..]);
        let _disk_entries = cursor.read_u64::<LittleEndian>()?;

        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Parsed ZIP file entry information
#[derive(Debug, Clone)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    pub lfh_offset: u64,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub is_directory: bool,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Base name of the entry, without any directory components
    pub fn base_name(&self) -> &str {
        self.file_name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.file_name)
    }

    /// 32-bit header fields; the writer does not produce ZIP64 records.
    fn narrow_fields(&self) -> io::Result<(u32, u32, u32, u16)> {
        let too_large = |what: &str| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} of `{}` needs ZIP64", what, self.file_name),
            )
        };
        let compressed =
            u32::try_from(self.compressed_size).map_err(|_| too_large("compressed size"))?;
        let uncompressed =
            u32::try_from(self.uncompressed_size).map_err(|_| too_large("size"))?;
        let offset = u32::try_from(self.lfh_offset).map_err(|_| too_large("offset"))?;
        let name_len =
            u16::try_from(self.file_name.len()).map_err(|_| too_large("file name length"))?;
        Ok((compressed, uncompressed, offset, name_len))
    }

    /// Serialize the Local File Header that precedes the entry data.
    pub fn write_local_header<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let (compressed, uncompressed, _, name_len) = self.narrow_fields()?;
        out.write_all(LFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(compressed)?;
        out.write_u32::<LittleEndian>(uncompressed)?;
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_all(self.file_name.as_bytes())
    }

    /// Serialize the Central Directory File Header for this entry.
    pub fn write_central_header<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let (compressed, uncompressed, offset, name_len) = self.narrow_fields()?;
        let external_attrs: u32 = if self.is_directory {
            (0o040755 << 16) | 0x10
        } else {
            0o100644 << 16
        };
        out.write_all(CDFH_SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        out.write_u16::<LittleEndian>(FLAG_UTF8)?;
        out.write_u16::<LittleEndian>(self.compression_method.as_u16())?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(compressed)?;
        out.write_u32::<LittleEndian>(uncompressed)?;
        out.write_u16::<LittleEndian>(name_len)?;
        out.write_u16::<LittleEndian>(0)?; // extra field
        out.write_u16::<LittleEndian>(0)?; // comment
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(external_attrs)?;
        out.write_u32::<LittleEndian>(offset)?;
        out.write_all(self.file_name.as_bytes())
    }
}

/// Encode a timestamp as MS-DOS (time, date). Years before 1980 clamp to 1980-01-01.
pub fn dos_datetime(ts: NaiveDateTime) -> (u16, u16) {
    if ts.year() < 1980 {
        return (0, (1 << 5) | 1);
    }
    let time = ((ts.hour() as u16) << 11) | ((ts.minute() as u16) << 5) | (ts.second() as u16 / 2);
    let date = (((ts.year() - 1980).min(127) as u16) << 9)
        | ((ts.month() as u16) << 5)
        | ts.day() as u16;
    (time, date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(name: &str) -> ZipFileEntry {
        let (last_mod_time, last_mod_date) = dos_datetime(
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(13, 45, 30)
                .unwrap(),
        );
        ZipFileEntry {
            file_name: name.to_string(),
            compression_method: CompressionMethod::Deflate,
            compressed_size: 10,
            uncompressed_size: 20,
            crc32: 0xDEADBEEF,
            lfh_offset: 0,
            last_mod_time,
            last_mod_date,
            is_directory: false,
        }
    }

    #[test]
    fn dos_datetime_survives_decoding() {
        let e = entry("a.csv");
        assert_eq!(e.mod_date(), (2024, 3, 15));
        assert_eq!(e.mod_time(), (13, 45, 30));
    }

    #[test]
    fn dos_datetime_clamps_old_dates() {
        let ts = NaiveDate::from_ymd_opt(1970, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let mut e = entry("old.csv");
        (e.last_mod_time, e.last_mod_date) = dos_datetime(ts);
        assert_eq!(e.mod_date(), (1980, 1, 1));
    }

    #[test]
    fn header_sizes_match_layout() {
        let e = entry("data__0000.csv");
        let mut local = Vec::new();
        e.write_local_header(&mut local).unwrap();
        assert_eq!(local.len(), LFH_SIZE + e.file_name.len());
        assert_eq!(&local[0..4], LFH_SIGNATURE);

        let mut central = Vec::new();
        e.write_central_header(&mut central).unwrap();
        assert_eq!(central.len(), CDFH_MIN_SIZE + e.file_name.len());
        assert_eq!(&central[0..4], CDFH_SIGNATURE);
    }

    #[test]
    fn eocd_is_parsed_back() {
        let mut buf = Vec::new();
        EndOfCentralDirectory::new(3, 150, 4000)
            .write_to(&mut buf)
            .unwrap();
        assert_eq!(buf.len(), EndOfCentralDirectory::SIZE);

        let eocd = EndOfCentralDirectory::from_bytes(&buf).unwrap();
        assert_eq!(eocd.total_entries, 3);
        assert_eq!(eocd.cd_size, 150);
        assert_eq!(eocd.cd_offset, 4000);
        assert!(!eocd.is_zip64());
    }

    #[test]
    fn base_name_strips_directories() {
        assert_eq!(entry("nested/dir/data__0001.csv").base_name(), "data__0001.csv");
        assert_eq!(entry("plain.csv").base_name(), "plain.csv");
    }
}
