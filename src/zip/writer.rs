//! Low-level ZIP archive writer.
//!
//! Writes plain 32-bit ZIP archives: a Local File Header plus data for
//! each entry, followed by the Central Directory and the End of Central
//! Directory record. Entries appear in the archive in exactly the order
//! they are added; the EPUB packer relies on this to place `mimetype`
//! first and uncompressed.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

use crate::error::{EpubError, Result};

use super::structures::{CDFH_SIGNATURE, CompressionMethod, EndOfCentralDirectory, LFH_SIGNATURE};

/// Minimum zip version needed to extract (2.0, supports deflate).
const VERSION_NEEDED: u16 = 20;

/// DOS date for 1980-01-01, the zip epoch. Entry timestamps are not
/// meaningful for repacked EPUBs, so every entry gets this fixed value,
/// which also keeps the output byte-for-byte deterministic.
const DOS_EPOCH_DATE: u16 = (1 << 5) | 1;
const DOS_EPOCH_TIME: u16 = 0;

/// Central directory bookkeeping for one written entry.
struct WrittenEntry {
    file_name: String,
    compression_method: CompressionMethod,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    lfh_offset: u32,
}

/// ZIP archive writer over any byte sink.
pub struct ZipWriter<W: Write> {
    writer: W,
    entries: Vec<WrittenEntry>,
    offset: u64,
}

impl<W: Write> ZipWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            entries: Vec::new(),
            offset: 0,
        }
    }

    /// Append one entry with the given compression method.
    ///
    /// `file_name` must use forward slashes, per the zip specification.
    pub fn add_entry(
        &mut self,
        file_name: &str,
        data: &[u8],
        method: CompressionMethod,
    ) -> Result<()> {
        let lfh_offset = to_u32(self.offset)?;
        let uncompressed_size = to_u32(data.len() as u64)?;
        let name_len = name_len(file_name)?;

        let mut crc = flate2::Crc::new();
        crc.update(data);
        let crc32 = crc.sum();

        let payload: Vec<u8>;
        let compressed: &[u8] = match method {
            CompressionMethod::Stored => data,
            CompressionMethod::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
                encoder.write_all(data)?;
                payload = encoder.finish()?;
                &payload
            }
            CompressionMethod::Unknown(v) => {
                return Err(EpubError::Malformed(format!(
                    "unsupported compression method: {v}"
                )));
            }
        };
        let compressed_size = to_u32(compressed.len() as u64)?;

        // Local File Header
        self.writer.write_all(LFH_SIGNATURE)?;
        self.writer.write_u16::<LittleEndian>(VERSION_NEEDED)?;
        self.writer.write_u16::<LittleEndian>(0)?; // general purpose flags
        self.writer.write_u16::<LittleEndian>(method.as_u16())?;
        self.writer.write_u16::<LittleEndian>(DOS_EPOCH_TIME)?;
        self.writer.write_u16::<LittleEndian>(DOS_EPOCH_DATE)?;
        self.writer.write_u32::<LittleEndian>(crc32)?;
        self.writer.write_u32::<LittleEndian>(compressed_size)?;
        self.writer.write_u32::<LittleEndian>(uncompressed_size)?;
        self.writer.write_u16::<LittleEndian>(name_len)?;
        self.writer.write_u16::<LittleEndian>(0)?; // extra field length
        self.writer.write_all(file_name.as_bytes())?;

        // Entry data
        self.writer.write_all(compressed)?;

        self.offset += 30 + file_name.len() as u64 + compressed.len() as u64;

        self.entries.push(WrittenEntry {
            file_name: file_name.to_string(),
            compression_method: method,
            crc32,
            compressed_size,
            uncompressed_size,
            lfh_offset,
        });

        Ok(())
    }

    /// Write the Central Directory and EOCD, consuming the writer.
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = to_u32(self.offset)?;

        for entry in &self.entries {
            self.writer.write_all(CDFH_SIGNATURE)?;
            self.writer.write_u16::<LittleEndian>(VERSION_NEEDED)?; // version made by
            self.writer.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            self.writer.write_u16::<LittleEndian>(0)?; // general purpose flags
            self.writer
                .write_u16::<LittleEndian>(entry.compression_method.as_u16())?;
            self.writer.write_u16::<LittleEndian>(DOS_EPOCH_TIME)?;
            self.writer.write_u16::<LittleEndian>(DOS_EPOCH_DATE)?;
            self.writer.write_u32::<LittleEndian>(entry.crc32)?;
            self.writer
                .write_u32::<LittleEndian>(entry.compressed_size)?;
            self.writer
                .write_u32::<LittleEndian>(entry.uncompressed_size)?;
            self.writer
                .write_u16::<LittleEndian>(name_len(&entry.file_name)?)?;
            self.writer.write_u16::<LittleEndian>(0)?; // extra field length
            self.writer.write_u16::<LittleEndian>(0)?; // file comment length
            self.writer.write_u16::<LittleEndian>(0)?; // disk number start
            self.writer.write_u16::<LittleEndian>(0)?; // internal attributes
            self.writer.write_u32::<LittleEndian>(0)?; // external attributes
            self.writer.write_u32::<LittleEndian>(entry.lfh_offset)?;
            self.writer.write_all(entry.file_name.as_bytes())?;

            self.offset += 46 + entry.file_name.len() as u64;
        }

        let cd_size = to_u32(self.offset - cd_offset as u64)?;
        let total_entries = u16::try_from(self.entries.len())
            .map_err(|_| EpubError::Malformed("too many archive entries".into()))?;

        self.writer.write_all(EndOfCentralDirectory::SIGNATURE)?;
        self.writer.write_u16::<LittleEndian>(0)?; // disk number
        self.writer.write_u16::<LittleEndian>(0)?; // disk with central directory
        self.writer.write_u16::<LittleEndian>(total_entries)?;
        self.writer.write_u16::<LittleEndian>(total_entries)?;
        self.writer.write_u32::<LittleEndian>(cd_size)?;
        self.writer.write_u32::<LittleEndian>(cd_offset)?;
        self.writer.write_u16::<LittleEndian>(0)?; // comment length

        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// EPUB archives fit comfortably in 32-bit zip; reject anything that would
/// need ZIP64 rather than write a corrupt header.
fn to_u32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| EpubError::Malformed("archive exceeds 4 GiB limit".into()))
}

/// The name length fields in the LFH and CDFH are 16-bit.
fn name_len(file_name: &str) -> Result<u16> {
    u16::try_from(file_name.len())
        .map_err(|_| EpubError::Malformed(format!("entry name too long: {} bytes", file_name.len())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ReadAt;
    use crate::zip::reader::ZipReader;

    /// Source that never fills more than 7 bytes per positioned read.
    struct ShortReads(Vec<u8>);

    impl ReadAt for ShortReads {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> crate::error::Result<usize> {
            let len = buf.len().min(7);
            self.0.read_at(offset, &mut buf[..len])
        }

        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    #[test]
    fn round_trip_stored_and_deflate() {
        let mut writer = ZipWriter::new(Vec::new());
        writer
            .add_entry("mimetype", b"application/epub+zip", CompressionMethod::Stored)
            .unwrap();
        let body = "the quick brown fox jumps over the lazy dog ".repeat(50);
        writer
            .add_entry("OEBPS/chapter1.xhtml", body.as_bytes(), CompressionMethod::Deflate)
            .unwrap();
        let archive = writer.finish().unwrap();

        let reader = ZipReader::new(archive);
        let entries = reader.list_entries().unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].file_name, "mimetype");
        assert_eq!(entries[0].compression_method, CompressionMethod::Stored);
        assert_eq!(
            reader.read_entry(&entries[0]).unwrap(),
            b"application/epub+zip"
        );

        assert_eq!(entries[1].file_name, "OEBPS/chapter1.xhtml");
        assert_eq!(entries[1].compression_method, CompressionMethod::Deflate);
        assert!(entries[1].compressed_size < entries[1].uncompressed_size);
        assert_eq!(reader.read_entry(&entries[1]).unwrap(), body.as_bytes());
    }

    #[test]
    fn reads_back_through_short_positioned_reads() {
        let mut writer = ZipWriter::new(Vec::new());
        let body = "line of chapter text ".repeat(40);
        writer
            .add_entry("OEBPS/chapter1.xhtml", body.as_bytes(), CompressionMethod::Deflate)
            .unwrap();
        let archive = writer.finish().unwrap();

        let reader = ZipReader::new(ShortReads(archive));
        let entries = reader.list_entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(reader.read_entry(&entries[0]).unwrap(), body.as_bytes());
    }

    #[test]
    fn rejects_entry_name_longer_than_name_field() {
        let mut writer = ZipWriter::new(Vec::new());
        let name = "a".repeat(u16::MAX as usize + 1);
        let err = writer
            .add_entry(&name, b"x", CompressionMethod::Stored)
            .unwrap_err();
        assert!(matches!(err, EpubError::Malformed(_)));
    }

    #[test]
    fn preserves_entry_order() {
        let mut writer = ZipWriter::new(Vec::new());
        for name in ["mimetype", "META-INF/container.xml", "OEBPS/content.opf"] {
            writer
                .add_entry(name, b"x", CompressionMethod::Stored)
                .unwrap();
        }
        let archive = writer.finish().unwrap();

        let reader = ZipReader::new(archive);
        let names: Vec<String> = reader
            .list_entries()
            .unwrap()
            .into_iter()
            .map(|e| e.file_name)
            .collect();
        assert_eq!(
            names,
            ["mimetype", "META-INF/container.xml", "OEBPS/content.opf"]
        );
    }
}
