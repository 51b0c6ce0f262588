mod local;

pub use local::LocalFileReader;

use crate::error::Result;

/// Trait for random access reading from a data source.
///
/// The zip reader parses archives back-to-front (EOCD first, then the
/// central directory), so it needs positioned reads rather than a stream.
pub trait ReadAt {
    /// Read data at the specified offset into the buffer.
    ///
    /// May return fewer bytes than requested; parsers should go through
    /// [`ReadAt::read_exact_at`] instead.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Get the total size of the data source.
    fn size(&self) -> u64;

    /// Fill `buf` completely from `offset`, erroring on end of input.
    ///
    /// `read_at` is allowed to return short (a `pread` can), and a partly
    /// filled buffer would parse as zeroed zip structures.
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf)? {
                0 => {
                    return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
                }
                n => {
                    offset += n as u64;
                    let filled = buf;
                    buf = &mut filled[n..];
                }
            }
        }
        Ok(())
    }
}

/// In-memory reader, mainly useful for tests and round-trip checks.
impl ReadAt for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let start = (offset as usize).min(self.len());
        let end = (start + buf.len()).min(self.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self[start..end]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns at most 3 bytes per call, like a short `pread`.
    struct Trickle(Vec<u8>);

    impl ReadAt for Trickle {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
            let len = buf.len().min(3);
            self.0.read_at(offset, &mut buf[..len])
        }

        fn size(&self) -> u64 {
            self.0.len() as u64
        }
    }

    #[test]
    fn read_exact_at_fills_across_short_reads() {
        let data: Vec<u8> = (0u8..32).collect();
        let reader = Trickle(data.clone());

        let mut buf = vec![0u8; 20];
        reader.read_exact_at(5, &mut buf).unwrap();
        assert_eq!(buf, data[5..25]);
    }

    #[test]
    fn read_exact_at_errors_past_end_of_input() {
        let reader = Trickle(vec![1u8; 10]);
        let mut buf = vec![0u8; 20];
        assert!(reader.read_exact_at(0, &mut buf).is_err());
    }
}
