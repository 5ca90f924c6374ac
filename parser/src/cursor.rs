//! An endianness-aware reader over an in-memory byte slice.

use crate::error::{Result, ShortReadSnafu};
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::ensure;

/// Exclusive reading cursor over a borrowed byte slice.
///
/// All multi-byte reads take the endianness as an argument, since a single
/// DICOM stream can switch interpretation mid-way (byte-swapped group
/// numbers from known bad producers). A read past the end of the data
/// advances the position to the end before returning
/// [`ShortRead`](crate::error::Error::ShortRead), so that callers watching
/// the position can tell underflow from a clean stop.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteCursor { data, pos: 0 }
    }

    /// The current read position.
    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The number of bytes left to read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The total length of the underlying data.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the cursor has consumed all data.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Take `len` bytes, or fail with `ShortRead` after advancing to the
    /// end of the data.
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            let err = ShortReadSnafu {
                needed: len,
                available: self.remaining(),
                offset: self.pos,
            };
            self.pos = self.data.len();
            return err.fail();
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self, endianness: Endianness) -> Result<u16> {
        let buf = self.take(2)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_u16(buf),
            Endianness::Big => BigEndian::read_u16(buf),
        })
    }

    pub fn read_u32(&mut self, endianness: Endianness) -> Result<u32> {
        let buf = self.take(4)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_u32(buf),
            Endianness::Big => BigEndian::read_u32(buf),
        })
    }

    pub fn read_f32(&mut self, endianness: Endianness) -> Result<f32> {
        let buf = self.take(4)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_f32(buf),
            Endianness::Big => BigEndian::read_f32(buf),
        })
    }

    pub fn read_f64(&mut self, endianness: Endianness) -> Result<f64> {
        let buf = self.take(8)?;
        Ok(match endianness {
            Endianness::Little => LittleEndian::read_f64(buf),
            Endianness::Big => BigEndian::read_f64(buf),
        })
    }

    /// Read `len` bytes as text, best-effort UTF-8, with trailing NUL
    /// padding and surrounding whitespace removed.
    pub fn read_string(&mut self, len: usize) -> Result<String> {
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes)
            .trim_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string())
    }

    /// Borrow `len` raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Advance the cursor without reading.
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Reposition the cursor to an absolute offset.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        ensure!(
            pos <= self.data.len(),
            ShortReadSnafu {
                needed: pos - self.data.len(),
                available: 0usize,
                offset: self.data.len(),
            }
        );
        self.pos = pos;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn primitive_reads_both_endians() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u16(Endianness::Little).unwrap(), 0x0201);
        assert_eq!(cursor.read_u16(Endianness::Big).unwrap(), 0x0304);
        assert_eq!(cursor.pos(), 4);

        let mut cursor = ByteCursor::new(&data);
        assert_eq!(cursor.read_u32(Endianness::Little).unwrap(), 0x0403_0201);
    }

    #[test]
    fn string_trimming() {
        let data = b"1.2.840.10008.1.2.1\0";
        let mut cursor = ByteCursor::new(data);
        assert_eq!(
            cursor.read_string(data.len()).unwrap(),
            "1.2.840.10008.1.2.1"
        );
    }

    #[test]
    fn short_read_reports_and_exhausts() {
        let data = [0x01, 0x02];
        let mut cursor = ByteCursor::new(&data);
        let err = cursor.read_u32(Endianness::Little).unwrap_err();
        match err {
            Error::ShortRead {
                needed, available, ..
            } => {
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cursor.is_at_end());
    }

    #[test]
    fn seek_and_skip() {
        let data = [0u8; 16];
        let mut cursor = ByteCursor::new(&data);
        cursor.skip(4).unwrap();
        assert_eq!(cursor.pos(), 4);
        cursor.seek(12).unwrap();
        assert_eq!(cursor.remaining(), 4);
        assert!(cursor.seek(17).is_err());
    }
}
