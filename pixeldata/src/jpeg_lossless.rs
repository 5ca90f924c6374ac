//! JPEG Lossless (Process 14) bit-stream decoding.
//!
//! DICOM transfer syntaxes 1.2.840.10008.1.2.4.57 and .70 wrap a plain
//! ITU-T T.81 lossless scan: a marker segment sequence (`SOI`, `SOF3`,
//! `DHT`, `SOS`), followed by Huffman-coded prediction differences. This
//! module decodes a single-component scan into raster-order samples.
//!
//! Selection values other than 1 (predict from the left neighbour) are
//! parsed and reported, but decoding always uses first-order prediction,
//! which is what every producer of these syntaxes emits.

use crate::{DecodeError, InvalidJpegSnafu};
use byteorder::{BigEndian, ByteOrder};
use snafu::ensure;
use tracing::warn;

const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOF3: u8 = 0xC3;
const MARKER_DHT: u8 = 0xC4;
const MARKER_SOS: u8 = 0xDA;

/// The output of a decoded lossless scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedScan {
    /// Samples in raster order, one per pixel.
    pub pixels: Vec<u16>,
    pub width: u32,
    pub height: u32,
    /// Sample precision in bits (up to 16).
    pub precision: u8,
}

/// Decode a complete JPEG Lossless stream (from `SOI` to `EOI`).
pub fn decode(stream: &[u8]) -> Result<DecodedScan, DecodeError> {
    Decoder::new(stream).decode()
}

#[derive(Debug, Clone, Copy, Default)]
struct FrameHeader {
    precision: u8,
    width: u32,
    height: u32,
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    frame: Option<FrameHeader>,
    dc_tables: [Option<HuffmanTable>; 4],
}

impl<'a> Decoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Decoder {
            data,
            pos: 0,
            frame: None,
            dc_tables: [None, None, None, None],
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        ensure!(
            self.pos + len <= self.data.len(),
            InvalidJpegSnafu {
                reason: "stream ended inside a marker segment",
            }
        );
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(BigEndian::read_u16(self.take(2)?))
    }

    /// Read the next marker code, skipping fill bytes.
    fn read_marker(&mut self) -> Result<u8, DecodeError> {
        let byte = self.read_u8()?;
        ensure!(
            byte == 0xFF,
            InvalidJpegSnafu {
                reason: "expected a marker",
            }
        );
        let mut code = self.read_u8()?;
        while code == 0xFF {
            code = self.read_u8()?;
        }
        Ok(code)
    }

    fn decode(mut self) -> Result<DecodedScan, DecodeError> {
        ensure!(
            self.read_marker()? == MARKER_SOI,
            InvalidJpegSnafu {
                reason: "missing SOI marker",
            }
        );

        loop {
            let marker = self.read_marker()?;
            match marker {
                MARKER_SOF3 => self.parse_frame_header()?,
                MARKER_DHT => self.parse_huffman_tables()?,
                MARKER_SOS => return self.parse_scan(),
                MARKER_EOI => {
                    return InvalidJpegSnafu {
                        reason: "EOI before any scan data",
                    }
                    .fail()
                }
                // any other frame type is not lossless process 14
                0xC0..=0xC2 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                    return InvalidJpegSnafu {
                        reason: "frame is not JPEG Lossless (SOF3)",
                    }
                    .fail()
                }
                _ => {
                    // skip APPn, COM and friends by their declared length
                    let len = self.read_u16()?;
                    ensure!(
                        len >= 2,
                        InvalidJpegSnafu {
                            reason: "marker segment length too small",
                        }
                    );
                    self.take(len as usize - 2)?;
                }
            }
        }
    }

    fn parse_frame_header(&mut self) -> Result<(), DecodeError> {
        let len = self.read_u16()?;
        ensure!(
            len >= 8,
            InvalidJpegSnafu {
                reason: "SOF3 segment too short",
            }
        );
        let precision = self.read_u8()?;
        let height = u32::from(self.read_u16()?);
        let width = u32::from(self.read_u16()?);
        let components = self.read_u8()?;
        ensure!(
            (2..=16).contains(&precision),
            InvalidJpegSnafu {
                reason: "unsupported sample precision",
            }
        );
        ensure!(
            width > 0 && height > 0,
            InvalidJpegSnafu {
                reason: "empty frame",
            }
        );
        ensure!(
            components == 1,
            InvalidJpegSnafu {
                reason: "only single-component lossless scans are supported",
            }
        );
        // component entries: id, sampling factors, quantization selector
        for _ in 0..components {
            self.take(3)?;
        }
        self.frame = Some(FrameHeader {
            precision,
            width,
            height,
        });
        Ok(())
    }

    /// A DHT segment may carry several tables back to back.
    fn parse_huffman_tables(&mut self) -> Result<(), DecodeError> {
        let len = self.read_u16()?;
        ensure!(
            len >= 2,
            InvalidJpegSnafu {
                reason: "DHT segment too short",
            }
        );
        let end = self.pos + len as usize - 2;
        while self.pos < end {
            let class_and_id = self.read_u8()?;
            let class = class_and_id >> 4;
            let id = (class_and_id & 0x0F) as usize;
            ensure!(
                id < 4,
                InvalidJpegSnafu {
                    reason: "Huffman table id out of range",
                }
            );
            let mut counts = [0u8; 16];
            counts.copy_from_slice(self.take(16)?);
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            let values = self.take(total)?.to_vec();
            // lossless scans only use DC-class tables
            if class == 0 {
                self.dc_tables[id] = Some(HuffmanTable::build(&counts, values));
            }
        }
        ensure!(
            self.pos == end,
            InvalidJpegSnafu {
                reason: "DHT segment length mismatch",
            }
        );
        Ok(())
    }

    fn parse_scan(mut self) -> Result<DecodedScan, DecodeError> {
        let frame = self.frame.ok_or_else(|| {
            InvalidJpegSnafu {
                reason: "SOS before SOF3",
            }
            .build()
        })?;

        let len = self.read_u16()?;
        ensure!(
            len >= 6,
            InvalidJpegSnafu {
                reason: "SOS segment too short",
            }
        );
        let components = self.read_u8()?;
        ensure!(
            components == 1,
            InvalidJpegSnafu {
                reason: "only single-component lossless scans are supported",
            }
        );
        self.read_u8()?; // component selector
        let table_selectors = self.read_u8()?;
        let dc_selector = (table_selectors >> 4) as usize;
        let predictor = self.read_u8()?; // Ss: predictor selection value
        self.read_u8()?; // Se, always zero in lossless
        self.read_u8()?; // Ah/Al, point transform unused here

        if predictor != 1 {
            warn!(
                predictor,
                "non-SV1 predictor selection; decoding with first-order prediction"
            );
        }

        let table = self.dc_tables[dc_selector].take().ok_or_else(|| {
            InvalidJpegSnafu {
                reason: "scan references an undefined Huffman table",
            }
            .build()
        })?;

        let entropy = &self.data[self.pos..];
        decode_samples(entropy, &table, frame)
    }
}

/// Decode the entropy-coded segment into raster-order samples.
fn decode_samples(
    entropy: &[u8],
    table: &HuffmanTable,
    frame: FrameHeader,
) -> Result<DecodedScan, DecodeError> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    let mut pixels = vec![0u16; width * height];
    let mut bits = BitReader::new(entropy);

    let half = 1i32 << (frame.precision - 1);
    let mask = (1i32 << frame.precision) - 1;

    for row in 0..height {
        for col in 0..width {
            let category = table.decode_symbol(&mut bits)?;
            let diff = read_difference(&mut bits, category)?;
            let predictor = if col == 0 {
                // each row restarts from the midpoint of the sample range
                half
            } else {
                i32::from(pixels[row * width + col - 1])
            };
            let value = (predictor + diff) & mask;
            pixels[row * width + col] = value as u16;
        }
    }

    Ok(DecodedScan {
        pixels,
        width: frame.width,
        height: frame.height,
        precision: frame.precision,
    })
}

/// Read the difference value for a magnitude category.
///
/// Every nonzero category, 16 included, carries as many magnitude bits
/// as its number says; a leading 1 bit means the difference is positive,
/// otherwise it is offset downwards by `2^s - 1`.
fn read_difference(bits: &mut BitReader<'_>, category: u8) -> Result<i32, DecodeError> {
    match category {
        0 => Ok(0),
        s if s <= 16 => {
            let raw = bits.read_bits(s)? as i32;
            if raw >> (s - 1) == 1 {
                Ok(raw)
            } else {
                Ok(raw - (1 << s) + 1)
            }
        }
        _ => InvalidJpegSnafu {
            reason: "difference category out of range",
        }
        .fail(),
    }
}

/// A decoding table built with the F.2.2.3 procedure: for each code
/// length, the smallest and largest code and the index of the first
/// symbol of that length.
#[derive(Debug, Clone)]
struct HuffmanTable {
    min_code: [i32; 17],
    max_code: [i32; 17],
    val_ptr: [usize; 17],
    values: Vec<u8>,
}

impl HuffmanTable {
    fn build(counts: &[u8; 16], values: Vec<u8>) -> Self {
        let mut min_code = [0i32; 17];
        let mut max_code = [-1i32; 17];
        let mut val_ptr = [0usize; 17];

        let mut code = 0i32;
        let mut index = 0usize;
        for length in 1..=16 {
            let count = counts[length - 1] as usize;
            if count > 0 {
                val_ptr[length] = index;
                min_code[length] = code;
                code += count as i32;
                max_code[length] = code - 1;
                index += count;
            }
            code <<= 1;
        }

        HuffmanTable {
            min_code,
            max_code,
            val_ptr,
            values,
        }
    }

    fn decode_symbol(&self, bits: &mut BitReader<'_>) -> Result<u8, DecodeError> {
        let mut code = i32::from(bits.read_bit()?);
        let mut length = 1usize;
        while code > self.max_code[length] {
            ensure!(
                length < 16,
                InvalidJpegSnafu {
                    reason: "Huffman code longer than 16 bits",
                }
            );
            code = (code << 1) | i32::from(bits.read_bit()?);
            length += 1;
        }
        let index = self.val_ptr[length] + (code - self.min_code[length]) as usize;
        self.values.get(index).copied().ok_or_else(|| {
            InvalidJpegSnafu {
                reason: "Huffman code outside the symbol table",
            }
            .build()
        })
    }
}

/// MSB-first bit reader over the entropy-coded segment.
///
/// The byte pair `FF 00` is a stuffed `FF` data byte; any other `FF xx`
/// pair is a marker and terminates the segment. Running out of bits while
/// samples are still owed is a hard error.
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    current: u8,
    bits_left: u8,
    terminated: bool,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader {
            data,
            pos: 0,
            current: 0,
            bits_left: 0,
            terminated: false,
        }
    }

    fn next_byte(&mut self) -> Result<u8, DecodeError> {
        ensure!(
            !self.terminated && self.pos < self.data.len(),
            InvalidJpegSnafu {
                reason: "entropy-coded segment exhausted",
            }
        );
        let byte = self.data[self.pos];
        if byte == 0xFF {
            ensure!(
                self.pos + 1 < self.data.len(),
                InvalidJpegSnafu {
                    reason: "truncated FF at end of entropy-coded segment",
                }
            );
            if self.data[self.pos + 1] == 0x00 {
                self.pos += 2;
                return Ok(0xFF);
            }
            // a real marker; no more data bytes follow
            self.terminated = true;
            return InvalidJpegSnafu {
                reason: "entropy-coded segment exhausted",
            }
            .fail();
        }
        self.pos += 1;
        Ok(byte)
    }

    fn read_bit(&mut self) -> Result<u8, DecodeError> {
        if self.bits_left == 0 {
            self.current = self.next_byte()?;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok((self.current >> self.bits_left) & 1)
    }

    fn read_bits(&mut self, count: u8) -> Result<u32, DecodeError> {
        let mut out = 0u32;
        for _ in 0..count {
            out = (out << 1) | u32::from(self.read_bit()?);
        }
        Ok(out)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{build_stream, build_stream_with_precision, test_table};
    use super::*;

    #[test]
    fn huffman_table_follows_f223() {
        let (counts, values) = test_table();
        let table = HuffmanTable::build(&counts, values);
        assert_eq!(table.min_code[2], 0b00);
        assert_eq!(table.max_code[2], 0b00);
        assert_eq!(table.min_code[3], 0b010);
        assert_eq!(table.max_code[3], 0b011);
        assert_eq!(table.val_ptr[3], 1);
        // lengths with no codes stay unreachable
        assert_eq!(table.max_code[1], -1);
    }

    #[test]
    fn bit_reader_destuffs_ff00() {
        let data = [0xAB, 0xFF, 0x00, 0xCD];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_bits(24).unwrap(), 0xABFFCD);
    }

    #[test]
    fn bit_reader_stops_at_markers() {
        let data = [0xAB, 0xFF, 0xD9];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_bits(8).unwrap(), 0xAB);
        assert!(bits.read_bit().is_err());
    }

    #[test]
    fn bit_reader_rejects_truncated_ff() {
        let data = [0xFF];
        let mut bits = BitReader::new(&data);
        assert!(bits.read_bit().is_err());
    }

    #[test]
    fn decodes_2x2_with_row_restart() {
        // rows restart the predictor at 128 (precision 8)
        let stream = build_stream(2, 2, &[0, 5, -3, 1]);
        let scan = decode(&stream).unwrap();
        assert_eq!(scan.width, 2);
        assert_eq!(scan.height, 2);
        assert_eq!(scan.precision, 8);
        assert_eq!(scan.pixels, vec![128, 133, 125, 126]);
    }

    #[test]
    fn category_16_reads_its_magnitude_bits() {
        // full-range differences carry 16 magnitude bits like any other
        // category; the samples after them only come out right if the
        // reader consumes exactly those bits
        let stream = build_stream_with_precision(4, 1, 16, &[32768, 5, -32768, -3]);
        let scan = decode(&stream).unwrap();
        assert_eq!(scan.precision, 16);
        // 32768 + 32768 wraps to 0; 5 - 32768 wraps to 32773
        assert_eq!(scan.pixels, vec![0, 5, 32773, 32770]);
    }

    #[test]
    fn differences_wrap_modulo_precision() {
        let stream = build_stream(2, 1, &[-120, -20]);
        let scan = decode(&stream).unwrap();
        // 128 - 120 = 8; 8 - 20 wraps to 244
        assert_eq!(scan.pixels, vec![8, 244]);
    }

    #[test]
    fn rejects_non_lossless_frames() {
        let mut stream = vec![0xFF, 0xD8, 0xFF, 0xC0];
        stream.extend_from_slice(&11u16.to_be_bytes());
        stream.extend_from_slice(&[8, 0, 2, 0, 2, 1, 1, 0x11, 0]);
        let err = decode(&stream).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJpeg { .. }));
    }

    #[test]
    fn rejects_missing_soi() {
        assert!(decode(&[0x00, 0x11, 0x22]).is_err());
    }

    #[test]
    fn rejects_scan_without_tables() {
        let mut out = vec![0xFF, 0xD8];
        out.extend_from_slice(&[0xFF, 0xC3]);
        out.extend_from_slice(&11u16.to_be_bytes());
        out.extend_from_slice(&[8, 0, 2, 0, 2, 1, 1, 0x11, 0]);
        out.extend_from_slice(&[0xFF, 0xDA]);
        out.extend_from_slice(&8u16.to_be_bytes());
        out.extend_from_slice(&[1, 1, 0x00, 1, 0, 0]);
        assert!(decode(&out).is_err());
    }
}
