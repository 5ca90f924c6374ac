//! Data element header parsing.
//!
//! One [`ElementReader`] walks a single data set from start to finish. It
//! owns the small amount of state that element headers cannot carry on
//! their own: the effective byte order (which can change mid-stream on
//! byte-swapped files), whether the cursor is inside a sequence, and the
//! bookkeeping for producer-bug workarounds.

use crate::cursor::ByteCursor;
use crate::error::{InvalidFormatSnafu, Result};
use snafu::ensure;
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use tracing::debug;
use voxel_core::transfer_syntax::TransferSyntax;
use voxel_core::{DataElementHeader, Length, Tag, VR};
use voxel_dictionary::TagDictionary;

/// A stateful reader of data element headers.
#[derive(Debug)]
pub struct ElementReader {
    endianness: Endianness,
    explicit_vr: bool,
    dict: TagDictionary,
    in_sequence: bool,
    odd_offset_seen: bool,
}

impl ElementReader {
    /// Create a reader for a data set in the given transfer syntax.
    pub fn new(ts: &TransferSyntax) -> Self {
        ElementReader {
            endianness: ts.endianness(),
            explicit_vr: ts.explicit_vr(),
            dict: TagDictionary,
            in_sequence: false,
            odd_offset_seen: false,
        }
    }

    /// The byte order currently in effect.
    #[inline]
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Switch byte order and VR explicitness once the data set's actual
    /// transfer syntax is known, keeping the rest of the parsing state.
    pub fn set_transfer_syntax(&mut self, ts: &TransferSyntax) {
        self.endianness = ts.endianness();
        self.explicit_vr = ts.explicit_vr();
    }

    /// Force the reader out of sequence mode. The caller tracks the extent
    /// of defined-length sequences, which end without a delimiter.
    pub fn leave_sequence(&mut self) {
        self.in_sequence = false;
    }

    /// Whether the VR resolution currently assumes explicit VR.
    #[inline]
    pub fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// Whether the last returned element lies inside a sequence.
    #[inline]
    pub fn in_sequence(&self) -> bool {
        self.in_sequence
    }

    fn read_u16_at(&self, buf: &[u8]) -> u16 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_u16(buf),
            Endianness::Big => BigEndian::read_u16(buf),
        }
    }

    fn read_u32_at(&self, buf: &[u8]) -> u32 {
        match self.endianness {
            Endianness::Little => LittleEndian::read_u32(buf),
            Endianness::Big => BigEndian::read_u32(buf),
        }
    }

    /// Read one element header at the cursor.
    ///
    /// On return the cursor rests on the first byte of the value field
    /// (also recorded in the header). Sequence delimiters are returned
    /// like ordinary elements, with `VR::UN` and their declared length;
    /// the sequence state is updated as a side effect.
    pub fn read_element(&mut self, cursor: &mut ByteCursor<'_>) -> Result<DataElementHeader> {
        if cursor.pos() % 2 == 1 {
            self.odd_offset_seen = true;
        }

        let mut group = cursor.read_u16(self.endianness)?;
        if group == 0x0800 && self.endianness == Endianness::Big {
            // byte-swapped group number from a known producer: the data
            // set is little endian no matter what the meta group said
            debug!("byte-swapped group 0x0800, switching to little endian");
            self.endianness = Endianness::Little;
            group = 0x0008;
        }
        let element = cursor.read_u16(self.endianness)?;
        let tag = Tag(group, element);

        if tag.is_delimiter() {
            let offset = cursor.pos();
            let len = cursor.read_u32(self.endianness)?;
            let len = if Length(len).is_undefined() { 0 } else { len };
            if tag.is_item() {
                self.in_sequence = true;
            } else {
                // end delimiters must not declare a length
                ensure!(
                    len == 0,
                    InvalidFormatSnafu {
                        offset,
                        reason: "sequence delimiter with a nonzero length",
                    }
                );
                if tag.is_sequence_delimiter() {
                    self.in_sequence = false;
                }
            }
            return Ok(DataElementHeader::new(tag, VR::UN, Length(len), cursor.pos()));
        }

        // four bytes which are either an explicit VR (+ reserved bytes or
        // a 16-bit length) or a whole 32-bit implicit length
        let header = cursor.read_bytes(4)?;
        let candidate = VR::from_binary([header[0], header[1]]);

        let (mut vr, mut len) = match candidate {
            Some(vr) if vr.has_32bit_length() => {
                if header[2] == 0 || header[3] == 0 {
                    (vr, cursor.read_u32(self.endianness)?)
                } else {
                    // the reserved bytes carry data, so these four bytes
                    // could not have been an explicit VR after all
                    (VR::ImplicitRaw, self.read_u32_at(header))
                }
            }
            Some(vr) => (vr, u32::from(self.read_u16_at(&header[2..4]))),
            None => (VR::ImplicitRaw, self.read_u32_at(header)),
        };

        if vr == VR::ImplicitRaw {
            if let Some(known) = self.dict.vr_of(tag) {
                vr = known;
            }
        }

        let mut length = Length(len);
        if length.is_undefined() {
            self.in_sequence = true;
            length = Length(0);
        } else {
            if length.get() > cursor.remaining() {
                length = Length(cursor.remaining() as u32);
            }
            len = length.0;
            // one producer writes a length of 13 where 10 is meant, but
            // only in files that never misalign the element stream
            if len == 13 && !self.odd_offset_seen {
                debug!(tag = %tag, "applying length 13 -> 10 workaround");
                length = Length(10);
            }
        }

        Ok(DataElementHeader::new(tag, vr, length, cursor.pos()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxel_core::transfer_syntax;

    fn reader_le_explicit() -> ElementReader {
        ElementReader::new(&transfer_syntax::EXPLICIT_VR_LITTLE_ENDIAN)
    }

    #[test]
    fn explicit_16bit_length_element() {
        //  (0028,0010) US, length 2
        let data = [0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0xAA, 0xBB];
        let mut cursor = ByteCursor::new(&data);
        let mut reader = reader_le_explicit();
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0010));
        assert_eq!(header.vr, VR::US);
        assert_eq!(header.len, Length(2));
        assert_eq!(header.value_offset, 8);
    }

    #[test]
    fn explicit_32bit_length_element() {
        //  (7FE0,0010) OB, reserved, length 4
        let data = [
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 1, 2, 3, 4,
        ];
        let mut cursor = ByteCursor::new(&data);
        let mut reader = reader_le_explicit();
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.tag, Tag(0x7FE0, 0x0010));
        assert_eq!(header.vr, VR::OB);
        assert_eq!(header.len, Length(4));
        assert_eq!(header.value_offset, 12);
    }

    #[test]
    fn implicit_element_recovers_vr_from_dictionary() {
        //  (0028,0011) in implicit VR, length 2
        let data = [0x28, 0x00, 0x11, 0x00, 0x02, 0x00, 0x00, 0x00, 0x02, 0x00];
        let mut cursor = ByteCursor::new(&data);
        let mut reader = ElementReader::new(&transfer_syntax::IMPLICIT_VR_LITTLE_ENDIAN);
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0011));
        assert_eq!(header.vr, VR::US);
        assert_eq!(header.len, Length(2));
        assert_eq!(header.value_offset, 8);
    }

    #[test]
    fn unknown_implicit_element_stays_raw() {
        // private tag not in the dictionary
        let data = [0x09, 0x00, 0x01, 0x00, 0x04, 0x00, 0x00, 0x00, 1, 2, 3, 4];
        let mut cursor = ByteCursor::new(&data);
        let mut reader = ElementReader::new(&transfer_syntax::IMPLICIT_VR_LITTLE_ENDIAN);
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.vr, VR::ImplicitRaw);
        assert_eq!(header.len, Length(4));
    }

    #[test]
    fn demotes_explicit_vr_with_busy_reserved_bytes() {
        // bytes spell "OB" but the reserved field is non-zero on both
        // sides, so the whole quad must be an implicit 32-bit length
        let mut data = vec![0x09, 0x00, 0x01, 0x00, b'O', b'B', 0x01, 0x01];
        data.extend(std::iter::repeat(0).take(0x0101_424F_usize.min(64)));
        let mut cursor = ByteCursor::new(&data);
        let mut reader = reader_le_explicit();
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.vr, VR::ImplicitRaw);
        // the length is clamped to what remains
        assert_eq!(header.len, Length(64));
    }

    #[test]
    fn byte_swapped_group_flips_endianness() {
        // declared big endian, but group 0008 arrives little endian;
        // the element keeps parsing as little endian from there on
        let data = [
            0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T',
        ];
        let mut cursor = ByteCursor::new(&data);
        let mut reader = ElementReader::new(&transfer_syntax::EXPLICIT_VR_BIG_ENDIAN);
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.tag, Tag(0x0008, 0x0060));
        assert_eq!(header.vr, VR::CS);
        assert_eq!(header.len, Length(2));
        assert_eq!(reader.endianness(), Endianness::Little);
    }

    #[test]
    fn undefined_length_enters_sequence_mode() {
        let data = [
            0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        let mut cursor = ByteCursor::new(&data);
        let mut reader = reader_le_explicit();
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.vr, VR::SQ);
        assert_eq!(header.len, Length(0));
        assert!(reader.in_sequence());
    }

    #[test]
    fn sequence_delimiter_leaves_sequence_mode() {
        let data = [
            // SQ with undefined length
            0x08, 0x00, 0x40, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
            // item start, empty
            0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00,
            // sequence delimiter
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut cursor = ByteCursor::new(&data);
        let mut reader = reader_le_explicit();
        reader.read_element(&mut cursor).unwrap();
        assert!(reader.in_sequence());
        let item = reader.read_element(&mut cursor).unwrap();
        assert!(item.tag.is_item());
        assert!(reader.in_sequence());
        let delim = reader.read_element(&mut cursor).unwrap();
        assert!(delim.tag.is_sequence_delimiter());
        assert!(!reader.in_sequence());
    }

    #[test]
    fn length_13_quirk_applies_on_aligned_streams() {
        let mut data = vec![0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x0D, 0x00];
        data.extend_from_slice(b"CT PADPADPADP");
        let mut cursor = ByteCursor::new(&data);
        let mut reader = reader_le_explicit();
        let header = reader.read_element(&mut cursor).unwrap();
        assert_eq!(header.len, Length(10));
    }
}
