//! Header walking: element iteration, typed attribute extraction, and the
//! formatted metadata dictionary.

use crate::{NotDicomSnafu, ParseElementSnafu, PixelAttributesSnafu, ReadError};
use byteordered::byteorder::{ByteOrder, LittleEndian};
use smallvec::SmallVec;
use snafu::{ensure, ResultExt};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, warn};
use voxel_core::transfer_syntax::{self, TransferSyntax};
use voxel_core::{
    DataElementHeader, ImageInfo, PhotometricInterpretation, PixelRepresentation, Tag, Vector3, VR,
};
use voxel_dictionary::{tags, TagDictionary};
use voxel_parser::{ByteCursor, ElementReader, Error as ParserError};

/// Offset of the `DICM` magic code, right after the 128-byte preamble.
const MAGIC_OFFSET: usize = 128;
/// Upper bound on the number of elements walked before bailing out.
const MAX_ELEMENTS: usize = 10_000;
/// Implicit values longer than this are not worth recording as text.
const MAX_RAW_TEXT_LEN: usize = 44;

/// Palette lookup tables, downsampled to 8 bits per entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaletteLut {
    pub red: Vec<u8>,
    pub green: Vec<u8>,
    pub blue: Vec<u8>,
}

/// Everything a single pass over the header produces.
#[derive(Debug)]
pub(crate) struct ParsedHeader {
    pub ts: TransferSyntax,
    pub info: ImageInfo,
    pub metadata: BTreeMap<Tag, String>,
    pub palette: PaletteLut,
    pub pixel_data_offset: Option<usize>,
    pub pixel_data_len: usize,
}

/// Parse the header of an in-memory DICOM file, stopping at pixel data.
pub(crate) fn walk_header(data: &[u8]) -> Result<ParsedHeader, ReadError> {
    Walker::new(data)?.walk()
}

struct Walker<'a> {
    data: &'a [u8],
    cursor: ByteCursor<'a>,
    reader: ElementReader,
    dict: TagDictionary,
    ts: TransferSyntax,
    /// data set syntax seen in the meta group, applied once group 0002 ends
    pending_ts: Option<TransferSyntax>,
    /// end offset of a defined-length sequence being walked, if any
    sequence_end: Option<usize>,
    info: ImageInfo,
    metadata: BTreeMap<Tag, String>,
    palette: PaletteLut,
    pixel_data_offset: Option<usize>,
    pixel_data_len: usize,
}

impl<'a> Walker<'a> {
    fn new(data: &'a [u8]) -> Result<Self, ReadError> {
        ensure!(data.len() >= MAGIC_OFFSET + 4, NotDicomSnafu);
        ensure!(
            &data[MAGIC_OFFSET..MAGIC_OFFSET + 4] == b"DICM",
            NotDicomSnafu
        );

        let mut cursor = ByteCursor::new(data);
        cursor
            .seek(MAGIC_OFFSET + 4)
            .map_err(|_| NotDicomSnafu.build())?;

        // the file meta group is always explicit VR little endian
        let ts = transfer_syntax::EXPLICIT_VR_LITTLE_ENDIAN;
        Ok(Walker {
            data,
            cursor,
            reader: ElementReader::new(&ts),
            dict: TagDictionary,
            ts,
            pending_ts: None,
            sequence_end: None,
            info: ImageInfo::default(),
            metadata: BTreeMap::new(),
            palette: PaletteLut::default(),
            pixel_data_offset: None,
            pixel_data_len: 0,
        })
    }

    fn walk(mut self) -> Result<ParsedHeader, ReadError> {
        for _ in 0..MAX_ELEMENTS {
            if self.cursor.is_at_end() {
                break;
            }
            self.maybe_apply_pending_syntax();
            self.maybe_leave_defined_sequence();

            let offset = self.cursor.pos();
            let header = match self.reader.read_element(&mut self.cursor) {
                Ok(header) => header,
                // a header torn off by the end of the file is an end of
                // data, not a structural failure
                Err(ParserError::ShortRead { .. }) => break,
                Err(e) => return Err(e).context(ParseElementSnafu { offset }),
            };

            if header.tag.is_delimiter() {
                continue;
            }

            if header.tag == tags::PIXEL_DATA {
                self.pixel_data_offset = Some(header.value_offset);
                self.pixel_data_len = if header.len.get() > 0 {
                    header.len.get()
                } else {
                    // undefined length: encapsulated fragments run to the
                    // end of the file
                    self.cursor.remaining()
                };
                break;
            }

            if self.dispatch(&header).is_err() {
                // value reads only fail when the stream is exhausted
                break;
            }
        }

        if self.pixel_data_offset.is_none() {
            self.recover_trailing_pixels();
        }

        if self.pixel_data_offset.is_some() {
            ensure!(
                self.info.width > 0 && self.info.height > 0,
                PixelAttributesSnafu {
                    reason: "missing Rows or Columns before pixel data",
                }
            );
        }

        Ok(ParsedHeader {
            ts: self.ts,
            info: self.info,
            metadata: self.metadata,
            palette: self.palette,
            pixel_data_offset: self.pixel_data_offset,
            pixel_data_len: self.pixel_data_len,
        })
    }

    /// Apply the data set transfer syntax once the meta group is over.
    ///
    /// The meta group is always explicit little endian, so the switch has
    /// to wait until the next element no longer belongs to group 0002.
    fn maybe_apply_pending_syntax(&mut self) {
        if let Some(ts) = self.pending_ts {
            let pos = self.cursor.pos();
            if pos + 2 <= self.data.len() {
                let group = LittleEndian::read_u16(&self.data[pos..pos + 2]);
                if group != 0x0002 {
                    self.reader.set_transfer_syntax(&ts);
                    self.pending_ts = None;
                }
            }
        }
    }

    /// Defined-length sequences end without a delimiter; clear the state
    /// once the cursor moves past their extent.
    fn maybe_leave_defined_sequence(&mut self) {
        if let Some(end) = self.sequence_end {
            if self.cursor.pos() >= end {
                self.reader.leave_sequence();
                self.sequence_end = None;
            }
        }
    }

    fn dispatch(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let tag = header.tag;
        if !self.reader.in_sequence() {
            match tag {
                t if t == tags::TRANSFER_SYNTAX_UID => return self.handle_transfer_syntax(header),
                t if t == tags::MODALITY => return self.handle_modality(header),
                t if t == tags::SERIES_DESCRIPTION => return self.handle_series_description(header),
                t if t == tags::NUMBER_OF_FRAMES => return self.handle_number_of_frames(header),
                t if t == tags::SAMPLES_PER_PIXEL => return self.handle_samples_per_pixel(header),
                t if t == tags::PHOTOMETRIC_INTERPRETATION => {
                    return self.handle_photometric(header)
                }
                t if t == tags::PLANAR_CONFIGURATION => return self.handle_planar(header),
                t if t == tags::ROWS => return self.handle_rows(header),
                t if t == tags::COLUMNS => return self.handle_columns(header),
                t if t == tags::PIXEL_SPACING => return self.handle_pixel_spacing(header),
                t if t == tags::IMAGE_ORIENTATION_PATIENT => {
                    return self.handle_orientation(header)
                }
                t if t == tags::IMAGE_POSITION_PATIENT => return self.handle_position(header),
                t if t == tags::SLICE_THICKNESS || t == tags::SPACING_BETWEEN_SLICES => {
                    return self.handle_slice_spacing(header)
                }
                t if t == tags::BITS_ALLOCATED => return self.handle_bits_allocated(header),
                t if t == tags::PIXEL_REPRESENTATION => {
                    return self.handle_pixel_representation(header)
                }
                t if t == tags::WINDOW_CENTER || t == tags::WINDOW_WIDTH => {
                    return self.handle_window(header)
                }
                t if t == tags::RESCALE_INTERCEPT || t == tags::RESCALE_SLOPE => {
                    return self.handle_rescale(header)
                }
                t if t == tags::INSTANCE_NUMBER => return self.handle_instance_number(header),
                t if t == tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DATA
                    || t == tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DATA
                    || t == tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DATA =>
                {
                    return self.handle_palette(header)
                }
                _ => {}
            }
        }
        self.generic(header)
    }

    // -- generic recording --

    fn record(&mut self, tag: Tag, value: &str) {
        let name = self.dict.name_of(tag).unwrap_or("Private Tag");
        let prefix = if self.reader.in_sequence() { ">" } else { "" };
        self.metadata
            .insert(tag, format!("{}{}: {}", prefix, name, value));
    }

    fn generic(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let len = header.len.get();
        match header.vr {
            vr if vr.is_string() => {
                let text = self.cursor.read_string(len)?;
                self.record(header.tag, &text);
            }
            VR::US => {
                let mut parts: SmallVec<[String; 4]> = SmallVec::new();
                for _ in 0..len / 2 {
                    parts.push(self.cursor.read_u16(self.reader.endianness())?.to_string());
                }
                // odd tail byte, if any
                self.cursor.skip(len % 2)?;
                self.record(header.tag, &parts.join(" "));
            }
            VR::FD => {
                let mut parts: SmallVec<[String; 4]> = SmallVec::new();
                for _ in 0..len / 8 {
                    parts.push(self.cursor.read_f64(self.reader.endianness())?.to_string());
                }
                self.cursor.skip(len % 8)?;
                self.record(header.tag, &parts.join(" "));
            }
            VR::FL => {
                let mut parts: SmallVec<[String; 4]> = SmallVec::new();
                for _ in 0..len / 4 {
                    parts.push(self.cursor.read_f32(self.reader.endianness())?.to_string());
                }
                self.cursor.skip(len % 4)?;
                self.record(header.tag, &parts.join(" "));
            }
            VR::SQ => {
                if header.tag == tags::ICON_IMAGE_SEQUENCE || header.tag.is_private() {
                    // not worth walking into; icons carry their own
                    // conflicting image attributes
                    self.cursor.skip(len)?;
                } else {
                    self.record(header.tag, "");
                    if len > 0 {
                        self.sequence_end = Some(header.value_offset + len);
                    }
                }
            }
            VR::ImplicitRaw => {
                if len <= MAX_RAW_TEXT_LEN {
                    let text = self.cursor.read_string(len)?;
                    self.record(header.tag, &text);
                } else {
                    self.cursor.skip(len)?;
                }
            }
            _ => {
                self.cursor.skip(len)?;
            }
        }
        Ok(())
    }

    // -- typed handlers --

    fn read_text(&mut self, header: &DataElementHeader) -> Result<String, ParserError> {
        self.cursor.read_string(header.len.get())
    }

    /// Read a decimal-string value list (`1.5\2.5\...`).
    fn read_decimals(
        &mut self,
        header: &DataElementHeader,
    ) -> Result<SmallVec<[f64; 6]>, ParserError> {
        let text = self.cursor.read_string(header.len.get())?;
        Ok(text
            .split('\\')
            .filter_map(|part| part.trim().parse::<f64>().ok())
            .collect())
    }

    fn read_u16_value(&mut self, header: &DataElementHeader) -> Result<u16, ParserError> {
        let value = self.cursor.read_u16(self.reader.endianness())?;
        if header.len.get() > 2 {
            self.cursor.skip(header.len.get() - 2)?;
        }
        Ok(value)
    }

    fn handle_transfer_syntax(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let uid = self.read_text(header)?;
        self.ts = transfer_syntax::lookup(&uid);
        self.pending_ts = Some(self.ts);
        debug!(uid = %self.ts.uid(), name = %self.ts.name(), "transfer syntax");
        self.record(header.tag, &uid);
        Ok(())
    }

    fn handle_modality(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let text = self.read_text(header)?;
        self.info.modality = Some(text.clone());
        self.record(header.tag, &text);
        Ok(())
    }

    fn handle_series_description(
        &mut self,
        header: &DataElementHeader,
    ) -> Result<(), ParserError> {
        let text = self.read_text(header)?;
        self.info.series_description = Some(text.clone());
        self.record(header.tag, &text);
        Ok(())
    }

    fn handle_number_of_frames(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let text = self.read_text(header)?;
        if let Ok(frames) = text.trim().parse::<u32>() {
            self.info.number_of_frames = frames.max(1);
        }
        self.record(header.tag, &text);
        Ok(())
    }

    fn handle_samples_per_pixel(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let value = self.read_u16_value(header)?;
        self.info.samples_per_pixel = value;
        self.record(header.tag, &value.to_string());
        Ok(())
    }

    fn handle_photometric(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let text = self.read_text(header)?;
        if let Ok(photometric) = PhotometricInterpretation::from_str(&text) {
            self.info.photometric = photometric;
        }
        self.record(header.tag, &text);
        Ok(())
    }

    fn handle_planar(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let value = self.read_u16_value(header)?;
        self.info.planar_configuration = value;
        self.record(header.tag, &value.to_string());
        Ok(())
    }

    fn handle_rows(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let value = self.read_u16_value(header)?;
        self.info.height = u32::from(value);
        self.record(header.tag, &value.to_string());
        Ok(())
    }

    fn handle_columns(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let value = self.read_u16_value(header)?;
        self.info.width = u32::from(value);
        self.record(header.tag, &value.to_string());
        Ok(())
    }

    /// Pixel Spacing is `row spacing \ column spacing`, i.e. `y\x`.
    fn handle_pixel_spacing(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let values = self.read_decimals(header)?;
        if values.len() >= 2 {
            self.info.pixel_spacing.y = values[0];
            self.info.pixel_spacing.x = values[1];
        }
        self.record(
            header.tag,
            &values
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join("\\"),
        );
        Ok(())
    }

    fn handle_orientation(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let v = self.read_decimals(header)?;
        if v.len() >= 6 {
            let row = Vector3::new(v[0], v[1], v[2]).normalized();
            let col = Vector3::new(v[3], v[4], v[5]).normalized();
            self.info.orientation = Some((row, col));
        }
        self.record(
            header.tag,
            &v.iter().map(f64::to_string).collect::<Vec<_>>().join("\\"),
        );
        Ok(())
    }

    fn handle_position(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let v = self.read_decimals(header)?;
        if v.len() >= 3 {
            self.info.position = Some(Vector3::new(v[0], v[1], v[2]));
        }
        self.record(
            header.tag,
            &v.iter().map(f64::to_string).collect::<Vec<_>>().join("\\"),
        );
        Ok(())
    }

    fn handle_slice_spacing(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let values = self.read_decimals(header)?;
        if let Some(&depth) = values.first() {
            if depth > 0.0 {
                self.info.pixel_spacing.z = depth;
            }
        }
        self.record(
            header.tag,
            &values.first().map(f64::to_string).unwrap_or_default(),
        );
        Ok(())
    }

    fn handle_bits_allocated(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let value = self.read_u16_value(header)?;
        self.info.bit_depth = value;
        self.record(header.tag, &value.to_string());
        Ok(())
    }

    fn handle_pixel_representation(
        &mut self,
        header: &DataElementHeader,
    ) -> Result<(), ParserError> {
        let value = self.read_u16_value(header)?;
        self.info.pixel_representation = if value == 1 {
            PixelRepresentation::Signed
        } else {
            PixelRepresentation::Unsigned
        };
        self.record(header.tag, &value.to_string());
        Ok(())
    }

    /// Window attributes are multi-valued; the last value wins.
    fn handle_window(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let tag = header.tag;
        let values = self.read_decimals(header)?;
        if let Some(&value) = values.last() {
            if tag == tags::WINDOW_CENTER {
                self.info.window_center = Some(value);
            } else {
                self.info.window_width = Some(value);
            }
        }
        self.record(
            tag,
            &values.last().map(f64::to_string).unwrap_or_default(),
        );
        Ok(())
    }

    fn handle_rescale(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let tag = header.tag;
        let values = self.read_decimals(header)?;
        if let Some(&value) = values.first() {
            if tag == tags::RESCALE_INTERCEPT {
                self.info.rescale_intercept = value;
            } else {
                self.info.rescale_slope = value;
            }
        }
        self.record(
            tag,
            &values.first().map(f64::to_string).unwrap_or_default(),
        );
        Ok(())
    }

    fn handle_instance_number(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let text = self.read_text(header)?;
        if let Ok(number) = text.trim().parse::<i32>() {
            self.info.instance_number = Some(number);
        }
        self.record(header.tag, &text);
        Ok(())
    }

    /// Palette LUTs come as 16-bit entries; keep the high byte of each.
    fn handle_palette(&mut self, header: &DataElementHeader) -> Result<(), ParserError> {
        let len = header.len.get();
        if len % 2 != 0 {
            warn!(tag = %header.tag, len, "odd palette LUT length, skipping");
            return self.cursor.skip(len);
        }
        let mut lut = Vec::with_capacity(len / 2);
        for _ in 0..len / 2 {
            let entry = self.cursor.read_u16(self.reader.endianness())?;
            lut.push((entry >> 8) as u8);
        }
        match header.tag {
            t if t == tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DATA => self.palette.red = lut,
            t if t == tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DATA => self.palette.green = lut,
            _ => self.palette.blue = lut,
        }
        Ok(())
    }

    /// If pixel data was never declared but the expected number of bytes
    /// fits at the end of the file, assume they are there.
    fn recover_trailing_pixels(&mut self) {
        let expected = self.info.frame_byte_len();
        if expected > 0 && expected <= self.data.len() {
            warn!(
                expected,
                "no PixelData element; assuming pixels at the file tail"
            );
            self.pixel_data_offset = Some(self.data.len() - expected);
            self.pixel_data_len = expected;
        }
    }
}
