//! Decoding of DICOM pixel data into typed buffers, plus display
//! windowing.
//!
//! The crate extends [`FileDecoder`] with the [`PixelDecode`] trait:
//!
//! ```no_run
//! use voxel_object::FileDecoder;
//! use voxel_pixeldata::PixelDecode;
//!
//! let mut decoder = FileDecoder::from_path("slice001.dcm")?;
//! if let Some(pixels) = decoder.decode_pixel_data()? {
//!     println!("{} samples", pixels.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Native (uncompressed) layouts are transcoded directly; JPEG Lossless
//! (Process 14) streams are decoded by the [`jpeg_lossless`] module. All
//! grayscale output is normalized at decode time: signed samples are
//! shifted into unsigned range and MONOCHROME1 is inverted, so consumers
//! can treat every buffer as unsigned MONOCHROME2.

pub mod jpeg_lossless;
mod uncompressed;
pub mod windowing;

use byteorder::{ByteOrder, LittleEndian};
use snafu::{Backtrace, Snafu};
use std::borrow::Cow;
use voxel_core::transfer_syntax::Codec;
use voxel_core::{ImageInfo, PixelBuffer};
use voxel_object::FileDecoder;

pub use crate::jpeg_lossless::DecodedScan;
pub use crate::windowing::{Rescale, WindowSettings, WindowingError};

/// An error while decoding pixel data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum DecodeError {
    /// The transfer syntax declares a compressed encoding this library
    /// does not implement.
    #[snafu(display("decoding in transfer syntax {} is unsupported", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },

    /// The file carries no pixel data element.
    #[snafu(display("file has no pixel data"))]
    MissingPixelData { backtrace: Backtrace },

    /// The pixel data element is shorter than the image dimensions
    /// require.
    #[snafu(display("pixel data too short: expected {} bytes, got {}", expected, actual))]
    TruncatedPixelData {
        expected: usize,
        actual: usize,
        backtrace: Backtrace,
    },

    /// The JPEG bit stream is malformed.
    #[snafu(display("invalid JPEG stream: {}", reason))]
    InvalidJpeg {
        reason: &'static str,
        backtrace: Backtrace,
    },

    /// The decoded frame does not match the dimensions in the DICOM
    /// header.
    #[snafu(display(
        "decoded frame is {}x{} but the header declares {}x{}",
        got_width,
        got_height,
        width,
        height
    ))]
    FrameMismatch {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
        backtrace: Backtrace,
    },
}

/// Pixel decoding as an extension of the file decoder.
pub trait PixelDecode {
    /// Decode the pixel data into a typed buffer, caching the result.
    ///
    /// Returns `Ok(None)` when the sample layout is outside the supported
    /// set (the header may still be useful); repeated calls return the
    /// cached buffer.
    fn decode_pixel_data(&mut self) -> Result<Option<&PixelBuffer>, DecodeError>;
}

impl PixelDecode for FileDecoder {
    fn decode_pixel_data(&mut self) -> Result<Option<&PixelBuffer>, DecodeError> {
        if self.pixels().is_none() {
            match decode_buffer(self)? {
                Some(buffer) => self.store_pixels(buffer),
                None => return Ok(None),
            }
        }
        Ok(self.pixels())
    }
}

fn decode_buffer(decoder: &FileDecoder) -> Result<Option<PixelBuffer>, DecodeError> {
    let info = decoder.image_info();
    let ts = decoder.transfer_syntax();
    let data = decoder
        .pixel_data()
        .ok_or_else(|| MissingPixelDataSnafu.build())?;

    match ts.codec() {
        Codec::None => uncompressed::decode(info, data, ts.endianness()),
        Codec::JpegLossless => decode_jpeg_lossless(info, data).map(Some),
        Codec::Unsupported => UnsupportedTransferSyntaxSnafu {
            uid: ts.uid().to_string(),
        }
        .fail(),
    }
}

fn decode_jpeg_lossless(info: &ImageInfo, data: &[u8]) -> Result<PixelBuffer, DecodeError> {
    let stream = encapsulated_stream(data);
    let scan = jpeg_lossless::decode(&stream)?;
    snafu::ensure!(
        scan.width == info.width && scan.height == info.height,
        FrameMismatchSnafu {
            width: info.width,
            height: info.height,
            got_width: scan.width,
            got_height: scan.height,
        }
    );

    if info.bit_depth == 8 && scan.precision <= 8 {
        let mut out: Vec<u8> = scan.pixels.iter().map(|&v| v as u8).collect();
        if info.photometric.should_invert() {
            uncompressed::invert_gray8(&mut out);
        }
        Ok(PixelBuffer::Gray8(out))
    } else {
        let mut pixels = scan.pixels;
        uncompressed::normalize_gray16(&mut pixels, info);
        Ok(PixelBuffer::Gray16(pixels))
    }
}

/// Recover the codec bit stream from an encapsulated pixel data value.
///
/// Encapsulated pixel data is a little-endian item sequence: a basic
/// offset table item first, then one fragment item per chunk of the
/// stream, closed by a sequence delimiter. Non-encapsulated values are
/// returned as they are.
fn encapsulated_stream(data: &[u8]) -> Cow<'_, [u8]> {
    if data.len() < 8 || data[0] != 0xFE || data[1] != 0xFF {
        return Cow::Borrowed(data);
    }

    let mut fragments: Vec<&[u8]> = Vec::new();
    let mut pos = 0;
    let mut offset_table_seen = false;
    while pos + 8 <= data.len() {
        let group = LittleEndian::read_u16(&data[pos..]);
        let element = LittleEndian::read_u16(&data[pos + 2..]);
        let len = LittleEndian::read_u32(&data[pos + 4..]) as usize;
        pos += 8;
        if group != 0xFFFE || element != 0xE000 {
            break;
        }
        let end = (pos + len).min(data.len());
        if offset_table_seen {
            fragments.push(&data[pos..end]);
        } else {
            offset_table_seen = true;
        }
        pos = end;
    }

    match fragments.len() {
        0 => Cow::Borrowed(data),
        1 => Cow::Borrowed(fragments[0]),
        _ => Cow::Owned(fragments.concat()),
    }
}
