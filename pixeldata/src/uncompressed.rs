//! Native (uncompressed) pixel data extraction.

use crate::{DecodeError, TruncatedPixelDataSnafu};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use byteordered::Endianness;
use snafu::ensure;
use voxel_core::{ImageInfo, PixelBuffer};

/// Decode one frame of native pixel data into a typed buffer.
///
/// Returns `Ok(None)` for sample layouts outside the supported set; the
/// caller decides whether the absence of a buffer is an error.
pub(crate) fn decode(
    info: &ImageInfo,
    data: &[u8],
    endianness: Endianness,
) -> Result<Option<PixelBuffer>, DecodeError> {
    let pixels = info.width as usize * info.height as usize;
    match (info.samples_per_pixel, info.bit_depth) {
        (1, 8) => {
            ensure!(
                data.len() >= pixels,
                TruncatedPixelDataSnafu {
                    expected: pixels,
                    actual: data.len(),
                }
            );
            let mut out = data[..pixels].to_vec();
            if info.photometric.should_invert() {
                for v in &mut out {
                    *v = 255 - *v;
                }
            }
            Ok(Some(PixelBuffer::Gray8(out)))
        }
        (1, 16) => {
            ensure!(
                data.len() >= pixels * 2,
                TruncatedPixelDataSnafu {
                    expected: pixels * 2,
                    actual: data.len(),
                }
            );
            let mut out = vec![0u16; pixels];
            match endianness {
                Endianness::Little => LittleEndian::read_u16_into(&data[..pixels * 2], &mut out),
                Endianness::Big => BigEndian::read_u16_into(&data[..pixels * 2], &mut out),
            }
            normalize_gray16(&mut out, info);
            Ok(Some(PixelBuffer::Gray16(out)))
        }
        (3, 8) => {
            let samples = pixels * 3;
            ensure!(
                data.len() >= samples,
                TruncatedPixelDataSnafu {
                    expected: samples,
                    actual: data.len(),
                }
            );
            // assumed interleaved; planar RGB is not worth transposing
            // until a producer of it shows up
            Ok(Some(PixelBuffer::Rgb8(data[..samples].to_vec())))
        }
        _ => Ok(None),
    }
}

/// Normalize raw 16-bit samples in place: signed values are shifted by
/// `-i16::MIN` into unsigned range, and MONOCHROME1 is inverted so the
/// buffer reads as MONOCHROME2.
///
/// The signed inversion mirrors around the shifted midpoint
/// (`32768 - (v - 32768)`) rather than using the unsigned `65535 - v`
/// form; the two differ by one and downstream consumers depend on the
/// mirrored values.
pub(crate) fn normalize_gray16(samples: &mut [u16], info: &ImageInfo) {
    let signed = info.is_signed();
    let invert = info.photometric.should_invert();
    for v in samples.iter_mut() {
        let mut value = *v;
        if signed {
            value = value.wrapping_add(0x8000);
        }
        if invert {
            value = if signed {
                32768u16.wrapping_sub(value.wrapping_sub(32768))
            } else {
                65535 - value
            };
        }
        *v = value;
    }
}

/// Invert 8-bit samples in place for MONOCHROME1 input.
pub(crate) fn invert_gray8(samples: &mut [u8]) {
    for v in samples.iter_mut() {
        *v = 255 - *v;
    }
}
