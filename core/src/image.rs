//! Image-level descriptors and decoded pixel buffers.

use crate::geometry::Vector3;
use snafu::Snafu;
use std::fmt;
use std::str::FromStr;

/// Photometric interpretation of stored pixel samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotometricInterpretation {
    /// Grayscale where the minimum value is white.
    Monochrome1,
    /// Grayscale where the minimum value is black.
    Monochrome2,
    /// Interleaved or planar RGB.
    Rgb,
    /// Indexed color through the palette lookup tables.
    PaletteColor,
    /// Any other interpretation, carried verbatim.
    Other(String),
}

impl FromStr for PhotometricInterpretation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "MONOCHROME1" => Self::Monochrome1,
            "MONOCHROME2" => Self::Monochrome2,
            "RGB" => Self::Rgb,
            "PALETTE COLOR" => Self::PaletteColor,
            other => Self::Other(other.to_string()),
        })
    }
}

impl PhotometricInterpretation {
    /// Whether sample values must be inverted so that downstream code can
    /// treat the buffer as MONOCHROME2.
    pub fn should_invert(&self) -> bool {
        matches!(self, Self::Monochrome1)
    }

    pub fn is_grayscale(&self) -> bool {
        matches!(self, Self::Monochrome1 | Self::Monochrome2)
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Monochrome1 => f.write_str("MONOCHROME1"),
            Self::Monochrome2 => f.write_str("MONOCHROME2"),
            Self::Rgb => f.write_str("RGB"),
            Self::PaletteColor => f.write_str("PALETTE COLOR"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Interpretation of stored sample bit patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelRepresentation {
    #[default]
    Unsigned,
    Signed,
}

/// Image attributes collected while walking a file header.
///
/// Numeric fields keep the DICOM defaults until the corresponding attribute
/// is seen: slope 1, intercept 0, one sample per pixel, one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Bits allocated per sample; 8 or 16 are decodable.
    pub bit_depth: u16,
    pub samples_per_pixel: u16,
    pub pixel_representation: PixelRepresentation,
    pub photometric: PhotometricInterpretation,
    /// 0 = interleaved, 1 = planar; only meaningful for multi-sample data.
    pub planar_configuration: u16,
    pub number_of_frames: u32,
    pub window_center: Option<f64>,
    pub window_width: Option<f64>,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    /// Per-axis voxel size in millimetres (x = column, y = row, z = depth).
    pub pixel_spacing: Vector3,
    /// Row and column direction cosines, normalized.
    pub orientation: Option<(Vector3, Vector3)>,
    /// Patient-space position of the first transmitted voxel.
    pub position: Option<Vector3>,
    pub instance_number: Option<i32>,
    pub modality: Option<String>,
    pub series_description: Option<String>,
}

impl Default for ImageInfo {
    fn default() -> Self {
        ImageInfo {
            width: 0,
            height: 0,
            bit_depth: 16,
            samples_per_pixel: 1,
            pixel_representation: PixelRepresentation::Unsigned,
            photometric: PhotometricInterpretation::Monochrome2,
            planar_configuration: 0,
            number_of_frames: 1,
            window_center: None,
            window_width: None,
            rescale_slope: 1.0,
            rescale_intercept: 0.0,
            pixel_spacing: Vector3::new(1.0, 1.0, 1.0),
            orientation: None,
            position: None,
            instance_number: None,
            modality: None,
            series_description: None,
        }
    }
}

impl ImageInfo {
    /// Whether the stored samples are signed.
    pub fn is_signed(&self) -> bool {
        self.pixel_representation == PixelRepresentation::Signed
    }

    /// The number of pixel data bytes one frame of this image occupies
    /// when uncompressed.
    pub fn frame_byte_len(&self) -> usize {
        self.width as usize
            * self.height as usize
            * self.samples_per_pixel as usize
            * (self.bit_depth as usize / 8)
    }

    /// The slice normal (row × col), or `None` without orientation.
    pub fn normal(&self) -> Option<Vector3> {
        self.orientation
            .map(|(row, col)| row.cross(col).normalized())
    }

    /// Projection of the slice position onto the slice normal, the sort key
    /// for series ordering.
    pub fn slice_location(&self) -> Option<f64> {
        match (self.position, self.normal()) {
            (Some(pos), Some(n)) => Some(pos.dot(n)),
            _ => None,
        }
    }
}

/// An error raised when a pixel buffer is accessed as the wrong variant.
#[derive(Debug, Snafu)]
#[snafu(display("requested {} samples but buffer holds {}", requested, got))]
pub struct CastError {
    pub requested: &'static str,
    pub got: &'static str,
}

/// A decoded, uncompressed pixel buffer.
///
/// Grayscale 16-bit data is always stored unsigned: signed sources are
/// shifted by `-i16::MIN` at decode time and flagged through
/// [`ImageInfo::is_signed`]. MONOCHROME1 data is inverted at decode time,
/// so consumers can treat every grayscale buffer as MONOCHROME2.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    /// 8-bit grayscale, `width * height` samples.
    Gray8(Vec<u8>),
    /// 16-bit grayscale, `width * height` samples.
    Gray16(Vec<u16>),
    /// Interleaved 8-bit RGB, `3 * width * height` samples.
    Rgb8(Vec<u8>),
}

impl PixelBuffer {
    fn variant_name(&self) -> &'static str {
        match self {
            PixelBuffer::Gray8(_) => "Gray8",
            PixelBuffer::Gray16(_) => "Gray16",
            PixelBuffer::Rgb8(_) => "Rgb8",
        }
    }

    /// The number of samples in the buffer.
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::Gray8(v) => v.len(),
            PixelBuffer::Gray16(v) => v.len(),
            PixelBuffer::Rgb8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow as 8-bit grayscale samples.
    pub fn as_gray8(&self) -> Result<&[u8], CastError> {
        match self {
            PixelBuffer::Gray8(v) => Ok(v),
            other => Err(CastError {
                requested: "Gray8",
                got: other.variant_name(),
            }),
        }
    }

    /// Borrow as 16-bit grayscale samples.
    pub fn as_gray16(&self) -> Result<&[u16], CastError> {
        match self {
            PixelBuffer::Gray16(v) => Ok(v),
            other => Err(CastError {
                requested: "Gray16",
                got: other.variant_name(),
            }),
        }
    }

    /// Borrow as interleaved RGB samples.
    pub fn as_rgb8(&self) -> Result<&[u8], CastError> {
        match self {
            PixelBuffer::Rgb8(v) => Ok(v),
            other => Err(CastError {
                requested: "Rgb8",
                got: other.variant_name(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photometric_parsing() {
        assert_eq!(
            "MONOCHROME1".parse::<PhotometricInterpretation>(),
            Ok(PhotometricInterpretation::Monochrome1)
        );
        assert_eq!(
            " RGB ".parse::<PhotometricInterpretation>(),
            Ok(PhotometricInterpretation::Rgb)
        );
        assert!(PhotometricInterpretation::Monochrome1.should_invert());
        assert!(!PhotometricInterpretation::Monochrome2.should_invert());
    }

    #[test]
    fn frame_byte_len() {
        let info = ImageInfo {
            width: 512,
            height: 512,
            bit_depth: 16,
            ..ImageInfo::default()
        };
        assert_eq!(info.frame_byte_len(), 512 * 512 * 2);
    }

    #[test]
    fn slice_location_projects_position() {
        let info = ImageInfo {
            orientation: Some((
                crate::geometry::Vector3::new(1., 0., 0.),
                crate::geometry::Vector3::new(0., 1., 0.),
            )),
            position: Some(crate::geometry::Vector3::new(10., -4., 2.5)),
            ..ImageInfo::default()
        };
        assert_eq!(info.slice_location(), Some(2.5));
    }

    #[test]
    fn buffer_casting() {
        let buf = PixelBuffer::Gray16(vec![0, 1, 2, 3]);
        assert_eq!(buf.as_gray16().unwrap(), &[0, 1, 2, 3]);
        assert!(buf.as_gray8().is_err());
        assert_eq!(buf.len(), 4);
    }
}
