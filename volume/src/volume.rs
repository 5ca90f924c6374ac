//! The assembled voxel volume.

use voxel_core::Vector3;
use voxel_pixeldata::Rescale;

/// A contiguous 3-D block of signed 16-bit voxels in patient space.
///
/// Voxels are stored in slice-major raster order
/// (`voxels[z * w * h + y * w + x]`), and `voxels.len()` always equals
/// `width * height * depth`. Values are genuinely signed: slices decoded
/// from signed sources are shifted back from their unsigned normalized
/// form during assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub voxels: Vec<i16>,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Per-axis voxel size in millimetres.
    pub spacing: Vector3,
    /// Patient-space direction matrix with columns `(row, col, normal)`;
    /// identity when the series carries no orientation.
    pub orientation: [[f64; 3]; 3],
    /// Patient-space position of the first voxel.
    pub origin: Vector3,
    pub rescale_slope: f64,
    pub rescale_intercept: f64,
    pub bits_allocated: u16,
    /// Whether the source samples were signed before normalization.
    pub is_signed: bool,
    /// Series description, or empty when the tag is absent.
    pub description: String,
}

impl Volume {
    /// The stored voxel at `(x, y, z)`, if within bounds.
    pub fn voxel_at(&self, x: u32, y: u32, z: u32) -> Option<i16> {
        if x >= self.width || y >= self.height || z >= self.depth {
            return None;
        }
        let index =
            z as usize * self.width as usize * self.height as usize
                + y as usize * self.width as usize
                + x as usize;
        self.voxels.get(index).copied()
    }

    /// The modality value at `(x, y, z)` with the rescale transformation
    /// applied (Hounsfield units for CT data).
    pub fn value_at(&self, x: u32, y: u32, z: u32) -> Option<f64> {
        let voxel = self.voxel_at(x, y, z)?;
        Some(Rescale::new(self.rescale_slope, self.rescale_intercept).apply(f64::from(voxel)))
    }

    /// One slice worth of voxels, if within bounds.
    pub fn slice(&self, z: u32) -> Option<&[i16]> {
        if z >= self.depth {
            return None;
        }
        let len = self.width as usize * self.height as usize;
        let start = z as usize * len;
        self.voxels.get(start..start + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_volume() -> Volume {
        Volume {
            voxels: (0..8).map(|v| v as i16 * 10).collect(),
            width: 2,
            height: 2,
            depth: 2,
            spacing: Vector3::new(1., 1., 1.),
            orientation: [[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]],
            origin: Vector3::ZERO,
            rescale_slope: 2.0,
            rescale_intercept: -1024.0,
            bits_allocated: 16,
            is_signed: true,
            description: String::new(),
        }
    }

    #[test]
    fn voxel_indexing() {
        let volume = test_volume();
        assert_eq!(volume.voxel_at(0, 0, 0), Some(0));
        assert_eq!(volume.voxel_at(1, 0, 0), Some(10));
        assert_eq!(volume.voxel_at(0, 1, 0), Some(20));
        assert_eq!(volume.voxel_at(0, 0, 1), Some(40));
        assert_eq!(volume.voxel_at(2, 0, 0), None);
        assert_eq!(volume.voxel_at(0, 0, 2), None);
    }

    #[test]
    fn rescaled_values() {
        let volume = test_volume();
        assert_eq!(volume.value_at(0, 0, 0), Some(-1024.0));
        assert_eq!(volume.value_at(1, 0, 0), Some(-1004.0));
    }

    #[test]
    fn slice_views() {
        let volume = test_volume();
        assert_eq!(volume.slice(1), Some(&[40, 50, 60, 70][..]));
        assert_eq!(volume.slice(2), None);
    }
}
