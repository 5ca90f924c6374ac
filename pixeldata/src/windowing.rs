//! Display windowing: linear window/level mapping from stored 16-bit
//! samples to 8-bit display values, and optimal window estimation from
//! percentile histograms.

use num_traits::ToPrimitive;
use rayon::prelude::*;
use snafu::{ensure, Backtrace, Snafu};

/// Number of histogram bins used by the optimal-window estimate.
const HISTOGRAM_BINS: usize = 256;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum WindowingError {
    #[snafu(display("invalid argument: {}", reason))]
    InvalidArgument {
        reason: &'static str,
        backtrace: Backtrace,
    },
}

/// A window/level pair, in stored-value units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSettings {
    pub center: f64,
    pub width: f64,
}

impl WindowSettings {
    pub fn new(center: f64, width: f64) -> Self {
        WindowSettings { center, width }
    }
}

/// The modality rescale transformation (`HU = slope * stored + intercept`
/// for CT data).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub slope: f64,
    pub intercept: f64,
}

impl Rescale {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Rescale { slope, intercept }
    }

    /// Apply the rescale function to a stored value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        self.slope * value + self.intercept
    }
}

/// Map stored samples to 8-bit display values with a linear window.
///
/// The input may be any numeric sample type; values are widened to `f64`
/// before the mapping. Values at or below `center - width/2` map to 0 and
/// values at or above `center + width/2` map to 255; the window interior
/// is scaled linearly and truncated towards zero.
pub fn apply<T>(pixels: &[T], center: f64, width: f64) -> Result<Vec<u8>, WindowingError>
where
    T: ToPrimitive + Copy,
{
    ensure!(
        width > 0.0,
        InvalidArgumentSnafu {
            reason: "window width must be positive",
        }
    );
    ensure!(
        !pixels.is_empty(),
        InvalidArgumentSnafu {
            reason: "empty pixel buffer",
        }
    );

    let min_level = center - width / 2.0;
    let scale = 256.0 / width;
    Ok(pixels
        .iter()
        .map(|v| (v.to_f64().unwrap_or(0.0) - min_level) * scale)
        .map(|x| x.clamp(0.0, 255.0) as u8)
        .collect())
}

/// Window several buffers at once, in parallel.
///
/// All three slices must have the same length; on a mismatch the result
/// is empty (a contract violation by the caller, not a decoding error).
/// A buffer whose window parameters are invalid maps to an empty output.
pub fn apply_batch(buffers: &[Vec<u16>], centers: &[f64], widths: &[f64]) -> Vec<Vec<u8>> {
    if buffers.len() != centers.len() || buffers.len() != widths.len() {
        return Vec::new();
    }
    buffers
        .par_iter()
        .zip(centers.par_iter().zip(widths.par_iter()))
        .map(|(pixels, (&center, &width))| apply(pixels, center, width).unwrap_or_default())
        .collect()
}

/// Estimate the window that covers the central 98% of the sample
/// distribution, from a 256-bin histogram.
///
/// Degenerate input (empty or uniform) produces a window of width 1
/// centred on the data.
pub fn optimal(pixels: &[u16]) -> WindowSettings {
    if pixels.is_empty() {
        return WindowSettings::new(0.0, 1.0);
    }

    let mut min = u16::MAX;
    let mut max = u16::MIN;
    for &v in pixels {
        min = min.min(v);
        max = max.max(v);
    }
    if min == max {
        return WindowSettings::new(f64::from(min), 1.0);
    }

    let lo = f64::from(min);
    let range = f64::from(max) - lo;
    let mut histogram = [0usize; HISTOGRAM_BINS];
    for &v in pixels {
        let bin = ((f64::from(v) - lo) / range * (HISTOGRAM_BINS as f64 - 1.0)) as usize;
        histogram[bin.min(HISTOGRAM_BINS - 1)] += 1;
    }

    let bin_width = range / HISTOGRAM_BINS as f64;
    let midpoint = |bin: usize| lo + (bin as f64 + 0.5) * bin_width;

    let p1_target = pixels.len() / 100;
    let p99_target = pixels.len() * 99 / 100;
    let mut cumulative = 0usize;
    let mut p1 = midpoint(0);
    let mut p99 = midpoint(HISTOGRAM_BINS - 1);
    let mut p1_found = false;
    let mut p99_found = false;
    for (bin, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if !p1_found && cumulative >= p1_target {
            p1 = midpoint(bin);
            p1_found = true;
        }
        if !p99_found && cumulative >= p99_target {
            p99 = midpoint(bin);
            p99_found = true;
            break;
        }
    }

    WindowSettings::new((p1 + p99) / 2.0, (p99 - p1).max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_window_mapping() {
        let out = apply(&[0, 100, 200, 300, 400], 200.0, 200.0).unwrap();
        assert_eq!(out, vec![0, 0, 128, 255, 255]);
    }

    #[test]
    fn window_accepts_signed_samples() {
        let out = apply(&[-100i32, 0, 100], 0.0, 200.0).unwrap();
        assert_eq!(out, vec![0, 128, 255]);
    }

    #[test]
    fn window_boundaries_saturate() {
        let center = 1000.0;
        let width = 400.0;
        let out = apply(&[799, 800, 1200, 1201], center, width).unwrap();
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 0);
        assert_eq!(out[2], 255);
        assert_eq!(out[3], 255);
    }

    #[test]
    fn invalid_width_is_rejected() {
        assert!(matches!(
            apply(&[1, 2, 3], 100.0, 0.0),
            Err(WindowingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            apply(&[1, 2, 3], 100.0, -5.0),
            Err(WindowingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            apply::<u16>(&[], 100.0, 10.0),
            Err(WindowingError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn optimal_covers_central_mass() {
        // 1000 samples clustered around 1000 with thin tails
        let mut pixels = Vec::new();
        pixels.extend(std::iter::repeat(0u16).take(5));
        for i in 0..990 {
            pixels.push(900 + (i % 200) as u16);
        }
        pixels.extend(std::iter::repeat(4000u16).take(5));

        let window = optimal(&pixels);
        let lo = window.center - window.width / 2.0;
        let hi = window.center + window.width / 2.0;
        let covered = pixels
            .iter()
            .filter(|&&v| f64::from(v) >= lo && f64::from(v) <= hi)
            .count();
        assert!(
            covered as f64 >= pixels.len() as f64 * 0.98,
            "window [{lo}, {hi}] covers {covered} of {}",
            pixels.len()
        );
    }

    #[test]
    fn optimal_degenerate_inputs() {
        assert_eq!(optimal(&[]), WindowSettings::new(0.0, 1.0));
        assert_eq!(optimal(&[42, 42, 42]), WindowSettings::new(42.0, 1.0));
    }

    #[test]
    fn batch_requires_aligned_lengths() {
        let buffers = vec![vec![0u16, 100], vec![50u16, 200]];
        assert!(apply_batch(&buffers, &[100.0], &[50.0, 50.0]).is_empty());

        let out = apply_batch(&buffers, &[100.0, 100.0], &[200.0, 0.0]);
        assert_eq!(out.len(), 2);
        assert!(!out[0].is_empty());
        // invalid width degrades to an empty buffer, not an error
        assert!(out[1].is_empty());
    }

    #[test]
    fn rescale_to_hounsfield() {
        let rescale = Rescale::new(1.0, -1024.0);
        assert_eq!(rescale.apply(0.0), -1024.0);
        assert_eq!(rescale.apply(1024.0), 0.0);
    }
}
