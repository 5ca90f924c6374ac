//! Assembly of multi-slice DICOM series into contiguous voxel volumes.
//!
//! [`SeriesAssembler`] enumerates the slices of a directory, validates
//! their geometry against each other, orders them along the slice normal,
//! reconciles the inter-slice spacing, and packs the decoded pixels into
//! a single signed 16-bit [`Volume`]. Progress is reported through a
//! caller-supplied [`ProgressSink`] and loads can be cancelled between
//! slices with a [`CancelToken`].
//!
//! ```no_run
//! use voxel_volume::{NoProgress, SeriesAssembler};
//!
//! let assembler = SeriesAssembler::new();
//! let volume = assembler.load("/data/ct_series".as_ref(), &NoProgress)?;
//! println!("{}x{}x{}", volume.width, volume.height, volume.depth);
//! # Ok::<(), voxel_volume::Error>(())
//! ```

mod concurrent;
mod progress;
mod series;
mod volume;

use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

pub use crate::concurrent::{DEFAULT_FILE_CONCURRENCY, DEFAULT_SERIES_CONCURRENCY};
pub use crate::progress::{CancelToken, NoProgress, ProgressSink, VolumeShape};
pub use crate::series::{FileSliceDecoder, SeriesAssembler, SliceDecoder};
pub use crate::volume::Volume;

/// The attribute that differs across the slices of a rejected series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InconsistencyKind {
    Dimensions,
    Orientation,
    PixelRepresentation,
}

/// An error while assembling a series.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The directory holds no DICOM slices.
    #[snafu(display("no DICOM slices found in {}", dir.display()))]
    EmptySeries { dir: PathBuf, backtrace: Backtrace },

    /// A slice file could not be opened or parsed.
    #[snafu(display("could not read slice {}", path.display()))]
    OpenSlice {
        path: PathBuf,
        #[snafu(backtrace)]
        source: voxel_object::ReadError,
    },

    /// The series' sample layout cannot be packed into a 16-bit volume.
    #[snafu(display(
        "unsupported pixel shape: {} samples per pixel, {} bits",
        samples,
        bit_depth
    ))]
    UnsupportedPixelShape {
        samples: u16,
        bit_depth: u16,
        backtrace: Backtrace,
    },

    /// A multi-frame file was found where single-frame slices are
    /// required.
    #[snafu(display("{} holds {} frames; expected a single-frame slice", path.display(), frames))]
    MultiFrame {
        path: PathBuf,
        frames: u32,
        backtrace: Backtrace,
    },

    /// The named attribute differs between slices.
    #[snafu(display("inconsistent {:?} across series", kind))]
    Inconsistent {
        kind: InconsistencyKind,
        backtrace: Backtrace,
    },

    /// Pixel decoding failed for one slice; the volume is discarded.
    #[snafu(display("failed to decode {}", path.display()))]
    FailedToDecode { path: PathBuf, backtrace: Backtrace },

    /// The load was cancelled through its token.
    #[snafu(display("load cancelled"))]
    Cancelled { backtrace: Backtrace },
}
