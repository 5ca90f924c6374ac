//! High-level reading of DICOM image files.
//!
//! [`FileDecoder`] opens a Part 10 file (from a path or a byte buffer),
//! verifies the `DICM` signature, walks every data element up to pixel
//! data, and exposes the result as a formatted metadata dictionary plus a
//! typed [`ImageInfo`](voxel_core::ImageInfo) descriptor. Pixel decoding
//! itself lives in the pixel data crate, which stores its output back into
//! the decoder.
//!
//! ```no_run
//! use voxel_object::FileDecoder;
//! use voxel_dictionary::tags;
//!
//! let decoder = FileDecoder::from_path("slice001.dcm")?;
//! let info = decoder.image_info();
//! println!(
//!     "{}x{} {:?}",
//!     info.width,
//!     info.height,
//!     decoder.info(tags::MODALITY)
//! );
//! # Ok::<(), voxel_object::ReadError>(())
//! ```

mod decoder;
mod read;
mod source;

use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

pub use crate::decoder::FileDecoder;
pub use crate::read::PaletteLut;

/// An error during file opening or header parsing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum ReadError {
    /// The file to open does not exist.
    #[snafu(display("could not find file {}", filename.display()))]
    FileNotFound {
        filename: PathBuf,
        backtrace: Backtrace,
    },

    /// The file could not be opened or read.
    #[snafu(display("could not read file {}", filename.display()))]
    OpenFile {
        filename: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The file could not be memory-mapped.
    #[snafu(display("could not memory-map file {}", filename.display()))]
    MapFile {
        filename: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// Invalid DICOM data, detected by checking the `DICM` code.
    #[snafu(display("invalid DICOM file (magic code check failed)"))]
    NotDicom { backtrace: Backtrace },

    /// The element structure broke down mid-stream.
    #[snafu(display("could not parse data element at offset {}", offset))]
    ParseElement {
        offset: usize,
        #[snafu(backtrace)]
        source: voxel_parser::Error,
    },

    /// Pixel data is present but the attributes describing it are not.
    #[snafu(display("invalid pixel attributes: {}", reason))]
    PixelAttributes {
        reason: &'static str,
        backtrace: Backtrace,
    },
}

/// Open and parse the header of the DICOM file at `path`.
///
/// Shorthand for [`FileDecoder::from_path`].
pub fn open_file<P: AsRef<std::path::Path>>(path: P) -> Result<FileDecoder, ReadError> {
    FileDecoder::from_path(path)
}
