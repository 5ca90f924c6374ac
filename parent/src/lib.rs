//! A DICOM decoder and voxel volume builder.
//!
//! This crate re-exports the full public surface of the underlying
//! crates:
//!
//! - `core`: tags, value representations, transfer syntaxes, image
//!   descriptors, and pixel buffers
//! - `dictionary`: the standard attribute dictionary and tag/UID
//!   constants
//! - `parser`: byte-level element parsing
//! - `object`: the [`FileDecoder`](object::FileDecoder) facade
//! - `pixeldata`: pixel decoding ([`PixelDecode`](pixeldata::PixelDecode))
//!   and display windowing
//! - `volume`: multi-slice series assembly into
//!   [`Volume`](volume::Volume)s
//!
//! ```no_run
//! use voxel::prelude::*;
//!
//! let mut decoder = FileDecoder::from_path("slice001.dcm")?;
//! if let Some(pixels) = decoder.decode_pixel_data()? {
//!     println!("{} decoded samples", pixels.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use voxel_core as core;
pub use voxel_dictionary as dictionary;
pub use voxel_object as object;
pub use voxel_parser as parser;
pub use voxel_pixeldata as pixeldata;
pub use voxel_volume as volume;

/// The types most users need, under a single import.
pub mod prelude {
    pub use voxel_core::{
        ImageInfo, PhotometricInterpretation, PixelBuffer, PixelRepresentation, Tag, VR,
    };
    pub use voxel_dictionary::{tags, uids, TagDictionary};
    pub use voxel_object::{open_file, FileDecoder, ReadError};
    pub use voxel_pixeldata::{
        windowing, DecodeError, PixelDecode, Rescale, WindowSettings,
    };
    pub use voxel_volume::{
        CancelToken, NoProgress, ProgressSink, SeriesAssembler, Volume,
    };
}
