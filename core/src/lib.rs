//! Core data types for reading DICOM files and reconstructing voxel
//! volumes: attribute tags, value representations, transfer syntax
//! descriptors, image-level metadata, and decoded pixel buffers.
//!
//! This crate is kept free of I/O so that the parsing and decoding layers
//! can share its vocabulary without pulling their dependencies in.

pub mod geometry;
pub mod header;
pub mod image;
pub mod transfer_syntax;

pub use crate::geometry::Vector3;
pub use crate::header::{DataElementHeader, Length, Tag, VR};
pub use crate::image::{
    CastError, ImageInfo, PhotometricInterpretation, PixelBuffer, PixelRepresentation,
};
pub use crate::transfer_syntax::{Codec, TransferSyntax};
