//! Standard DICOM attribute dictionary for the voxel decoder.
//!
//! The crate exposes a run-time dictionary ([`TagDictionary`]) for
//! resolving tag names and implicit-VR interpretations, plus compile-time
//! constants for [`tags`] and transfer syntax [`uids`]. The underlying
//! table is loaded once on first access and never mutated afterwards.

pub mod data_element;
pub mod entries;
pub mod tags;
pub mod uids;

pub use data_element::{registry, TagDictionary, TagDictionaryRegistry};
pub use entries::DictionaryEntry;

#[cfg(test)]
mod tests {
    use voxel_core::Tag;

    /// tests for just a few attributes to make sure that the tag constants
    /// were well installed into the crate
    #[test]
    fn tags_constants_available() {
        use crate::tags::*;
        assert_eq!(PATIENT_NAME, Tag(0x0010, 0x0010));
        assert_eq!(MODALITY, Tag(0x0008, 0x0060));
        assert_eq!(PIXEL_DATA, Tag(0x7FE0, 0x0010));
        assert_eq!(TRANSFER_SYNTAX_UID, Tag(0x0002, 0x0010));
    }

    /// tests for the presence of a few UID constants
    #[test]
    fn uids_constants_available() {
        use crate::uids::*;
        assert_eq!(EXPLICIT_VR_LITTLE_ENDIAN, "1.2.840.10008.1.2.1");
        assert_eq!(JPEG_LOSSLESS_SV1, "1.2.840.10008.1.2.4.70");
    }
}
