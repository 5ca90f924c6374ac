//! Unique identifier constants for the transfer syntaxes this library
//! recognizes.

/// Implicit VR Little Endian: default transfer syntax for DICOM.
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
/// Explicit VR Little Endian.
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
/// Explicit VR Big Endian (retired, still found in archives).
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

/// JPEG Lossless, Non-Hierarchical (Process 14).
pub const JPEG_LOSSLESS_NON_HIERARCHICAL: &str = "1.2.840.10008.1.2.4.57";
/// JPEG Lossless, Non-Hierarchical, First-Order Prediction
/// (Process 14, Selection Value 1).
pub const JPEG_LOSSLESS_SV1: &str = "1.2.840.10008.1.2.4.70";

/// JPEG Baseline (Process 1): rejected by this library.
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
/// JPEG Extended (Process 2 & 4): rejected by this library.
pub const JPEG_EXTENDED: &str = "1.2.840.10008.1.2.4.51";
/// JPEG-LS Lossless: rejected by this library.
pub const JPEG_LS_LOSSLESS: &str = "1.2.840.10008.1.2.4.80";
/// JPEG-LS Lossy (Near-Lossless): rejected by this library.
pub const JPEG_LS_LOSSY: &str = "1.2.840.10008.1.2.4.81";
/// JPEG 2000 (Lossless Only): rejected by this library.
pub const JPEG_2000_LOSSLESS_ONLY: &str = "1.2.840.10008.1.2.4.90";
/// JPEG 2000: rejected by this library.
pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.91";
/// RLE Lossless: rejected by this library.
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";
