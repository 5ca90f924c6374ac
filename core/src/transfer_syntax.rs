//! Transfer syntax descriptors.
//!
//! A transfer syntax UID resolves to three properties of the data stream:
//! byte order, VR explicitness, and the pixel data codec. Only a small set
//! of syntaxes is fully supported; the remaining compressed syntaxes are
//! recognized so that they can be rejected with a proper error instead of
//! being misparsed.

use byteordered::Endianness;

/// The pixel data encoding declared by a transfer syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Native (uncompressed) pixel data.
    None,
    /// JPEG Lossless, Non-Hierarchical (Process 14), including the
    /// first-order prediction variant (Selection Value 1).
    JpegLossless,
    /// A known compressed encoding with no decoder in this library.
    Unsupported,
}

/// A compiled transfer syntax specifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    endianness: Endianness,
    explicit_vr: bool,
    codec: Codec,
}

impl TransferSyntax {
    const fn new(
        uid: &'static str,
        name: &'static str,
        endianness: Endianness,
        explicit_vr: bool,
        codec: Codec,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            endianness,
            explicit_vr,
            codec,
        }
    }

    /// The transfer syntax UID, without trailing padding.
    pub fn uid(&self) -> &'static str {
        self.uid
    }

    /// A human readable name for the transfer syntax.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The byte order of the main data set.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether the main data set carries explicit VRs.
    pub fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// The pixel data codec.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Whether pixel data under this syntax is compressed.
    pub fn is_compressed(&self) -> bool {
        !matches!(self.codec, Codec::None)
    }

    /// Whether this library can decode pixel data under this syntax.
    pub fn is_decodable(&self) -> bool {
        !matches!(self.codec, Codec::Unsupported)
    }
}

pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2",
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    Codec::None,
);

pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.1",
    "Explicit VR Little Endian",
    Endianness::Little,
    true,
    Codec::None,
);

pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.2",
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    Codec::None,
);

pub const JPEG_LOSSLESS_NON_HIERARCHICAL: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.57",
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    Endianness::Little,
    true,
    Codec::JpegLossless,
);

pub const JPEG_LOSSLESS_SV1: TransferSyntax = TransferSyntax::new(
    "1.2.840.10008.1.2.4.70",
    "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
    Endianness::Little,
    true,
    Codec::JpegLossless,
);

/// Shorthand for a compressed syntax this library rejects.
const fn stub(uid: &'static str, name: &'static str) -> TransferSyntax {
    TransferSyntax::new(uid, name, Endianness::Little, true, Codec::Unsupported)
}

pub const JPEG_BASELINE: TransferSyntax =
    stub("1.2.840.10008.1.2.4.50", "JPEG Baseline (Process 1)");
pub const JPEG_EXTENDED: TransferSyntax =
    stub("1.2.840.10008.1.2.4.51", "JPEG Extended (Process 2 & 4)");
pub const JPEG_LS_LOSSLESS: TransferSyntax = stub(
    "1.2.840.10008.1.2.4.80",
    "JPEG-LS Lossless Image Compression",
);
pub const JPEG_LS_LOSSY: TransferSyntax = stub(
    "1.2.840.10008.1.2.4.81",
    "JPEG-LS Lossy (Near-Lossless) Image Compression",
);
pub const JPEG_2000_LOSSLESS_ONLY: TransferSyntax = stub(
    "1.2.840.10008.1.2.4.90",
    "JPEG 2000 Image Compression (Lossless Only)",
);
pub const JPEG_2000: TransferSyntax =
    stub("1.2.840.10008.1.2.4.91", "JPEG 2000 Image Compression");
pub const RLE_LOSSLESS: TransferSyntax = stub("1.2.840.10008.1.2.5", "RLE Lossless");

const REGISTRY: &[TransferSyntax] = &[
    IMPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_BIG_ENDIAN,
    JPEG_LOSSLESS_NON_HIERARCHICAL,
    JPEG_LOSSLESS_SV1,
    JPEG_BASELINE,
    JPEG_EXTENDED,
    JPEG_LS_LOSSLESS,
    JPEG_LS_LOSSY,
    JPEG_2000_LOSSLESS_ONLY,
    JPEG_2000,
    RLE_LOSSLESS,
];

/// Look up a transfer syntax by UID.
///
/// Trailing NUL padding and whitespace in the UID are ignored. An unknown
/// UID resolves to [`EXPLICIT_VR_LITTLE_ENDIAN`] semantics so that a file
/// with an exotic but uncompressed syntax still has a chance of parsing.
pub fn lookup(uid: &str) -> TransferSyntax {
    let uid = uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
    REGISTRY
        .iter()
        .find(|ts| ts.uid == uid)
        .copied()
        .unwrap_or(EXPLICIT_VR_LITTLE_ENDIAN)
}
