//! This module contains the types needed to interpret DICOM data elements:
//! the attribute tag, the value representation, the element length,
//! and the element header composite.

use std::fmt;
use std::str::{from_utf8, FromStr};

/// Idiomatic alias for a tag's group number.
pub type GroupNumber = u16;
/// Idiomatic alias for a tag's element number.
pub type ElementNumber = u16;

/// The data type for DICOM data element tags.
///
/// Both `(u16, u16)` and `[u16; 2]` can be efficiently converted to this
/// type, as well as the packed `group << 16 | element` form used by
/// dictionary keys.
#[derive(PartialEq, Eq, Hash, PartialOrd, Ord, Clone, Copy)]
pub struct Tag(pub GroupNumber, pub ElementNumber);

impl Tag {
    /// Getter for the tag's group value.
    #[inline]
    pub fn group(self) -> GroupNumber {
        self.0
    }

    /// Getter for the tag's element value.
    #[inline]
    pub fn element(self) -> ElementNumber {
        self.1
    }

    /// Obtain the packed 32-bit form of the tag (`group << 16 | element`).
    #[inline]
    pub fn as_u32(self) -> u32 {
        (u32::from(self.0) << 16) | u32::from(self.1)
    }

    /// Build a tag from its packed 32-bit form.
    #[inline]
    pub fn from_u32(key: u32) -> Tag {
        Tag((key >> 16) as u16, (key & 0xFFFF) as u16)
    }

    /// Whether the tag belongs to an odd-numbered (private) group.
    #[inline]
    pub fn is_private(self) -> bool {
        self.0 % 2 == 1
    }

    /// Whether this is the item start delimiter `(FFFE,E000)`.
    #[inline]
    pub fn is_item(self) -> bool {
        self == Tag(0xFFFE, 0xE000)
    }

    /// Whether this is the item end delimiter `(FFFE,E00D)`.
    #[inline]
    pub fn is_item_delimiter(self) -> bool {
        self == Tag(0xFFFE, 0xE00D)
    }

    /// Whether this is the sequence end delimiter `(FFFE,E0DD)`.
    #[inline]
    pub fn is_sequence_delimiter(self) -> bool {
        self == Tag(0xFFFE, 0xE0DD)
    }

    /// Whether this is any of the three `(FFFE,Exxx)` sentinels which
    /// delimit sequences and items.
    #[inline]
    pub fn is_delimiter(self) -> bool {
        self.0 == 0xFFFE
            && (self.1 == 0xE000 || self.1 == 0xE00D || self.1 == 0xE0DD)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tag({:#06X?}, {:#06X?})", self.0, self.1)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.0, self.1)
    }
}

impl From<(u16, u16)> for Tag {
    #[inline]
    fn from((g, e): (u16, u16)) -> Tag {
        Tag(g, e)
    }
}

impl From<[u16; 2]> for Tag {
    #[inline]
    fn from(n: [u16; 2]) -> Tag {
        Tag(n[0], n[1])
    }
}

impl PartialEq<(u16, u16)> for Tag {
    fn eq(&self, other: &(u16, u16)) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

/// An enum type for a DICOM value representation.
///
/// Besides the two-letter codes defined by the standard, two pseudo-VRs
/// record decisions made by the element parser: [`VR::ImplicitRaw`] marks an
/// element whose VR was not present in the stream (or whose explicit VR
/// candidate had to be demoted), and [`VR::Unknown`] marks a two-letter code
/// outside the supported set.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, Ord, PartialOrd)]
pub enum VR {
    /// Application Entity
    AE,
    /// Age String
    AS,
    /// Attribute Tag
    AT,
    /// Code String
    CS,
    /// Date
    DA,
    /// Decimal String
    DS,
    /// Date Time
    DT,
    /// Floating Point Double
    FD,
    /// Floating Point Single
    FL,
    /// Integer String
    IS,
    /// Long String
    LO,
    /// Long Text
    LT,
    /// Other Byte
    OB,
    /// Other Word
    OW,
    /// Person Name
    PN,
    /// Short String
    SH,
    /// Signed Long
    SL,
    /// Sequence of Items
    SQ,
    /// Signed Short
    SS,
    /// Short Text
    ST,
    /// Time
    TM,
    /// Unique Identifier (UID)
    UI,
    /// Unsigned Long
    UL,
    /// Unknown contents
    UN,
    /// Unsigned Short
    US,
    /// Unlimited Text
    UT,
    /// No VR was present in the stream; the value is raw bytes whose
    /// interpretation is recovered from the dictionary or from its length.
    ImplicitRaw,
    /// A two-letter code that is not part of the supported set.
    Unknown,
}

impl VR {
    /// Obtain the value representation corresponding to the given two bytes.
    /// Each byte should represent an alphabetic character in upper case.
    pub fn from_binary(chars: [u8; 2]) -> Option<Self> {
        from_utf8(chars.as_ref())
            .ok()
            .and_then(|s| VR::from_str(s).ok())
    }

    /// Retrieve a string representation of this VR.
    pub fn to_str(self) -> &'static str {
        use VR::*;
        match self {
            AE => "AE",
            AS => "AS",
            AT => "AT",
            CS => "CS",
            DA => "DA",
            DS => "DS",
            DT => "DT",
            FD => "FD",
            FL => "FL",
            IS => "IS",
            LO => "LO",
            LT => "LT",
            OB => "OB",
            OW => "OW",
            PN => "PN",
            SH => "SH",
            SL => "SL",
            SQ => "SQ",
            SS => "SS",
            ST => "ST",
            TM => "TM",
            UI => "UI",
            UL => "UL",
            UN => "UN",
            US => "US",
            UT => "UT",
            ImplicitRaw => "--",
            Unknown => "??",
        }
    }

    /// Whether this VR uses a 32-bit length field under explicit VR
    /// encoding, preceded by two reserved bytes.
    #[inline]
    pub fn has_32bit_length(self) -> bool {
        matches!(self, VR::OB | VR::OW | VR::SQ | VR::UN | VR::UT)
    }

    /// Whether values of this VR are decoded as trimmed text.
    #[inline]
    pub fn is_string(self) -> bool {
        use VR::*;
        matches!(
            self,
            AE | AS | AT | CS | DA | DS | DT | IS | LO | LT | PN | SH | ST | TM | UI
        )
    }
}

impl FromStr for VR {
    type Err = &'static str;

    fn from_str(string: &str) -> std::result::Result<Self, Self::Err> {
        use VR::*;
        match string {
            "AE" => Ok(AE),
            "AS" => Ok(AS),
            "AT" => Ok(AT),
            "CS" => Ok(CS),
            "DA" => Ok(DA),
            "DS" => Ok(DS),
            "DT" => Ok(DT),
            "FD" => Ok(FD),
            "FL" => Ok(FL),
            "IS" => Ok(IS),
            "LO" => Ok(LO),
            "LT" => Ok(LT),
            "OB" => Ok(OB),
            "OW" => Ok(OW),
            "PN" => Ok(PN),
            "SH" => Ok(SH),
            "SL" => Ok(SL),
            "SQ" => Ok(SQ),
            "SS" => Ok(SS),
            "ST" => Ok(ST),
            "TM" => Ok(TM),
            "UI" => Ok(UI),
            "UL" => Ok(UL),
            "UN" => Ok(UN),
            "US" => Ok(US),
            "UT" => Ok(UT),
            _ => Err("no such value representation"),
        }
    }
}

impl fmt::Display for VR {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.to_str())
    }
}

/// The length of a data element's value, in bytes.
///
/// The all-ones pattern `0xFFFF_FFFF` declares an undefined length: the
/// element's extent is determined by a sequence delimiter further down the
/// stream rather than by this field.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Length(pub u32);

const UNDEFINED_LEN: u32 = 0xFFFF_FFFF;

impl Length {
    /// The undefined length marker.
    pub const UNDEFINED: Length = Length(UNDEFINED_LEN);

    /// Whether this length is undefined (`0xFFFF_FFFF`).
    #[inline]
    pub fn is_undefined(self) -> bool {
        self.0 == UNDEFINED_LEN
    }

    /// Whether this length is well defined.
    #[inline]
    pub fn is_defined(self) -> bool {
        !self.is_undefined()
    }

    /// The value as a `usize`, or 0 when undefined.
    #[inline]
    pub fn get(self) -> usize {
        if self.is_undefined() {
            0
        } else {
            self.0 as usize
        }
    }
}

impl From<u32> for Length {
    #[inline]
    fn from(o: u32) -> Self {
        Length(o)
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_undefined() {
            f.write_str("Length(Undefined)")
        } else {
            write!(f, "Length({})", self.0)
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_undefined() {
            f.write_str("U/L")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// A data element header as resolved by the element parser: the tag, the
/// value representation decision, the resolved value length, and the
/// absolute offset of the first value byte in the stream.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct DataElementHeader {
    /// DICOM tag
    pub tag: Tag,
    /// Value Representation
    pub vr: VR,
    /// Element value length
    pub len: Length,
    /// Offset of the first byte of the value field
    pub value_offset: usize,
}

impl DataElementHeader {
    /// Create a new data element header with the given properties.
    /// This is just a trivial constructor.
    pub fn new<T: Into<Tag>>(tag: T, vr: VR, len: Length, value_offset: usize) -> Self {
        DataElementHeader {
            tag: tag.into(),
            vr,
            len,
            value_offset,
        }
    }
}
