//! Byte-level parsing of DICOM data sets.
//!
//! This crate provides the two lowest layers of the decoding stack:
//! [`ByteCursor`], an endianness-aware reader over an in-memory slice, and
//! [`ElementReader`], which resolves one data element header at a time
//! while tracking sequence nesting and the quirks real-world producers
//! leave in their streams (byte-swapped group numbers, demoted explicit
//! VRs, bogus odd lengths).
//!
//! Interpreting element *values* and assembling whole files is the job of
//! the object layer; nothing here allocates more than an element header.

pub mod cursor;
pub mod element;
pub mod error;

pub use crate::cursor::ByteCursor;
pub use crate::element::ElementReader;
pub use crate::error::{Error, Result};
