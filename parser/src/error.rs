//! Errors raised while parsing the byte stream.

use snafu::{Backtrace, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The stream ended before a read could be satisfied.
    #[snafu(display(
        "needed {} bytes at offset {}, only {} available",
        needed,
        offset,
        available
    ))]
    ShortRead {
        needed: usize,
        available: usize,
        offset: usize,
        backtrace: Backtrace,
    },

    /// The element structure at the given offset is malformed.
    #[snafu(display("invalid DICOM stream at offset {}: {}", offset, reason))]
    InvalidFormat {
        offset: usize,
        reason: &'static str,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
