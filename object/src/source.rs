//! Backing storage for a decoder's bytes.

use memmap2::Mmap;
use std::ops::Deref;

/// Files at least this large are memory-mapped instead of read whole.
pub(crate) const MMAP_THRESHOLD: u64 = 10 * 1024 * 1024;

/// The bytes a decoder reads from: either an owned heap buffer or a
/// read-only file mapping. Both expose a plain byte slice.
pub(crate) enum DataSource {
    Buffer(Vec<u8>),
    Mapped(Mmap),
}

impl Deref for DataSource {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            DataSource::Buffer(v) => v,
            DataSource::Mapped(m) => m,
        }
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Buffer(v) => write!(f, "DataSource::Buffer({} bytes)", v.len()),
            DataSource::Mapped(m) => write!(f, "DataSource::Mapped({} bytes)", m.len()),
        }
    }
}
