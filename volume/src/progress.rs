//! Load progress reporting and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use voxel_core::Vector3;

/// The shape of the volume being assembled, passed along with progress.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeShape {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub spacing: Vector3,
}

/// A caller-provided receiver for assembly progress.
///
/// `report` is called once per packed slice, from whichever thread is
/// doing the work. Implementations must not call back into the loader.
pub trait ProgressSink: Send + Sync {
    fn report(
        &self,
        fraction: f64,
        slices_done: usize,
        current_slice_bytes: Option<usize>,
        shape: &VolumeShape,
    );
}

/// A sink that discards all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _: f64, _: usize, _: Option<usize>, _: &VolumeShape) {}
}

/// A shared flag for best-effort cancellation.
///
/// Loaders check the token between slices; once cancelled, a load returns
/// [`Error::Cancelled`](crate::Error::Cancelled) without publishing a
/// partial volume.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every load holding this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
