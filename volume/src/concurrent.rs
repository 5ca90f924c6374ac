//! Concurrent loading of several series.

use crate::progress::ProgressSink;
use crate::series::{SeriesAssembler, SliceDecoder};
use crate::volume::Volume;
use crate::Error;
use rayon::prelude::*;
use std::path::PathBuf;
use tracing::warn;

/// Default cap on in-flight series loads.
pub const DEFAULT_SERIES_CONCURRENCY: usize = 2;
/// Default cap for batches of independent single-file decodes.
pub const DEFAULT_FILE_CONCURRENCY: usize = 4;

impl<D: SliceDecoder> SeriesAssembler<D> {
    /// Load several series directories concurrently.
    ///
    /// At most `max_concurrency` loads run at once. Results come back in
    /// input order regardless of completion order: each worker tags its
    /// result with the input index and the map is projected back to a
    /// vector at the end.
    pub fn load_concurrent(
        &self,
        dirs: &[PathBuf],
        max_concurrency: usize,
        progress: &dyn ProgressSink,
    ) -> Vec<Result<Volume, Error>>
    where
        Self: Sync,
    {
        let threads = max_concurrency.max(1).min(dirs.len().max(1));
        let pool = match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool,
            Err(e) => {
                // fall back to sequential loading rather than failing the
                // whole batch
                warn!(error = %e, "could not build thread pool");
                return dirs.iter().map(|dir| self.load(dir, progress)).collect();
            }
        };

        let mut indexed: Vec<(usize, Result<Volume, Error>)> = pool.install(|| {
            dirs.par_iter()
                .enumerate()
                .map(|(index, dir)| (index, self.load(dir, progress)))
                .collect()
        });
        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use crate::series::FileSliceDecoder;

    #[test]
    fn results_preserve_input_order() {
        // directories that do not exist still produce one result each,
        // in order
        let dirs = vec![
            PathBuf::from("/nonexistent/one"),
            PathBuf::from("/nonexistent/two"),
            PathBuf::from("/nonexistent/three"),
        ];
        let assembler: SeriesAssembler<FileSliceDecoder> = SeriesAssembler::new();
        let results = assembler.load_concurrent(&dirs, 2, &NoProgress);
        assert_eq!(results.len(), 3);
        for result in &results {
            assert!(matches!(result, Err(Error::EmptySeries { .. })));
        }
    }
}
