//! Chunked fork-join scheduling of per-voxel passes.
//!
//! A pass over a grid of `n` voxels is split into contiguous inclusive ranges
//! of flattened indices, one per worker. Each chunk is handed to a pure
//! closure on the rayon pool; results come back in chunk order so the caller
//! folds them deterministically whatever the worker count.

use rayon::prelude::*;

use crate::error::{CoreError, Result};

/// Inclusive range `first..=last` of flattened voxel indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub first: usize,
    pub last: usize,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    /// Chunks always hold at least one voxel.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Splits index ranges into chunks and runs them in parallel.
#[derive(Debug, Clone, Copy)]
pub struct ChunkScheduler {
    workers: usize,
    dedicated_pool: bool,
}

impl Default for ChunkScheduler {
    fn default() -> Self {
        Self {
            workers: rayon::current_num_threads().max(1),
            dedicated_pool: false,
        }
    }
}

impl ChunkScheduler {
    /// Scheduler sized to the global rayon pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with an explicit worker count, run on its own pool.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            dedicated_pool: true,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Partition `[0, n)` into at most `workers` chunks whose sizes differ by
    /// at most one.
    pub fn build(&self, n: usize) -> Vec<Chunk> {
        build_chunks(n, self.workers)
    }

    /// Run `f` once per work item and return the results in input order.
    ///
    /// Blocks until every item is done.
    pub fn dispatch<W, R, F>(&self, work: Vec<W>, f: F) -> Result<Vec<R>>
    where
        W: Send,
        R: Send,
        F: Fn(W) -> R + Sync + Send,
    {
        tracing::debug!("Dispatching {} chunks on {} workers", work.len(), self.workers);
        if self.dedicated_pool {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(|e| CoreError::Scheduler(e.to_string()))?;
            Ok(pool.install(|| work.into_par_iter().map(&f).collect()))
        } else {
            Ok(work.into_par_iter().map(f).collect())
        }
    }
}

/// Partition `[0, n)` into `min(n, workers)` contiguous chunks.
///
/// The first `n % count` chunks take one extra voxel.
pub fn build_chunks(n: usize, workers: usize) -> Vec<Chunk> {
    if n == 0 {
        return Vec::new();
    }
    let count = workers.max(1).min(n);
    let base = n / count;
    let extra = n % count;

    let mut chunks = Vec::with_capacity(count);
    let mut first = 0;
    for index in 0..count {
        let len = base + usize::from(index < extra);
        chunks.push(Chunk {
            index,
            first,
            last: first + len - 1,
        });
        first += len;
    }
    chunks
}

/// Split an interleaved buffer holding `stride` values per voxel into one
/// disjoint mutable slice per chunk.
pub fn split_chunks_mut<'a, T>(mut data: &'a mut [T], chunks: &[Chunk], stride: usize) -> Vec<&'a mut [T]> {
    let mut slices = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let (head, tail) = std::mem::take(&mut data).split_at_mut(chunk.len() * stride);
        slices.push(head);
        data = tail;
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remainder_goes_to_first_chunks() {
        let chunks = build_chunks(10, 3);
        assert_eq!(
            chunks,
            vec![
                Chunk { index: 0, first: 0, last: 3 },
                Chunk { index: 1, first: 4, last: 6 },
                Chunk { index: 2, first: 7, last: 9 },
            ]
        );
    }

    #[test]
    fn test_more_workers_than_voxels() {
        let chunks = build_chunks(2, 8);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_split_chunks_mut_is_disjoint() {
        let chunks = build_chunks(5, 2);
        let mut data: Vec<usize> = vec![0; 10];
        {
            let slices = split_chunks_mut(&mut data, &chunks, 2);
            assert_eq!(slices.len(), 2);
            for (slice, chunk) in slices.into_iter().zip(chunks.iter()) {
                assert_eq!(slice.len(), chunk.len() * 2);
                slice.iter_mut().for_each(|v| *v = chunk.index + 1);
            }
        }
        assert_eq!(data, vec![1, 1, 1, 1, 1, 1, 2, 2, 2, 2]);
    }

    #[test]
    fn test_dispatch_keeps_order() {
        let scheduler = ChunkScheduler::with_workers(3);
        let chunks = scheduler.build(100);
        let sums = scheduler.dispatch(chunks.clone(), |c| (c.first..=c.last).sum::<usize>()).unwrap();
        assert_eq!(sums.len(), chunks.len());
        assert_eq!(sums.iter().sum::<usize>(), (0..100).sum::<usize>());
        assert_eq!(sums[0], (0..=33).sum::<usize>());
    }
}
