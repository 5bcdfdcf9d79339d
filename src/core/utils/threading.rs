//! Work partitioning and fork-join dispatch on top of Rayon.
//!
//! Key components:
//! - [`WorkerPool`]: a fixed-size Rayon pool every parallel phase runs on
//! - [`Threading::partition_by_weight`]: splits weighted items into contiguous parts
//! - [`BlockedSpace2d`]: splits a (group x task) space into contiguous blocks
//! - [`parallel_for_2d`] and friends: run a callback for every block
//!
//! Blocks are assigned to workers statically: with `B` blocks and `n`
//! workers, worker `t` owns blocks `[t * chunk, (t + 1) * chunk)` where
//! `chunk = ceil(B / n)`. Consumers that keep per-worker state rely on that
//! assignment being predictable before dispatch.

use crate::core::error::{HistError, Result};
use rayon::prelude::*;
use std::cmp::min;
use std::ops::Range;

/// Fixed-size worker pool shared by every parallel phase.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    n_threads: usize,
}

impl WorkerPool {
    /// Builds a pool with `n_threads` workers; 0 means all logical cores.
    pub fn new(n_threads: usize) -> Result<Self> {
        let n_threads = if n_threads == 0 {
            num_cpus::get()
        } else {
            n_threads
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("gbdt-hist-{}", i))
            .build()?;
        log::debug!("Built worker pool with {} threads", n_threads);
        Ok(WorkerPool { pool, n_threads })
    }

    /// Single-threaded pool, the reference for determinism checks.
    pub fn single() -> Result<Self> {
        Self::new(1)
    }

    /// Number of workers in the pool.
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    /// Runs `op` inside the pool; parallel iterators used by `op` run on its workers.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

/// Work splitting helpers.
#[derive(Debug)]
pub struct Threading;

impl Threading {
    /// Splits `weights.len()` items into at most `n_parts` contiguous ranges of
    /// roughly equal total weight. Empty ranges are never returned.
    pub fn partition_by_weight(weights: &[usize], n_parts: usize) -> Vec<Range1d> {
        let n_items = weights.len();
        if n_items == 0 {
            return Vec::new();
        }
        let n_parts = n_parts.clamp(1, n_items);
        let total: usize = weights.iter().sum();
        let per_part = total.div_ceil(n_parts).max(1);

        let mut ranges = Vec::with_capacity(n_parts);
        let mut begin = 0;
        let mut acc = 0;
        for (i, &w) in weights.iter().enumerate() {
            acc += w;
            let remaining_items = n_items - (i + 1);
            let remaining_parts = n_parts - ranges.len() - 1;
            if remaining_parts > 0 && (acc >= per_part || remaining_items == remaining_parts) {
                ranges.push(Range1d { begin, end: i + 1 });
                begin = i + 1;
                acc = 0;
            }
        }
        if begin < n_items {
            ranges.push(Range1d {
                begin,
                end: n_items,
            });
        }
        ranges
    }
}

/// Half-open range `[begin, end)` of task indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range1d {
    begin: usize,
    end: usize,
}

impl Range1d {
    /// Creates a range; `begin > end` is a range error.
    pub fn new(begin: usize, end: usize) -> Result<Self> {
        if begin > end {
            return Err(HistError::InvalidRange { begin, end });
        }
        Ok(Range1d { begin, end })
    }

    /// First index of the range.
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// One past the last index of the range.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of indices in the range.
    pub fn size(&self) -> usize {
        self.end - self.begin
    }

    /// True when the range holds no index.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    /// Iterator over the indices.
    pub fn iter(&self) -> Range<usize> {
        self.begin..self.end
    }
}

impl From<Range1d> for Range<usize> {
    fn from(r: Range1d) -> Self {
        r.begin..r.end
    }
}

/// Two-dimensional (group x task) space cut into blocks of at most `grain`
/// tasks, stored group-major.
#[derive(Debug, Clone, Default)]
pub struct BlockedSpace2d {
    first_dimension: Vec<usize>,
    ranges: Vec<Range1d>,
}

impl BlockedSpace2d {
    /// Builds the space for `dim1` groups; group `i` has `task_count(i)` tasks.
    /// A group with no tasks contributes no block.
    pub fn new<F>(dim1: usize, task_count: F, grain: usize) -> Result<Self>
    where
        F: Fn(usize) -> usize,
    {
        if grain == 0 {
            return Err(HistError::invalid_parameter(
                "grain",
                "0",
                "block granularity must be positive",
            ));
        }
        let mut space = BlockedSpace2d::default();
        for group in 0..dim1 {
            let size = task_count(group);
            let n_blocks = size.div_ceil(grain);
            for iblock in 0..n_blocks {
                let begin = iblock * grain;
                let end = min(begin + grain, size);
                space.first_dimension.push(group);
                space.ranges.push(Range1d { begin, end });
            }
        }
        Ok(space)
    }

    /// Number of blocks.
    pub fn size(&self) -> usize {
        self.ranges.len()
    }

    /// True when the space holds no block.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Group index of block `i`.
    pub fn first_dimension(&self, i: usize) -> usize {
        self.first_dimension[i]
    }

    /// Task range of block `i`.
    pub fn get_range(&self, i: usize) -> Range1d {
        self.ranges[i]
    }

    /// Largest group index referenced by any block, plus one.
    pub fn num_groups(&self) -> usize {
        self.first_dimension.last().map_or(0, |&g| g + 1)
    }

    /// Blocks owned by worker `tid` out of `n_threads`.
    pub fn thread_blocks(&self, tid: usize, n_threads: usize) -> Range<usize> {
        let n_blocks = self.size();
        let n_threads = n_threads.max(1);
        let chunk = n_blocks.div_ceil(n_threads);
        let begin = min(chunk * tid, n_blocks);
        let end = min(begin + chunk, n_blocks);
        begin..end
    }
}

/// Runs `func(group, range)` for every block of `space` on `pool`, returning
/// after all blocks complete.
pub fn parallel_for_2d<F>(space: &BlockedSpace2d, pool: &WorkerPool, func: F)
where
    F: Fn(usize, Range1d) + Send + Sync,
{
    parallel_for_2d_indexed(space, pool, |_, group, range| func(group, range));
}

/// Like [`parallel_for_2d`] but also passes the worker id that owns the block.
pub fn parallel_for_2d_indexed<F>(space: &BlockedSpace2d, pool: &WorkerPool, func: F)
where
    F: Fn(usize, usize, Range1d) + Send + Sync,
{
    let n_threads = pool.n_threads();
    pool.install(|| {
        (0..n_threads).into_par_iter().for_each(|tid| {
            for i in space.thread_blocks(tid, n_threads) {
                func(tid, space.first_dimension(i), space.get_range(i));
            }
        });
    });
}

/// Runs `func(state, group, range)` for every block, where `state` is the
/// exclusively owned per-worker value `states[tid]`. The number of workers is
/// `states.len()`.
pub fn parallel_for_2d_with<S, F>(
    space: &BlockedSpace2d,
    pool: &WorkerPool,
    states: &mut [S],
    func: F,
) where
    S: Send,
    F: Fn(&mut S, usize, Range1d) + Send + Sync,
{
    let n_threads = states.len();
    pool.install(|| {
        states.par_iter_mut().enumerate().for_each(|(tid, state)| {
            for i in space.thread_blocks(tid, n_threads) {
                func(state, space.first_dimension(i), space.get_range(i));
            }
        });
    });
}
