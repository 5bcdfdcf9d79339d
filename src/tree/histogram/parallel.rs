//! Thread-local histogram buffers and their reduction into a collection.
//!
//! During a round every worker accumulates into private scratch rows, one
//! per node it touches; no two workers ever write the same row. Which
//! worker touches which node is known before dispatch, because blocks are
//! assigned to workers statically (see [`BlockedSpace2d::thread_blocks`]).
//! [`ParallelGHistBuilder::reset`] uses that to register exactly the
//! (worker, node) pairs that will be used, and the reduction only visits
//! those.
//!
//! Scratch rows live in an arena that is reused across rounds. Rows are
//! zeroed lazily: each carries the generation of the last round that
//! initialised it, and a row from an older generation reads as zero.

use super::collection::HistCollection;
use crate::core::error::{HistError, Result};
use crate::core::types::{GHistRow, GradStats, NodeId};
use crate::core::utils::threading::{parallel_for_2d_with, BlockedSpace2d, WorkerPool};
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct ScratchRow {
    data: GHistRow,
    generation: u64,
}

impl ScratchRow {
    #[inline]
    fn initialized(&mut self, generation: u64) -> &mut [GradStats] {
        if self.generation != generation {
            self.data.fill(GradStats::default());
            self.generation = generation;
        }
        &mut self.data
    }
}

/// Thread-local histogram buffers for one (node x row-range) round.
#[derive(Debug, Default)]
pub struct ParallelGHistBuilder {
    nbins: usize,
    n_threads: usize,
    generation: u64,
    /// `arena[tid][slot]`
    arena: Vec<Vec<ScratchRow>>,
    /// Per worker, `(group, slot)` pairs in ascending group order
    touched: Vec<Vec<(usize, usize)>>,
    targets: Vec<NodeId>,
}

impl ParallelGHistBuilder {
    pub fn new() -> Self {
        ParallelGHistBuilder::default()
    }

    /// Fixes the row width. Changing it releases the arena.
    pub fn init(&mut self, nbins: usize) {
        if nbins != self.nbins {
            self.nbins = nbins;
            self.arena.clear();
            self.touched.clear();
            self.targets.clear();
        }
    }

    /// Row width.
    pub fn n_bins(&self) -> usize {
        self.nbins
    }

    /// Number of workers registered by the last [`reset`](Self::reset).
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    /// Target node ids of the current round, indexed by group.
    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }

    /// Number of scratch rows allocated so far.
    pub fn arena_size(&self) -> usize {
        self.arena.iter().map(Vec::len).sum()
    }

    /// Prepares a round. Group `i` of `space` accumulates into node
    /// `targets[i]`; the work will run on `n_threads` workers.
    pub fn reset(&mut self, n_threads: usize, space: &BlockedSpace2d, targets: &[NodeId]) -> Result<()> {
        if n_threads == 0 {
            return Err(HistError::invalid_parameter(
                "n_threads",
                "0",
                "at least one worker is required",
            ));
        }
        if self.nbins == 0 {
            return Err(HistError::config("histogram width must be set before reset"));
        }
        if space.num_groups() > targets.len() {
            return Err(HistError::dimension_mismatch(
                format!("at least {} target nodes", space.num_groups()),
                format!("{} target nodes", targets.len()),
            ));
        }
        let mut seen = HashSet::with_capacity(targets.len());
        if let Some(dup) = targets.iter().find(|nid| !seen.insert(**nid)) {
            return Err(HistError::invalid_parameter(
                "targets",
                dup.to_string(),
                "target node ids must be distinct",
            ));
        }

        self.generation += 1;
        self.n_threads = n_threads;
        self.targets = targets.to_vec();
        if self.arena.len() < n_threads {
            self.arena.resize_with(n_threads, Vec::new);
        }
        self.touched.clear();
        self.touched.resize_with(n_threads, Vec::new);

        let nbins = self.nbins;
        let mut allocated = 0;
        for (tid, touched) in self.touched.iter_mut().enumerate() {
            let rows = &mut self.arena[tid];
            for block in space.thread_blocks(tid, n_threads) {
                let group = space.first_dimension(block);
                if touched.last().map_or(true, |&(g, _)| g != group) {
                    let slot = touched.len();
                    touched.push((group, slot));
                    if rows.len() <= slot {
                        rows.push(ScratchRow {
                            data: vec![GradStats::default(); nbins],
                            generation: 0,
                        });
                        allocated += 1;
                    }
                }
            }
        }
        log::debug!(
            "Histogram buffers reset: {} workers, {} targets, {} touched rows, {} newly allocated",
            n_threads,
            targets.len(),
            self.touched.iter().map(Vec::len).sum::<usize>(),
            allocated
        );
        Ok(())
    }

    /// One buffer per worker, each with exclusive access to that worker's
    /// scratch rows. Buffer `tid` must be used by the worker that runs the
    /// blocks `space.thread_blocks(tid, n_threads)`.
    pub fn thread_buffers(&mut self) -> Vec<ThreadHistBuffer<'_>> {
        let generation = self.generation;
        self.arena
            .iter_mut()
            .zip(self.touched.iter())
            .enumerate()
            .map(|(tid, (rows, touched))| ThreadHistBuffer {
                tid,
                generation,
                touched,
                rows,
            })
            .collect()
    }

    /// Zeroed (on first use this round) scratch row of worker `tid` for `group`.
    pub fn get_initialized_hist(&mut self, tid: usize, group: usize) -> Result<&mut [GradStats]> {
        let slot = self
            .touched
            .get(tid)
            .and_then(|touched| find_slot(touched, group))
            .ok_or(HistError::UnregisteredHistogram { thread: tid, node: group })?;
        Ok(self.arena[tid][slot].initialized(self.generation))
    }

    /// Sums the scratch rows of `group` over bins `[bin_begin, bin_end)` into
    /// the target row of `collection`, overwriting it.
    ///
    /// `group` is a position in [`targets`](Self::targets), not a [`NodeId`];
    /// the row written is the one of node `targets()[group]`.
    pub fn reduce_hist(
        &self,
        group: usize,
        bin_begin: usize,
        bin_end: usize,
        collection: &mut HistCollection,
    ) -> Result<()> {
        let nid = *self
            .targets
            .get(group)
            .ok_or_else(|| HistError::index_out_of_bounds(group, self.targets.len()))?;
        if bin_begin > bin_end {
            return Err(HistError::InvalidRange {
                begin: bin_begin,
                end: bin_end,
            });
        }
        if bin_end > self.nbins {
            return Err(HistError::index_out_of_bounds(bin_end, self.nbins));
        }
        self.check_width(collection)?;
        let dst = collection.get_mut(nid)?;
        self.reduce_into(group, bin_begin, &mut dst[bin_begin..bin_end]);
        Ok(())
    }

    /// Reduces every target row in parallel over (node x bin-range) blocks of
    /// at most `grain` bins.
    pub fn reduce_all(
        &self,
        collection: &mut HistCollection,
        pool: &WorkerPool,
        grain: usize,
    ) -> Result<()> {
        self.check_width(collection)?;
        let space = BlockedSpace2d::new(self.targets.len(), |_| self.nbins, grain)?;
        let rows = collection.rows_mut(&self.targets)?;

        // Block i of the space is chunk i of the rows laid out group by group.
        let mut chunks = rows.into_iter().flat_map(|row| row.chunks_mut(grain));
        let n_threads = pool.n_threads();
        let mut states: Vec<std::vec::IntoIter<&mut [GradStats]>> = (0..n_threads)
            .map(|tid| {
                let n_blocks = space.thread_blocks(tid, n_threads).len();
                chunks.by_ref().take(n_blocks).collect::<Vec<_>>().into_iter()
            })
            .collect();

        parallel_for_2d_with(&space, pool, &mut states, |chunks, group, range| {
            if let Some(dst) = chunks.next() {
                self.reduce_into(group, range.begin(), dst);
            }
        });
        Ok(())
    }

    fn check_width(&self, collection: &HistCollection) -> Result<()> {
        if collection.n_bins() != self.nbins {
            return Err(HistError::dimension_mismatch(
                format!("{} bins", self.nbins),
                format!("{} bins", collection.n_bins()),
            ));
        }
        Ok(())
    }

    /// Overwrites `dst` (bins starting at `bin_begin`) with the sum of the
    /// initialised scratch rows of `group`.
    fn reduce_into(&self, group: usize, bin_begin: usize, dst: &mut [GradStats]) {
        dst.fill(GradStats::default());
        let bin_end = bin_begin + dst.len();
        for (tid, touched) in self.touched.iter().enumerate() {
            let Some(slot) = find_slot(touched, group) else {
                continue;
            };
            let row = &self.arena[tid][slot];
            if row.generation != self.generation {
                continue;
            }
            for (acc, src) in dst.iter_mut().zip(&row.data[bin_begin..bin_end]) {
                *acc += *src;
            }
        }
    }
}

/// Exclusive view of one worker's scratch rows for the current round.
#[derive(Debug)]
pub struct ThreadHistBuffer<'a> {
    tid: usize,
    generation: u64,
    touched: &'a [(usize, usize)],
    rows: &'a mut [ScratchRow],
}

impl ThreadHistBuffer<'_> {
    /// Worker id this buffer belongs to.
    pub fn tid(&self) -> usize {
        self.tid
    }

    /// Groups registered for this worker, ascending.
    pub fn groups(&self) -> impl Iterator<Item = usize> + '_ {
        self.touched.iter().map(|&(g, _)| g)
    }

    /// Zeroed (on first use this round) scratch row for `group`.
    pub fn get_initialized_hist(&mut self, group: usize) -> Result<&mut [GradStats]> {
        let slot = find_slot(self.touched, group).ok_or(HistError::UnregisteredHistogram {
            thread: self.tid,
            node: group,
        })?;
        Ok(self.rows[slot].initialized(self.generation))
    }
}

#[inline]
fn find_slot(touched: &[(usize, usize)], group: usize) -> Option<usize> {
    touched
        .binary_search_by_key(&group, |&(g, _)| g)
        .ok()
        .map(|i| touched[i].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const K_BINS: usize = 10;
    const K_NODES: usize = 5;
    const K_TASKS_PER_NODE: usize = 10;

    fn fill_ones(builder: &mut ParallelGHistBuilder, space: &BlockedSpace2d, pool: &WorkerPool) {
        let mut buffers = builder.thread_buffers();
        parallel_for_2d_with(space, pool, &mut buffers, |buffer, group, _| {
            if let Ok(hist) = buffer.get_initialized_hist(group) {
                for bin in hist.iter_mut() {
                    bin.add_stats(1.0, 1.0);
                }
            }
        });
    }

    #[test]
    fn test_reset_zeroes_reused_rows() {
        let n_threads = 4;
        let pool = WorkerPool::new(n_threads).unwrap();
        let mut builder = ParallelGHistBuilder::new();
        builder.init(K_BINS);

        let targets: Vec<NodeId> = (0..10).collect();
        let space = BlockedSpace2d::new(K_NODES, |_| K_TASKS_PER_NODE, 1).unwrap();
        builder.reset(n_threads, &space, &targets[..K_NODES]).unwrap();
        fill_ones(&mut builder, &space, &pool);
        let allocated = builder.arena_size();

        let space2 = BlockedSpace2d::new(10, |_| K_TASKS_PER_NODE, 1).unwrap();
        builder.reset(n_threads, &space2, &targets).unwrap();
        assert!(builder.arena_size() >= allocated);
        for tid in 0..n_threads {
            for block in space2.thread_blocks(tid, n_threads) {
                let group = space2.first_dimension(block);
                let hist = builder.get_initialized_hist(tid, group).unwrap();
                assert!(hist.iter().all(GradStats::is_zero));
            }
        }
    }

    #[test]
    fn test_reduce_hist_sums_tasks() {
        let n_threads = 3;
        let pool = WorkerPool::new(n_threads).unwrap();
        let mut collection = HistCollection::new();
        collection.init(K_BINS);
        for nid in 0..K_NODES as NodeId {
            collection.add_hist_row(nid);
        }

        let mut builder = ParallelGHistBuilder::new();
        builder.init(K_BINS);
        let targets: Vec<NodeId> = (0..K_NODES as NodeId).collect();
        let space = BlockedSpace2d::new(K_NODES, |_| K_TASKS_PER_NODE, 1).unwrap();
        builder.reset(n_threads, &space, &targets).unwrap();

        let mut buffers = builder.thread_buffers();
        parallel_for_2d_with(&space, &pool, &mut buffers, |buffer, group, _| {
            let hist = buffer.get_initialized_hist(group).unwrap();
            for bin in hist.iter_mut() {
                bin.add_stats(1.0, 1.0);
            }
        });

        for group in 0..K_NODES {
            builder.reduce_hist(group, 0, K_BINS, &mut collection).unwrap();
            for bin in &collection[group as NodeId] {
                assert_eq!(bin.grad(), K_TASKS_PER_NODE as f64);
                assert_eq!(bin.hess(), K_TASKS_PER_NODE as f64);
            }
        }
    }

    #[test]
    fn test_reduce_hist_indexes_targets_by_group() {
        let pool = WorkerPool::new(2).unwrap();
        let mut builder = ParallelGHistBuilder::new();
        builder.init(K_BINS);
        let targets: Vec<NodeId> = vec![7, 2];
        let space = BlockedSpace2d::new(2, |g| [4, 1][g], 1).unwrap();
        builder.reset(2, &space, &targets).unwrap();
        fill_ones(&mut builder, &space, &pool);

        let mut collection = HistCollection::new();
        collection.init(K_BINS);
        collection.add_hist_row(7);
        collection.add_hist_row(2);
        builder.reduce_hist(0, 0, K_BINS, &mut collection).unwrap();
        builder.reduce_hist(1, 0, K_BINS, &mut collection).unwrap();
        assert!(collection[7].iter().all(|bin| bin.hess() == 4.0));
        assert!(collection[2].iter().all(|bin| bin.hess() == 1.0));

        // node ids are not group positions
        let err = builder.reduce_hist(7, 0, K_BINS, &mut collection).unwrap_err();
        assert!(err.is_range_error());
    }

    #[test]
    fn test_reduce_all_matches_reduce_hist() {
        let pool = WorkerPool::new(4).unwrap();
        let mut builder = ParallelGHistBuilder::new();
        builder.init(37);
        let targets: Vec<NodeId> = vec![11, 3, 8];
        let space = BlockedSpace2d::new(3, |g| [7, 0, 20][g], 3).unwrap();
        builder.reset(4, &space, &targets).unwrap();
        fill_ones(&mut builder, &space, &pool);

        let mut serial = HistCollection::new();
        serial.init(37);
        let mut parallel = serial.clone();
        for &nid in &targets {
            serial.add_hist_row(nid);
            parallel.add_hist_row(nid);
        }
        for group in 0..3 {
            builder.reduce_hist(group, 0, 37, &mut serial).unwrap();
        }
        builder.reduce_all(&mut parallel, &pool, 5).unwrap();
        for &nid in &targets {
            assert_eq!(serial.get(nid).unwrap(), parallel.get(nid).unwrap());
        }
        // node 3 had no tasks
        assert!(parallel[3].iter().all(GradStats::is_zero));
        // every block of node 11 added one
        assert_eq!(parallel[11][0].grad(), 3.0);
    }

    #[test]
    fn test_partial_bin_range() {
        let pool = WorkerPool::new(2).unwrap();
        let mut builder = ParallelGHistBuilder::new();
        builder.init(K_BINS);
        let space = BlockedSpace2d::new(1, |_| 4, 1).unwrap();
        builder.reset(2, &space, &[0]).unwrap();
        fill_ones(&mut builder, &space, &pool);

        let mut collection = HistCollection::new();
        collection.init(K_BINS);
        collection.add_hist_row(0);
        builder.reduce_hist(0, 2, 5, &mut collection).unwrap();
        assert!(collection[0][..2].iter().all(GradStats::is_zero));
        assert_eq!(collection[0][2].grad(), 4.0);
        assert_eq!(collection[0][4].grad(), 4.0);
        assert!(collection[0][5..].iter().all(GradStats::is_zero));
    }

    #[test]
    fn test_usage_errors() {
        let mut builder = ParallelGHistBuilder::new();
        let space = BlockedSpace2d::new(2, |_| 4, 2).unwrap();
        assert!(builder.reset(2, &space, &[0, 1]).unwrap_err().is_config_error());

        builder.init(4);
        assert!(builder.reset(0, &space, &[0, 1]).unwrap_err().is_config_error());
        assert!(matches!(
            builder.reset(2, &space, &[0]),
            Err(HistError::DimensionMismatch { .. })
        ));
        assert!(builder.reset(2, &space, &[1, 1]).is_err());

        builder.reset(2, &space, &[0, 1]).unwrap();
        // worker 0 owns the two blocks of group 0, worker 1 those of group 1
        assert_eq!(
            builder.get_initialized_hist(0, 1).unwrap_err(),
            HistError::UnregisteredHistogram { thread: 0, node: 1 }
        );
        assert!(builder.get_initialized_hist(2, 0).is_err());
        assert!(builder.get_initialized_hist(1, 1).is_ok());

        let mut collection = HistCollection::new();
        collection.init(4);
        assert_eq!(
            builder.reduce_hist(0, 0, 4, &mut collection).unwrap_err(),
            HistError::NodeNotFound { node: 0 }
        );
        collection.add_hist_row(0);
        assert!(builder.reduce_hist(0, 3, 2, &mut collection).unwrap_err().is_range_error());
        assert!(builder.reduce_hist(0, 0, 5, &mut collection).unwrap_err().is_range_error());
        assert!(builder.reduce_hist(2, 0, 4, &mut collection).unwrap_err().is_range_error());

        let mut narrow = HistCollection::new();
        narrow.init(3);
        narrow.add_hist_row(0);
        assert!(builder.reduce_hist(0, 0, 3, &mut narrow).is_err());
    }
}
