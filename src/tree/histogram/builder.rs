//! Histogram kernels and per-round orchestration.

use super::collection::HistCollection;
use super::parallel::ParallelGHistBuilder;
use crate::config::HistConfig;
use crate::core::error::{HistError, Result};
use crate::core::types::{GradStats, GradientPair, NodeId};
use crate::core::utils::threading::{parallel_for_2d_with, BlockedSpace2d, WorkerPool};
use crate::dataset::binning::index_matrix::{BinIndexView, BinType};
use crate::dataset::binning::GHistIndexMatrix;

/// Accumulation kernels over a bin matrix.
#[derive(Debug, Clone, Copy)]
pub struct GHistBuilder {
    nbins: usize,
}

impl GHistBuilder {
    pub fn new(nbins: usize) -> Self {
        GHistBuilder { nbins }
    }

    pub fn n_bins(&self) -> usize {
        self.nbins
    }

    /// Adds the gradient pair of every row in `rows` to each bin the row falls in.
    pub fn build_hist(
        &self,
        gpair: &[GradientPair],
        rows: &[usize],
        gmat: &GHistIndexMatrix,
        hist: &mut [GradStats],
    ) -> Result<()> {
        if hist.len() != self.nbins || gmat.cut().total_bins() != self.nbins {
            return Err(HistError::dimension_mismatch(
                format!("{} bins", self.nbins),
                format!(
                    "histogram of {} bins over a matrix of {} bins",
                    hist.len(),
                    gmat.cut().total_bins()
                ),
            ));
        }
        let limit = gmat.num_rows().min(gpair.len());
        if let Some(&bad) = rows.iter().find(|&&r| r >= limit) {
            return Err(HistError::index_out_of_bounds(bad, limit));
        }
        self.build_hist_unchecked(gpair, rows, gmat, hist);
        Ok(())
    }

    /// [`build_hist`](Self::build_hist) for inputs validated by the caller.
    fn build_hist_unchecked(
        &self,
        gpair: &[GradientPair],
        rows: &[usize],
        gmat: &GHistIndexMatrix,
        hist: &mut [GradStats],
    ) {
        let row_ptr = gmat.row_ptr();
        let offsets = gmat.offsets();
        match gmat.index() {
            BinIndexView::U8(bins) => accumulate(bins, offsets, row_ptr, gpair, rows, hist),
            BinIndexView::U16(bins) => accumulate(bins, offsets, row_ptr, gpair, rows, hist),
            BinIndexView::U32(bins) => accumulate(bins, offsets, row_ptr, gpair, rows, hist),
        }
    }

    /// Sets `self_hist = parent - sibling` bin by bin.
    pub fn subtraction_trick(
        &self,
        self_hist: &mut [GradStats],
        sibling: &[GradStats],
        parent: &[GradStats],
    ) -> Result<()> {
        if self_hist.len() != self.nbins || sibling.len() != self.nbins || parent.len() != self.nbins {
            return Err(HistError::dimension_mismatch(
                format!("three histograms of {} bins", self.nbins),
                format!(
                    "{}, {} and {} bins",
                    self_hist.len(),
                    sibling.len(),
                    parent.len()
                ),
            ));
        }
        for ((dst, &s), &p) in self_hist.iter_mut().zip(sibling).zip(parent) {
            *dst = p - s;
        }
        Ok(())
    }
}

#[inline]
fn accumulate<T: BinType>(
    bins: &[T],
    offsets: Option<&[u32]>,
    row_ptr: &[usize],
    gpair: &[GradientPair],
    rows: &[usize],
    hist: &mut [GradStats],
) {
    for &rid in rows {
        let pair = gpair[rid];
        let (grad, hess) = (f64::from(pair.grad), f64::from(pair.hess));
        let row = &bins[row_ptr[rid]..row_ptr[rid + 1]];
        match offsets {
            Some(offsets) => {
                for (&bin, &offset) in row.iter().zip(offsets) {
                    hist[bin.as_() + offset as usize].add_stats(grad, hess);
                }
            }
            None => {
                for &bin in row {
                    hist[bin.as_()].add_stats(grad, hess);
                }
            }
        }
    }
}

/// Builds the histograms of a set of nodes in one parallel round.
///
/// Work is the (node x row) space cut into blocks of `block_size` rows.
/// Workers accumulate into their own scratch rows, which are then reduced
/// into the collection over blocks of `reduce_block_size` bins.
#[derive(Debug)]
pub struct HistogramBuilder {
    config: HistConfig,
    pool: WorkerPool,
    buffer: ParallelGHistBuilder,
}

impl HistogramBuilder {
    /// Creates a builder with a pool sized from `config`.
    pub fn new(config: HistConfig) -> Result<Self> {
        let pool = config.worker_pool()?;
        Ok(HistogramBuilder {
            config,
            pool,
            buffer: ParallelGHistBuilder::new(),
        })
    }

    /// Creates a builder running on an existing pool.
    pub fn with_pool(config: HistConfig, pool: WorkerPool) -> Result<Self> {
        config.validate()?;
        Ok(HistogramBuilder {
            config,
            pool,
            buffer: ParallelGHistBuilder::new(),
        })
    }

    pub fn config(&self) -> &HistConfig {
        &self.config
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Fills the row of every `(node, rows)` pair in `collection` with the
    /// histogram of its rows. Missing rows are added; the collection width is
    /// set to the matrix bin count if it differs.
    pub fn build_histograms(
        &mut self,
        gmat: &GHistIndexMatrix,
        gpair: &[GradientPair],
        nodes: &[(NodeId, &[usize])],
        collection: &mut HistCollection,
    ) -> Result<()> {
        let nbins = gmat.cut().total_bins();
        if gpair.len() < gmat.num_rows() {
            return Err(HistError::dimension_mismatch(
                format!("{} gradient pairs", gmat.num_rows()),
                format!("{} gradient pairs", gpair.len()),
            ));
        }
        for (_, rows) in nodes {
            if let Some(&bad) = rows.iter().find(|&&r| r >= gmat.num_rows()) {
                return Err(HistError::index_out_of_bounds(bad, gmat.num_rows()));
            }
        }

        collection.init(nbins);
        for &(nid, _) in nodes {
            if !collection.contains(nid) {
                collection.add_hist_row(nid);
            }
        }

        let targets: Vec<NodeId> = nodes.iter().map(|&(nid, _)| nid).collect();
        let space = BlockedSpace2d::new(nodes.len(), |i| nodes[i].1.len(), self.config.block_size)?;
        let n_threads = self.pool.n_threads();
        self.buffer.init(nbins);
        self.buffer.reset(n_threads, &space, &targets)?;

        let kernel = GHistBuilder::new(nbins);
        let mut states: Vec<_> = self
            .buffer
            .thread_buffers()
            .into_iter()
            .map(|buffer| (buffer, Ok::<(), HistError>(())))
            .collect();
        parallel_for_2d_with(&space, &self.pool, &mut states, |(buffer, status), group, range| {
            if status.is_err() {
                return;
            }
            match buffer.get_initialized_hist(group) {
                Ok(hist) => {
                    let rows = &nodes[group].1[range.begin()..range.end()];
                    kernel.build_hist_unchecked(gpair, rows, gmat, hist);
                }
                Err(e) => *status = Err(e),
            }
        });
        for (_, status) in states {
            status?;
        }

        self.buffer
            .reduce_all(collection, &self.pool, self.config.reduce_block_size)?;
        log::debug!(
            "Built {} histograms over {} blocks with {} workers",
            nodes.len(),
            space.size(),
            n_threads
        );
        Ok(())
    }
}
