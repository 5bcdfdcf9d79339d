//! Quantile binning: cut-point construction and the bin-index matrix.
//!
//! Raw feature values are mapped to small integer bins in two steps:
//! - [`CutsBuilder`] sketches every feature and derives at most `max_bins`
//!   cut points per feature ([`HistogramCuts`]), either by scanning rows
//!   ([`DenseCuts`]) or columns ([`SparseCuts`]);
//! - [`GHistIndexMatrix`] replaces every present value by its global bin.
//!
//! Both strategies feed each feature's sketch in row order with the same
//! parameters, so they produce identical cuts on the same matrix.

pub mod cuts;
pub mod dense;
pub mod index_matrix;
pub mod sketch;
pub mod sparse;

pub use cuts::HistogramCuts;
pub use dense::DenseCuts;
pub use index_matrix::{BinIndexView, GHistIndexMatrix, RowBins};
pub use sketch::{QuantileSketch, WQSummary};
pub use sparse::SparseCuts;

use crate::config::HistConfig;
use crate::core::constants::MAX_BIN_LIMIT;
use crate::core::error::{HistError, Result};
use crate::core::types::CutStrategy;
use crate::core::utils::threading::WorkerPool;
use crate::dataset::{FeatureMatrix, MetaInfo};

/// Cut-building strategy.
#[derive(Debug, Clone, Copy)]
pub enum CutsBuilder {
    /// Row-major scan, one feature block per worker
    Dense(DenseCuts),
    /// Column-major scan, features balanced by entry count
    Sparse(SparseCuts),
}

impl CutsBuilder {
    /// Picks the strategy for a matrix: the configured one, or under
    /// [`CutStrategy::Auto`] the sparse one when the density is below
    /// `config.sparse_threshold`.
    pub fn select(info: &MetaInfo, config: &HistConfig) -> Self {
        let builder = match config.cut_strategy {
            CutStrategy::Dense => CutsBuilder::Dense(DenseCuts::new()),
            CutStrategy::Sparse => CutsBuilder::Sparse(SparseCuts::new()),
            CutStrategy::Auto => {
                if info.density() < config.sparse_threshold {
                    CutsBuilder::Sparse(SparseCuts::new())
                } else {
                    CutsBuilder::Dense(DenseCuts::new())
                }
            }
        };
        log::debug!(
            "Selected {} cuts for density {:.6}",
            builder.name(),
            info.density()
        );
        builder
    }

    /// Builds cuts with at most `max_bins` bins per feature.
    pub fn build<M: FeatureMatrix + ?Sized>(
        &self,
        matrix: &M,
        max_bins: usize,
        pool: &WorkerPool,
    ) -> Result<HistogramCuts> {
        match self {
            CutsBuilder::Dense(dense) => dense.build(matrix, max_bins, pool),
            CutsBuilder::Sparse(sparse) => sparse.build(matrix, max_bins, pool),
        }
    }

    /// Group containing `row`; see [`search_group_ind_from_row`].
    pub fn search_group_ind_from_row(group_ptr: &[usize], row: usize) -> Result<usize> {
        search_group_ind_from_row(group_ptr, row)
    }

    /// Strategy name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            CutsBuilder::Dense(_) => "dense",
            CutsBuilder::Sparse(_) => "sparse",
        }
    }
}

/// Returns `g` such that `group_ptr[g] <= row < group_ptr[g + 1]`.
///
/// A row outside `group_ptr[0]..group_ptr[last]`, or a pointer array
/// without any group, is a range error.
pub fn search_group_ind_from_row(group_ptr: &[usize], row: usize) -> Result<usize> {
    let (first, last) = match group_ptr {
        [first, .., last] => (*first, *last),
        _ => return Err(HistError::index_out_of_bounds(row, 0)),
    };
    if row < first || row >= last {
        return Err(HistError::index_out_of_bounds(row, last));
    }
    Ok(group_ptr.partition_point(|&p| p <= row) - 1)
}

/// Weight of every row, or `None` when all rows weigh 1.
pub(crate) fn row_weights(info: &MetaInfo) -> Result<Option<Vec<f32>>> {
    if info.weights.is_empty() {
        return Ok(None);
    }
    if info.uses_group_weights() {
        let mut weights = Vec::with_capacity(info.num_row);
        for row in 0..info.num_row {
            let group = search_group_ind_from_row(&info.group_ptr, row)?;
            weights.push(info.get_weight(group));
        }
        return Ok(Some(weights));
    }
    if info.weights.len() != info.num_row {
        return Err(HistError::dimension_mismatch(
            format!("{} weights", info.num_row),
            format!("{} weights", info.weights.len()),
        ));
    }
    Ok(Some(info.weights.clone()))
}

pub(crate) fn validate_max_bins(max_bins: usize) -> Result<()> {
    if max_bins == 0 || max_bins > MAX_BIN_LIMIT {
        return Err(HistError::invalid_parameter(
            "max_bins",
            max_bins.to_string(),
            format!("must be in range [1, {}]", MAX_BIN_LIMIT),
        ));
    }
    Ok(())
}
