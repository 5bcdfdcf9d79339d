//! Column-scanning cut builder for sparse matrices.

use super::cuts::{FeatureCuts, HistogramCuts};
use super::{row_weights, validate_max_bins};
use crate::core::error::{HistError, Result};
use crate::core::utils::threading::{
    parallel_for_2d_with, BlockedSpace2d, Range1d, Threading, WorkerPool,
};
use crate::dataset::{FeatureMatrix, MetaInfo, SparsePage};

/// Builds cuts from the column-major page, one feature at a time.
///
/// Work is balanced on the number of non-missing entries per column: the
/// feature axis is cut into contiguous ranges of similar weight and each
/// range is built sequentially by one worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseCuts;

impl SparseCuts {
    pub fn new() -> Self {
        SparseCuts
    }

    /// Builds the cuts of features `columns` of a column-major `page`. The
    /// returned cuts hold only those features, with offsets starting at 0.
    pub fn single_thread_build(
        &self,
        page: &SparsePage,
        info: &MetaInfo,
        max_bins: usize,
        columns: Range1d,
    ) -> Result<HistogramCuts> {
        validate_max_bins(max_bins)?;
        if columns.end() > page.size() {
            return Err(HistError::index_out_of_bounds(columns.end(), page.size()));
        }
        let weights = row_weights(info)?;
        Ok(build_range(page, info.num_row, weights.as_deref(), max_bins, columns))
    }

    pub fn build<M: FeatureMatrix + ?Sized>(
        &self,
        matrix: &M,
        max_bins: usize,
        pool: &WorkerPool,
    ) -> Result<HistogramCuts> {
        validate_max_bins(max_bins)?;
        let info = matrix.info();
        let page = matrix.column_page()?;
        let weights = row_weights(info)?;

        let ranges = Threading::partition_by_weight(&page.line_sizes(), pool.n_threads());
        let space = BlockedSpace2d::new(ranges.len(), |_| 1, 1)?;
        let mut parts: Vec<Vec<(usize, HistogramCuts)>> = vec![Vec::new(); pool.n_threads()];

        parallel_for_2d_with(&space, pool, &mut parts, |out, group, _| {
            let cuts = build_range(page, info.num_row, weights.as_deref(), max_bins, ranges[group]);
            out.push((group, cuts));
        });

        let mut parts: Vec<(usize, HistogramCuts)> = parts.into_iter().flatten().collect();
        parts.sort_by_key(|(group, _)| *group);

        let mut cuts = HistogramCuts::new();
        for (_, part) in parts {
            cuts.extend(part);
        }
        log::debug!(
            "Sparse cuts built: {} features in {} ranges, {} bins",
            cuts.num_features(),
            ranges.len(),
            cuts.total_bins()
        );
        Ok(cuts)
    }
}

fn build_range(
    page: &SparsePage,
    num_row: usize,
    weights: Option<&[f32]>,
    max_bins: usize,
    columns: Range1d,
) -> HistogramCuts {
    let mut cuts = HistogramCuts::new();
    for col in columns.iter() {
        let mut sketch = FeatureCuts::sketch(num_row, max_bins);
        for entry in page.line(col) {
            let w = weights.map_or(1.0, |w| f64::from(w[entry.index as usize]));
            sketch.push(entry.fvalue, w);
        }
        cuts.push_feature(FeatureCuts::from_sketch(&sketch, max_bins));
    }
    cuts
}
