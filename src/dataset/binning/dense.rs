//! Row-scanning cut builder for dense matrices.

use super::cuts::{FeatureCuts, HistogramCuts};
use super::{row_weights, validate_max_bins};
use crate::core::error::Result;
use crate::core::utils::threading::WorkerPool;
use crate::dataset::FeatureMatrix;
use rayon::prelude::*;

/// Builds cuts by streaming the row-major batches once.
///
/// Features are split into one contiguous block per worker. Every worker
/// scans all rows but only feeds the sketches of its own block, so each
/// sketch sees its values in row order whatever the worker count.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseCuts;

impl DenseCuts {
    pub fn new() -> Self {
        DenseCuts
    }

    pub fn build<M: FeatureMatrix + ?Sized>(
        &self,
        matrix: &M,
        max_bins: usize,
        pool: &WorkerPool,
    ) -> Result<HistogramCuts> {
        validate_max_bins(max_bins)?;
        let info = matrix.info();
        let weights = row_weights(info)?;
        let num_col = info.num_col;

        let mut sketches: Vec<_> = (0..num_col)
            .map(|_| FeatureCuts::sketch(info.num_row, max_bins))
            .collect();
        let nstep = num_col.div_ceil(pool.n_threads()).max(1);

        pool.install(|| {
            sketches
                .par_chunks_mut(nstep)
                .enumerate()
                .for_each(|(block, local)| {
                    let begin = block * nstep;
                    let end = begin + local.len();
                    for batch in matrix.row_batches() {
                        for (i, row) in batch.lines().enumerate() {
                            let w = weights
                                .as_ref()
                                .map_or(1.0, |w| f64::from(w[batch.base_rowid() + i]));
                            for entry in row {
                                let col = entry.index as usize;
                                if col >= begin && col < end {
                                    local[col - begin].push(entry.fvalue, w);
                                }
                            }
                        }
                    }
                });
        });

        let features: Vec<FeatureCuts> = pool.install(|| {
            sketches
                .par_iter()
                .map(|sketch| FeatureCuts::from_sketch(sketch, max_bins))
                .collect()
        });

        let mut cuts = HistogramCuts::new();
        for feature in features {
            cuts.push_feature(feature);
        }
        log::debug!(
            "Dense cuts built: {} features, {} bins",
            cuts.num_features(),
            cuts.total_bins()
        );
        Ok(cuts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::constants::MAX_BIN_LIMIT;
    use crate::dataset::DMatrix;

    #[test]
    fn test_dense_cuts_shape() {
        let values: Vec<f32> = (0..300).map(|i| ((i * 37) % 101) as f32).collect();
        let dmat = DMatrix::from_dense(&values, 100, 3, f32::NAN).unwrap();
        let pool = WorkerPool::new(2).unwrap();
        let cuts = DenseCuts::new().build(&dmat, 8, &pool).unwrap();
        assert_eq!(cuts.num_features(), 3);
        for f in 0..3 {
            assert_eq!(cuts.feature_bins(f), 8);
        }
    }

    #[test]
    fn test_dense_cuts_independent_of_workers() {
        let values: Vec<f32> = (0..2000).map(|i| ((i * 7919) % 997) as f32 * 0.1).collect();
        let dmat = DMatrix::from_dense(&values, 400, 5, f32::NAN).unwrap();
        let reference = DenseCuts::new()
            .build(&dmat, 16, &WorkerPool::single().unwrap())
            .unwrap();
        for n in [2, 3, 8] {
            let pool = WorkerPool::new(n).unwrap();
            assert_eq!(DenseCuts::new().build(&dmat, 16, &pool).unwrap(), reference);
        }
    }

    #[test]
    fn test_large_bin_budget_on_tiny_matrix() {
        let dmat = DMatrix::from_dense(&[3.0, -1.0], 2, 1, f32::NAN).unwrap();
        let pool = WorkerPool::single().unwrap();
        let cuts = DenseCuts::new().build(&dmat, MAX_BIN_LIMIT, &pool).unwrap();
        assert_eq!(cuts.feature_bins(0), 2);
        assert_eq!(cuts.values()[0], 3.0);
        assert!(DenseCuts::new().build(&dmat, MAX_BIN_LIMIT + 1, &pool).is_err());
    }

    #[test]
    fn test_zero_weight_rows_are_ignored() {
        let values = [1.0, 2.0, 3.0, 100.0];
        let mut dmat = DMatrix::from_dense(&values, 4, 1, f32::NAN).unwrap();
        dmat.set_weights(vec![1.0, 1.0, 1.0, 0.0]).unwrap();
        let cuts = DenseCuts::new()
            .build(&dmat, 16, &WorkerPool::single().unwrap())
            .unwrap();
        assert_eq!(cuts.values().len(), 3);
        assert!(*cuts.values().last().unwrap() < 100.0);
    }
}
