//! Cut points: per-feature bin boundaries derived from quantile sketches.

use super::sketch::QuantileSketch;
use crate::core::constants::{CUT_EPS, SKETCH_FACTOR};
use crate::core::error::{HistError, Result};
use crate::core::types::BinIndex;
use serde::{Deserialize, Serialize};

/// Cut points of every feature.
///
/// `values[ptrs[f]..ptrs[f + 1]]` are the cuts of feature `f`, strictly
/// increasing. Each cut is the exclusive upper bound of its bin: local bin `b`
/// holds values `v` with `values[b - 1] <= v < values[b]`, and the last cut
/// lies above the feature maximum. `min_values[f]` lies strictly below the
/// feature minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCuts")]
pub struct HistogramCuts {
    ptrs: Vec<u32>,
    values: Vec<f32>,
    min_values: Vec<f32>,
}

/// Unchecked serialized form; deserialization goes through
/// [`HistogramCuts::from_parts`].
#[derive(Deserialize)]
struct RawCuts {
    ptrs: Vec<u32>,
    values: Vec<f32>,
    min_values: Vec<f32>,
}

impl TryFrom<RawCuts> for HistogramCuts {
    type Error = HistError;

    fn try_from(raw: RawCuts) -> Result<Self> {
        HistogramCuts::from_parts(raw.ptrs, raw.values, raw.min_values)
    }
}

static_assertions::assert_impl_all!(HistogramCuts: Send, Sync);

impl Default for HistogramCuts {
    fn default() -> Self {
        HistogramCuts {
            ptrs: vec![0],
            values: Vec::new(),
            min_values: Vec::new(),
        }
    }
}

impl HistogramCuts {
    /// Cuts for zero features.
    pub fn new() -> Self {
        HistogramCuts::default()
    }

    /// Assembles cuts from raw arrays, checking their shape and ordering.
    pub fn from_parts(ptrs: Vec<u32>, values: Vec<f32>, min_values: Vec<f32>) -> Result<Self> {
        if ptrs.first() != Some(&0) {
            return Err(HistError::config("cut pointers must start at 0"));
        }
        if ptrs[ptrs.len() - 1] as usize != values.len() {
            return Err(HistError::dimension_mismatch(
                format!("{} cut values", ptrs[ptrs.len() - 1]),
                format!("{} cut values", values.len()),
            ));
        }
        if min_values.len() != ptrs.len() - 1 {
            return Err(HistError::dimension_mismatch(
                format!("{} min values", ptrs.len() - 1),
                format!("{} min values", min_values.len()),
            ));
        }
        for (f, w) in ptrs.windows(2).enumerate() {
            if w[0] >= w[1] {
                return Err(HistError::invalid_parameter(
                    "ptrs",
                    format!("feature {}", f),
                    "every feature needs at least one cut",
                ));
            }
            let cuts = &values[w[0] as usize..w[1] as usize];
            if cuts.windows(2).any(|c| c[0] >= c[1]) || !(min_values[f] < cuts[0]) {
                return Err(HistError::invalid_parameter(
                    "values",
                    format!("feature {}", f),
                    "cuts must be strictly increasing and above the min value",
                ));
            }
        }
        Ok(HistogramCuts {
            ptrs,
            values,
            min_values,
        })
    }

    /// Prefix offsets into [`values`](Self::values), one per feature plus one.
    pub fn ptrs(&self) -> &[u32] {
        &self.ptrs
    }

    /// Cut values of all features, grouped by feature.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// One value per feature, strictly below its minimum.
    pub fn min_values(&self) -> &[f32] {
        &self.min_values
    }

    /// Number of features.
    pub fn num_features(&self) -> usize {
        self.ptrs.len() - 1
    }

    /// Total number of bins over all features.
    pub fn total_bins(&self) -> usize {
        self.values.len()
    }

    /// Number of bins of feature `f`.
    pub fn feature_bins(&self, f: usize) -> usize {
        (self.ptrs[f + 1] - self.ptrs[f]) as usize
    }

    /// Cut values of feature `f`.
    pub fn feature_cuts(&self, f: usize) -> &[f32] {
        &self.values[self.ptrs[f] as usize..self.ptrs[f + 1] as usize]
    }

    /// Local bin of `value` in feature `f`: the first cut strictly greater than
    /// `value`, clamped to the last bin.
    #[inline]
    pub fn search_bin(&self, value: f32, f: usize) -> BinIndex {
        let cuts = self.feature_cuts(f);
        let idx = cuts.partition_point(|&c| c <= value);
        idx.min(cuts.len().saturating_sub(1)) as BinIndex
    }

    /// Upper bound of global bin `bin`, the split threshold that sends the bin left.
    pub fn bin_threshold(&self, bin: usize) -> Result<f32> {
        self.values
            .get(bin)
            .copied()
            .ok_or_else(|| HistError::index_out_of_bounds(bin, self.values.len()))
    }

    /// Feature that owns global bin `bin`.
    pub fn feature_of_bin(&self, bin: usize) -> Result<usize> {
        if bin >= self.values.len() {
            return Err(HistError::index_out_of_bounds(bin, self.values.len()));
        }
        Ok(self.ptrs.partition_point(|&p| p as usize <= bin) - 1)
    }

    /// Largest number of bins of a single feature.
    pub fn max_bins_per_feature(&self) -> usize {
        self.ptrs
            .windows(2)
            .map(|w| (w[1] - w[0]) as usize)
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn push_feature(&mut self, feature: FeatureCuts) {
        self.min_values.push(feature.min_value);
        self.values.extend_from_slice(&feature.cuts);
        self.ptrs.push(self.values.len() as u32);
    }

    /// Appends the features of `other` after the features of `self`.
    pub(crate) fn extend(&mut self, other: HistogramCuts) {
        let base = self.values.len() as u32;
        self.ptrs.extend(other.ptrs[1..].iter().map(|&p| p + base));
        self.values.extend(other.values);
        self.min_values.extend(other.min_values);
    }
}

/// Cuts of a single feature before they are appended to a [`HistogramCuts`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FeatureCuts {
    pub(crate) min_value: f32,
    pub(crate) cuts: Vec<f32>,
}

impl FeatureCuts {
    /// Sketch sized for a feature with at most `num_row` values.
    pub(crate) fn sketch(num_row: usize, max_bins: usize) -> QuantileSketch {
        QuantileSketch::new(num_row, 1.0 / (max_bins * SKETCH_FACTOR) as f64)
    }

    /// Derives at most `max_bins` cuts from a filled sketch. An empty sketch
    /// yields a single cut above zero.
    pub(crate) fn from_sketch(sketch: &QuantileSketch, max_bins: usize) -> FeatureCuts {
        let summary = sketch
            .summary()
            .prune(max_bins * SKETCH_FACTOR)
            .prune(max_bins + 1);

        let eps = f64::from(CUT_EPS);
        let (min_value, max_value) = if summary.is_empty() {
            (-CUT_EPS, -CUT_EPS)
        } else {
            let first = f64::from(summary.value(0));
            (
                (first - (first.abs() + eps)) as f32,
                summary.value(summary.len() - 1),
            )
        };

        let required = summary.len().min(max_bins);
        let mut cuts = Vec::with_capacity(required + 1);
        for i in 1..required {
            let cpt = summary.value(i);
            if cuts.last().map_or(true, |&back| cpt > back) {
                cuts.push(cpt);
            }
        }
        let max_value = f64::from(max_value);
        cuts.push((max_value + (max_value.abs() + eps)) as f32);

        FeatureCuts { min_value, cuts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cuts() -> HistogramCuts {
        HistogramCuts::from_parts(
            vec![0, 3, 4, 6],
            vec![1.0, 2.0, 5.0, 0.5, -1.0, 10.0],
            vec![0.0, 0.0, -3.0],
        )
        .unwrap()
    }

    fn cuts_of(values: &[f32], max_bins: usize) -> FeatureCuts {
        let mut sketch = FeatureCuts::sketch(values.len(), max_bins);
        for &v in values {
            sketch.push(v, 1.0);
        }
        FeatureCuts::from_sketch(&sketch, max_bins)
    }

    #[test]
    fn test_accessors() {
        let cuts = sample_cuts();
        assert_eq!(cuts.num_features(), 3);
        assert_eq!(cuts.total_bins(), 6);
        assert_eq!(cuts.feature_bins(0), 3);
        assert_eq!(cuts.feature_cuts(2), &[-1.0, 10.0]);
        assert_eq!(cuts.max_bins_per_feature(), 3);
        assert_eq!(cuts.bin_threshold(4).unwrap(), -1.0);
        assert!(cuts.bin_threshold(6).unwrap_err().is_range_error());
        assert_eq!(cuts.feature_of_bin(0).unwrap(), 0);
        assert_eq!(cuts.feature_of_bin(3).unwrap(), 1);
        assert_eq!(cuts.feature_of_bin(5).unwrap(), 2);
        assert!(cuts.feature_of_bin(6).is_err());
    }

    #[test]
    fn test_search_bin_is_upper_bound() {
        let cuts = sample_cuts();
        assert_eq!(cuts.search_bin(0.5, 0), 0);
        assert_eq!(cuts.search_bin(1.0, 0), 1);
        assert_eq!(cuts.search_bin(1.5, 0), 1);
        assert_eq!(cuts.search_bin(2.0, 0), 2);
        // values at or past the last cut land in the last bin
        assert_eq!(cuts.search_bin(5.0, 0), 2);
        assert_eq!(cuts.search_bin(100.0, 0), 2);
        assert_eq!(cuts.search_bin(-2.0, 2), 0);
        assert_eq!(cuts.search_bin(7.0, 1), 0);
    }

    #[test]
    fn test_from_parts_validation() {
        assert!(HistogramCuts::from_parts(vec![0, 2], vec![2.0, 1.0], vec![0.0]).is_err());
        assert!(HistogramCuts::from_parts(vec![0, 1], vec![1.0], vec![1.0]).is_err());
        assert!(HistogramCuts::from_parts(vec![0, 0], vec![], vec![0.0]).is_err());
        assert!(HistogramCuts::from_parts(vec![0, 2], vec![1.0], vec![0.0]).is_err());
        assert!(HistogramCuts::from_parts(vec![0, 1], vec![1.0], vec![]).is_err());
        assert_eq!(HistogramCuts::new().num_features(), 0);
    }

    #[test]
    fn test_extend_rebases_offsets() {
        let mut left = HistogramCuts::from_parts(vec![0, 2], vec![1.0, 2.0], vec![0.0]).unwrap();
        let right = HistogramCuts::from_parts(vec![0, 1, 3], vec![5.0, 1.0, 2.0], vec![0.0, 0.0])
            .unwrap();
        left.extend(right);
        assert_eq!(left.ptrs(), &[0, 2, 3, 5]);
        assert_eq!(left.values(), &[1.0, 2.0, 5.0, 1.0, 2.0]);
        assert_eq!(left.min_values().len(), 3);
    }

    #[test]
    fn test_distinct_values_get_own_bins() {
        let values = [3.0, 1.0, 2.0, 2.0, 3.0, 1.0, 4.0];
        let feature = cuts_of(&values, 16);
        assert_eq!(feature.cuts.len(), 4);
        assert_eq!(&feature.cuts[..3], &[2.0, 3.0, 4.0]);
        assert!(feature.cuts[3] > 4.0);
        assert!(feature.min_value < 1.0);
    }

    #[test]
    fn test_single_value_and_empty_feature() {
        let feature = cuts_of(&[-7.0; 20], 16);
        assert_eq!(feature.cuts.len(), 1);
        assert!(feature.min_value < -7.0);
        assert!(feature.cuts[0] > -7.0);

        let empty = FeatureCuts::from_sketch(&FeatureCuts::sketch(10, 16), 16);
        assert_eq!(empty.min_value, -CUT_EPS);
        assert_eq!(empty.cuts.len(), 1);
        assert!((empty.cuts[0] - CUT_EPS).abs() < 1e-9);
    }

    #[test]
    fn test_bin_budget_respected() {
        let values: Vec<f32> = (0..1000).map(|i| i as f32 * 0.5).collect();
        for max_bins in [1, 2, 16, 256] {
            let feature = cuts_of(&values, max_bins);
            assert_eq!(feature.cuts.len(), max_bins);
            assert!(feature.cuts.windows(2).all(|w| w[0] < w[1]));
            assert!(*feature.cuts.last().unwrap() > 499.5);
        }
    }

    #[test]
    fn test_serde_roundtrip_through_toml() {
        let cuts = sample_cuts();
        let text = toml::to_string(&cuts).unwrap();
        let back: HistogramCuts = toml::from_str(&text).unwrap();
        assert_eq!(back, cuts);
    }

    #[test]
    fn test_deserialize_validates() {
        let empty = "ptrs = []\nvalues = []\nmin_values = []\n";
        assert!(toml::from_str::<HistogramCuts>(empty).is_err());

        let unordered = "ptrs = [0, 2]\nvalues = [3.0, 1.0]\nmin_values = [0.0]\n";
        assert!(toml::from_str::<HistogramCuts>(unordered).is_err());
    }

    #[test]
    fn test_extreme_finite_values_keep_invariants() {
        let feature = cuts_of(&[f32::MAX, 1.0, 2.0, -f32::MAX], 16);
        assert!(feature.min_value < -f32::MAX);
        assert!(*feature.cuts.last().unwrap() > f32::MAX);
        let cuts = HistogramCuts::from_parts(
            vec![0, feature.cuts.len() as u32],
            feature.cuts.clone(),
            vec![feature.min_value],
        )
        .unwrap();
        assert_eq!(cuts.search_bin(f32::MAX, 0) as usize, feature.cuts.len() - 1);
    }
}
