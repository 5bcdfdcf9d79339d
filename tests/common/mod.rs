//! Common test utilities for gbdt-hist integration tests.

#![allow(dead_code)]

use gbdt_hist::*;
use ndarray::Array2;
use rand::prelude::*;

/// Uniform random features in `[-10, 10)`, row-major.
pub fn generate_random(num_rows: usize, num_cols: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..num_rows * num_cols)
        .map(|_| rng.gen_range(-10.0..10.0))
        .collect()
}

/// Same as [`generate_random`], with each value replaced by NaN with
/// probability `sparsity`.
pub fn generate_random_sparse(num_rows: usize, num_cols: usize, sparsity: f64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut values = generate_random(num_rows, num_cols);
    for v in values.iter_mut() {
        if rng.gen_bool(sparsity) {
            *v = f32::NAN;
        }
    }
    values
}

/// One column of integer categories `0..num_categories`, each present at
/// least once.
pub fn generate_random_categorical_single_column(n: usize, num_categories: usize) -> Vec<f32> {
    assert!(n >= num_categories);
    let mut rng = StdRng::seed_from_u64(123);
    let mut values: Vec<f32> = (0..n)
        .map(|i| {
            if i < num_categories {
                i as f32
            } else {
                rng.gen_range(0..num_categories) as f32
            }
        })
        .collect();
    values.shuffle(&mut rng);
    values
}

/// Gradient pairs with positive hessians.
pub fn generate_gpairs(n: usize) -> Vec<GradientPair> {
    let mut rng = StdRng::seed_from_u64(99);
    (0..n)
        .map(|_| GradientPair::new(rng.gen_range(-1.0..1.0), rng.gen_range(0.1..1.0)))
        .collect()
}

pub fn dmatrix_from_data(values: &[f32], num_rows: usize, num_cols: usize) -> DMatrix {
    DMatrix::from_dense(values, num_rows, num_cols, f32::NAN).unwrap()
}

/// Matrix split into pages of `rows_per_page` rows.
pub fn paged_dmatrix(
    values: &[f32],
    num_rows: usize,
    num_cols: usize,
    rows_per_page: usize,
) -> DMatrix {
    dmatrix_from_data(values, num_rows, num_cols)
        .with_batch_size(rows_per_page)
        .unwrap()
}

pub fn to_array(values: &[f32], num_rows: usize, num_cols: usize) -> Array2<f32> {
    Array2::from_shape_vec((num_rows, num_cols), values.to_vec()).unwrap()
}

pub fn config(max_bins: usize, n_threads: usize) -> HistConfig {
    HistConfigBuilder::new()
        .max_bins(max_bins)
        .n_threads(n_threads)
        .build()
        .unwrap()
}

/// Column `col` of a row-major matrix, missing values dropped, sorted.
pub fn sorted_column(values: &[f32], num_cols: usize, col: usize) -> Vec<f32> {
    let mut column: Vec<f32> = values
        .iter()
        .skip(col)
        .step_by(num_cols)
        .copied()
        .filter(|v| !v.is_nan())
        .collect();
    column.sort_by(|a, b| a.partial_cmp(b).unwrap());
    column
}

/// Checks the cuts of one feature against its sorted values: endpoints
/// enclose the data, cuts increase, low-cardinality features get one cut
/// per distinct value, and otherwise every cut but the last sits within
/// `max(2, 5% of n)` ranks of its ideal quantile.
pub fn validate_column(cuts: &HistogramCuts, f: usize, sorted: &[f32], num_bins: usize) {
    let feature_cuts = cuts.feature_cuts(f);
    assert!(!feature_cuts.is_empty(), "feature {} has no cuts", f);
    assert!(
        feature_cuts.windows(2).all(|w| w[0] < w[1]),
        "cuts of feature {} are not increasing",
        f
    );
    if sorted.is_empty() {
        assert_eq!(feature_cuts.len(), 1);
        return;
    }

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    assert!(cuts.min_values()[f] < min);
    assert!(*feature_cuts.last().unwrap() > max);

    let mut unique = sorted.to_vec();
    unique.dedup();
    if unique.len() <= num_bins {
        assert_eq!(feature_cuts.len(), unique.len());
        return;
    }

    assert_eq!(feature_cuts.len(), num_bins);
    let n = sorted.len();
    let acceptable = (n as f64 * 0.05).max(2.0);
    for (i, &cut) in feature_cuts[..feature_cuts.len() - 1].iter().enumerate() {
        let expected = ((i + 1) * n / feature_cuts.len()) as f64;
        let actual = sorted.partition_point(|&v| v < cut) as f64;
        assert!(
            (expected - actual).abs() <= acceptable,
            "feature {} cut {}: rank {} expected {} +/- {}",
            f,
            i,
            actual,
            expected,
            acceptable
        );
    }
}

/// [`validate_column`] for every feature of a row-major matrix.
pub fn validate_cuts(cuts: &HistogramCuts, values: &[f32], num_cols: usize, num_bins: usize) {
    assert_eq!(cuts.num_features(), num_cols);
    for f in 0..num_cols {
        validate_column(cuts, f, &sorted_column(values, num_cols, f), num_bins);
    }
}

/// Histogram of `rows` computed one row at a time.
pub fn naive_histogram(
    gmat: &GHistIndexMatrix,
    gpair: &[GradientPair],
    rows: &[usize],
) -> Vec<GradStats> {
    let mut hist = vec![GradStats::default(); gmat.cut().total_bins()];
    for &r in rows {
        for bin in gmat.row(r) {
            hist[bin as usize].add_pair(gpair[r]);
        }
    }
    hist
}
