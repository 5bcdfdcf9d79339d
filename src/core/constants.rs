//! Constants controlling sketch accuracy, partition granularity and
//! default configuration values.

/// Default maximum number of bins per feature.
pub const DEFAULT_MAX_BIN: usize = 256;

/// Default number of rows per work block when partitioning row ranges.
pub const DEFAULT_BLOCK_SIZE: usize = 256;

/// Default number of bins per block when reducing histograms in parallel.
pub const DEFAULT_REDUCE_BLOCK_SIZE: usize = 1024;

/// Matrices with a smaller `nnz / (rows * cols)` ratio are cut column-wise.
pub const DEFAULT_SPARSE_THRESHOLD: f64 = 0.0005;

/// Sketch over-sampling factor: summaries keep `SKETCH_FACTOR * max_bins`
/// entries before the final prune to `max_bins + 1`.
pub const SKETCH_FACTOR: usize = 8;

/// Gap between the extreme observed values and the outermost cut points.
pub const CUT_EPS: f32 = 1e-5;

/// Upper bound on the number of bins a single feature may request.
pub const MAX_BIN_LIMIT: usize = 1 << 16;
