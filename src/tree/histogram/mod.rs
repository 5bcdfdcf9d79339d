//! Histogram construction: per-node storage, thread-local buffers and the
//! accumulation kernels.
//!
//! A round builds the gradient histograms of several tree nodes at once:
//! - [`HistCollection`] owns one row per node;
//! - [`ParallelGHistBuilder`] hands every worker private scratch rows and
//!   reduces them into the collection;
//! - [`GHistBuilder`] holds the accumulation and subtraction kernels;
//! - [`HistogramBuilder`] runs a whole round on a worker pool.

pub mod builder;
pub mod collection;
pub mod parallel;

pub use builder::{GHistBuilder, HistogramBuilder};
pub use collection::HistCollection;
pub use parallel::{ParallelGHistBuilder, ThreadHistBuffer};
