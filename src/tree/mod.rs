//! Tree-training support: gradient histograms over the bin matrix.
//!
//! Split finding and tree growth consume the rows of a
//! [`HistCollection`](histogram::HistCollection) and map bins back to
//! thresholds with [`HistogramCuts::bin_threshold`](crate::dataset::HistogramCuts::bin_threshold).

pub mod histogram;

pub use histogram::{
    GHistBuilder, HistCollection, HistogramBuilder, ParallelGHistBuilder, ThreadHistBuffer,
};
