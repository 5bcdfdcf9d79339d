//! # gbdt-hist
//!
//! Quantile binning and parallel gradient histograms, the hot core of
//! histogram-based gradient-boosted-tree training.
//!
//! ## Features
//!
//! - **Quantile cuts**: weighted quantile sketches turn every feature into at
//!   most `max_bins` bins. Low-cardinality features get one bin per distinct
//!   value.
//! - **Dense and sparse strategies**: row-scanning and column-scanning cut
//!   builders that produce identical cuts.
//! - **Compact bin matrix**: dense matrices store bins in the narrowest
//!   integer type that fits.
//! - **Lock-free parallel histograms**: workers accumulate into private
//!   scratch rows chosen before dispatch, then reduce in parallel. Results do
//!   not depend on the number of workers beyond floating-point rounding.
//!
//! ## Quick Start
//!
//! ```rust
//! use gbdt_hist::{
//!     DMatrix, GHistIndexMatrix, GradientPair, HistCollection, HistConfigBuilder,
//!     HistogramBuilder, NodeId,
//! };
//!
//! # fn main() -> gbdt_hist::Result<()> {
//! let values: Vec<f32> = (0..400).map(|i| (i % 37) as f32).collect();
//! let dmat = DMatrix::from_dense(&values, 100, 4, f32::NAN)?;
//!
//! let config = HistConfigBuilder::new().max_bins(16).n_threads(2).build()?;
//! let mut builder = HistogramBuilder::new(config.clone())?;
//! let gmat = GHistIndexMatrix::init(&dmat, &config, builder.pool())?;
//!
//! let gpair = vec![GradientPair::new(0.5, 1.0); 100];
//! let rows: Vec<usize> = (0..100).collect();
//! let nodes: Vec<(NodeId, &[usize])> = vec![(0, rows.as_slice())];
//! let mut collection = HistCollection::new();
//! builder.build_histograms(&gmat, &gpair, &nodes, &mut collection)?;
//!
//! let hess: f64 = collection[0].iter().map(|bin| bin.hess()).sum();
//! assert_eq!(hess, 400.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: types, constants, errors and the work partitioner
//! - [`config`]: [`HistConfig`] and its builder
//! - [`dataset`]: the feature-matrix interface, cut builders and the bin matrix
//! - [`tree`]: histogram storage, thread-local buffers and kernels

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

pub mod config;
pub mod core;
pub mod dataset;
pub mod tree;

pub use crate::core::{
    constants::*,
    error::{HistError, Result},
    init_logging,
    types::*,
    utils::threading::{
        parallel_for_2d, parallel_for_2d_indexed, parallel_for_2d_with, BlockedSpace2d, Range1d,
        Threading, WorkerPool,
    },
};

pub use config::{HistConfig, HistConfigBuilder};

pub use dataset::{
    binning::{
        search_group_ind_from_row, CutsBuilder, DenseCuts, GHistIndexMatrix, HistogramCuts,
        QuantileSketch, SparseCuts, WQSummary,
    },
    DMatrix, Entry, FeatureMatrix, MetaInfo, SparsePage,
};

pub use tree::histogram::{
    GHistBuilder, HistCollection, HistogramBuilder, ParallelGHistBuilder, ThreadHistBuffer,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
