//! Core data types for the histogram core.
//!
//! Gradient pairs arrive per row in single precision; histogram bins
//! accumulate in double precision for numerical stability.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Global bin index type (feature offset already folded in).
pub type BinIndex = u32;

/// Tree node identifier type. Ids are not contiguous across rounds.
pub type NodeId = u32;

/// Histogram accumulation type.
pub type Hist = f64;

/// Gradient statistics of one training row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GradientPair {
    /// First-order gradient
    pub grad: f32,
    /// Second-order gradient
    pub hess: f32,
}

impl GradientPair {
    /// Creates a new gradient pair.
    pub fn new(grad: f32, hess: f32) -> Self {
        GradientPair { grad, hess }
    }
}

/// One histogram entry: summed gradient and hessian of the rows in a bin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GradStats {
    /// Sum of gradients
    pub grad: Hist,
    /// Sum of hessians
    pub hess: Hist,
}

impl GradStats {
    /// Creates a new entry from explicit sums.
    pub fn new(grad: Hist, hess: Hist) -> Self {
        GradStats { grad, hess }
    }

    /// Adds a gradient/hessian pair to this entry.
    #[inline]
    pub fn add_stats(&mut self, grad: Hist, hess: Hist) {
        self.grad += grad;
        self.hess += hess;
    }

    /// Adds the statistics of one row.
    #[inline]
    pub fn add_pair(&mut self, pair: GradientPair) {
        self.grad += pair.grad as Hist;
        self.hess += pair.hess as Hist;
    }

    /// Sum of gradients.
    pub fn grad(&self) -> Hist {
        self.grad
    }

    /// Sum of hessians.
    pub fn hess(&self) -> Hist {
        self.hess
    }

    /// True when both sums are exactly zero.
    pub fn is_zero(&self) -> bool {
        self.grad == 0.0 && self.hess == 0.0
    }
}

impl Add for GradStats {
    type Output = GradStats;

    fn add(self, rhs: GradStats) -> GradStats {
        GradStats::new(self.grad + rhs.grad, self.hess + rhs.hess)
    }
}

impl AddAssign for GradStats {
    fn add_assign(&mut self, rhs: GradStats) {
        self.grad += rhs.grad;
        self.hess += rhs.hess;
    }
}

impl Sub for GradStats {
    type Output = GradStats;

    fn sub(self, rhs: GradStats) -> GradStats {
        GradStats::new(self.grad - rhs.grad, self.hess - rhs.hess)
    }
}

impl SubAssign for GradStats {
    fn sub_assign(&mut self, rhs: GradStats) {
        self.grad -= rhs.grad;
        self.hess -= rhs.hess;
    }
}

impl From<GradientPair> for GradStats {
    fn from(pair: GradientPair) -> Self {
        GradStats::new(pair.grad as Hist, pair.hess as Hist)
    }
}

/// Histogram row of one tree node, addressed by global bin index.
pub type GHistRow = Vec<GradStats>;

/// Cut-building strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutStrategy {
    /// Pick by matrix density
    #[default]
    Auto,
    /// Row-major scan with one sketch per feature
    Dense,
    /// Column-major scan, feature ranges built independently
    Sparse,
}
