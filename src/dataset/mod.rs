//! Feature matrix interface and the in-memory matrix used by the binning code.
//!
//! Cut building and bin-matrix construction only read through
//! [`FeatureMatrix`]: row-major batches of non-missing entries, a
//! column-major view over all rows, and the [`MetaInfo`] that describes
//! shape, query groups and row weights.

pub mod binning;
pub mod page;

pub use binning::{
    search_group_ind_from_row, CutsBuilder, DenseCuts, GHistIndexMatrix, HistogramCuts,
    SparseCuts,
};
pub use page::{Entry, SparsePage};

use crate::core::error::{HistError, Result};
use ndarray::ArrayView2;
use std::sync::OnceLock;

/// Shape and side information of a feature matrix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaInfo {
    /// Number of rows
    pub num_row: usize,
    /// Number of features
    pub num_col: usize,
    /// Number of non-missing entries
    pub num_nonzero: usize,
    /// Query group boundaries: group `g` holds rows `group_ptr[g]..group_ptr[g + 1]`
    pub group_ptr: Vec<usize>,
    /// Per-row weights, or per-group weights when `group_ptr` is set
    pub weights: Vec<f32>,
}

impl MetaInfo {
    /// Weight at `i`; 1.0 when no weights are set.
    pub fn get_weight(&self, i: usize) -> f32 {
        if self.weights.is_empty() {
            1.0
        } else {
            self.weights[i]
        }
    }

    /// Number of query groups (0 without groups).
    pub fn num_groups(&self) -> usize {
        self.group_ptr.len().saturating_sub(1)
    }

    /// True when weights are indexed by group instead of by row.
    pub fn uses_group_weights(&self) -> bool {
        !self.group_ptr.is_empty() && self.weights.len() == self.num_groups()
    }

    /// Fraction of entries that are present.
    pub fn density(&self) -> f64 {
        let cells = self.num_row * self.num_col;
        if cells == 0 {
            0.0
        } else {
            self.num_nonzero as f64 / cells as f64
        }
    }
}

/// Read-only access to a feature matrix. Missing values are absent entries.
pub trait FeatureMatrix: Sync {
    /// Shape and side information.
    fn info(&self) -> &MetaInfo;

    /// Row-major batches in row order; batch `k` starts at its `base_rowid`.
    fn row_batches(&self) -> &[SparsePage];

    /// Column-major page over all rows; entry indices are global row ids.
    fn column_page(&self) -> Result<&SparsePage>;
}

/// In-memory feature matrix split into one or more row batches.
#[derive(Debug)]
pub struct DMatrix {
    info: MetaInfo,
    pages: Vec<SparsePage>,
    column_page: OnceLock<SparsePage>,
}

impl DMatrix {
    /// Builds a matrix from row-major dense values. NaN and `missing` are
    /// treated as absent; any other infinite value is rejected.
    pub fn from_dense(values: &[f32], num_row: usize, num_col: usize, missing: f32) -> Result<Self> {
        if values.len() != num_row * num_col {
            return Err(HistError::dimension_mismatch(
                format!("{} values ({} x {})", num_row * num_col, num_row, num_col),
                format!("{} values", values.len()),
            ));
        }
        let mut page = SparsePage::new(0);
        let mut row = Vec::with_capacity(num_col);
        for chunk in values.chunks(num_col.max(1)).take(num_row) {
            row.clear();
            row.extend(
                chunk
                    .iter()
                    .enumerate()
                    .filter(|(_, &v)| !is_missing(v, missing))
                    .map(|(j, &v)| Entry::new(j as u32, v)),
            );
            page.push_line(&row);
        }
        if num_col == 0 {
            for _ in 0..num_row {
                page.push_line(&[]);
            }
        }
        Self::from_pages(vec![page], num_col)
    }

    /// Builds a matrix from a 2-D array view (rows x features).
    pub fn from_array(array: ArrayView2<'_, f32>, missing: f32) -> Result<Self> {
        let (num_row, num_col) = array.dim();
        let mut page = SparsePage::new(0);
        let mut row = Vec::with_capacity(num_col);
        for lane in array.outer_iter() {
            row.clear();
            row.extend(
                lane.iter()
                    .enumerate()
                    .filter(|(_, &v)| !is_missing(v, missing))
                    .map(|(j, &v)| Entry::new(j as u32, v)),
            );
            page.push_line(&row);
        }
        debug_assert_eq!(page.size(), num_row);
        Self::from_pages(vec![page], num_col)
    }

    /// Wraps existing row-major pages. Pages must be contiguous in row order,
    /// every feature index must be below `num_col` and every stored value must
    /// be finite.
    pub fn from_pages(pages: Vec<SparsePage>, num_col: usize) -> Result<Self> {
        let mut num_row = 0;
        let mut num_nonzero = 0;
        for page in &pages {
            if page.base_rowid() != num_row {
                return Err(HistError::dimension_mismatch(
                    format!("page starting at row {}", num_row),
                    format!("page starting at row {}", page.base_rowid()),
                ));
            }
            for line in page.lines() {
                if let Some(bad) = line.iter().find(|e| e.index as usize >= num_col) {
                    return Err(HistError::index_out_of_bounds(bad.index as usize, num_col));
                }
                if let Some(bad) = line.iter().find(|e| !e.fvalue.is_finite()) {
                    return Err(HistError::invalid_parameter(
                        "fvalue",
                        format!("{} (feature {})", bad.fvalue, bad.index),
                        "present values must be finite; use NaN or `missing` for absent ones",
                    ));
                }
            }
            num_row += page.size();
            num_nonzero += page.nnz();
        }
        Ok(DMatrix {
            info: MetaInfo {
                num_row,
                num_col,
                num_nonzero,
                ..MetaInfo::default()
            },
            pages,
            column_page: OnceLock::new(),
        })
    }

    /// Re-splits the rows into pages of at most `rows_per_page` rows.
    pub fn with_batch_size(self, rows_per_page: usize) -> Result<Self> {
        if rows_per_page == 0 {
            return Err(HistError::invalid_parameter(
                "rows_per_page",
                "0",
                "must be positive",
            ));
        }
        let mut pages = Vec::new();
        let mut current = SparsePage::new(0);
        let mut next_row = 0;
        for page in &self.pages {
            for line in page.lines() {
                if current.size() == rows_per_page {
                    pages.push(std::mem::replace(&mut current, SparsePage::new(next_row)));
                }
                current.push_line(line);
                next_row += 1;
            }
        }
        if !current.is_empty() || pages.is_empty() {
            pages.push(current);
        }
        log::debug!(
            "Split {} rows into {} pages of at most {} rows",
            self.info.num_row,
            pages.len(),
            rows_per_page
        );
        Ok(DMatrix {
            info: self.info,
            pages,
            column_page: OnceLock::new(),
        })
    }

    /// Sets query groups from group sizes; sizes must sum to the row count.
    pub fn set_groups(&mut self, sizes: &[usize]) -> Result<()> {
        let total: usize = sizes.iter().sum();
        if total != self.info.num_row {
            return Err(HistError::dimension_mismatch(
                format!("group sizes summing to {}", self.info.num_row),
                format!("group sizes summing to {}", total),
            ));
        }
        let mut group_ptr = Vec::with_capacity(sizes.len() + 1);
        group_ptr.push(0);
        for &size in sizes {
            let last = group_ptr[group_ptr.len() - 1];
            group_ptr.push(last + size);
        }
        self.info.group_ptr = group_ptr;
        Ok(())
    }

    /// Sets one weight per row, or one per group when groups are set.
    pub fn set_weights(&mut self, weights: Vec<f32>) -> Result<()> {
        let n_groups = self.info.num_groups();
        if weights.len() != self.info.num_row && (n_groups == 0 || weights.len() != n_groups) {
            return Err(HistError::dimension_mismatch(
                format!("{} row weights or {} group weights", self.info.num_row, n_groups),
                format!("{} weights", weights.len()),
            ));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(HistError::invalid_parameter(
                "weights",
                w.to_string(),
                "must be finite and non-negative",
            ));
        }
        self.info.weights = weights;
        Ok(())
    }

    /// Number of row batches.
    pub fn num_batches(&self) -> usize {
        self.pages.len()
    }
}

impl FeatureMatrix for DMatrix {
    fn info(&self) -> &MetaInfo {
        &self.info
    }

    fn row_batches(&self) -> &[SparsePage] {
        &self.pages
    }

    fn column_page(&self) -> Result<&SparsePage> {
        if let Some(page) = self.column_page.get() {
            return Ok(page);
        }
        let page = SparsePage::column_major(&self.pages, self.info.num_col)?;
        Ok(self.column_page.get_or_init(|| page))
    }
}

#[inline]
fn is_missing(value: f32, missing: f32) -> bool {
    value.is_nan() || value == missing
}
