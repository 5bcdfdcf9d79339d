//! Compressed row/column pages of non-missing feature values.

use crate::core::error::{HistError, Result};

/// One non-missing value: the column index in a row-major page, the row
/// index in a column-major page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    /// Feature index (row-major) or row index (column-major)
    pub index: u32,
    /// Feature value
    pub fvalue: f32,
}

impl Entry {
    /// Creates a new entry.
    pub fn new(index: u32, fvalue: f32) -> Self {
        Entry { index, fvalue }
    }
}

/// CSR-style page: `offset[i]..offset[i + 1]` delimits the entries of line `i`.
///
/// In a row-major page a line is a row and `base_rowid` is the global id of
/// its first row. In a column-major page a line is a feature.
#[derive(Debug, Clone, PartialEq)]
pub struct SparsePage {
    offset: Vec<usize>,
    data: Vec<Entry>,
    base_rowid: usize,
}

impl Default for SparsePage {
    fn default() -> Self {
        SparsePage {
            offset: vec![0],
            data: Vec::new(),
            base_rowid: 0,
        }
    }
}

impl SparsePage {
    /// Creates an empty page whose first line has global id `base_rowid`.
    pub fn new(base_rowid: usize) -> Self {
        SparsePage {
            base_rowid,
            ..SparsePage::default()
        }
    }

    /// Builds a page from raw CSR arrays.
    pub fn from_parts(offset: Vec<usize>, data: Vec<Entry>, base_rowid: usize) -> Result<Self> {
        if offset.first() != Some(&0) {
            return Err(HistError::config("page offsets must start at 0"));
        }
        if offset.windows(2).any(|w| w[0] > w[1]) {
            return Err(HistError::config("page offsets must be non-decreasing"));
        }
        let last = offset[offset.len() - 1];
        if last != data.len() {
            return Err(HistError::dimension_mismatch(
                format!("{} entries", last),
                format!("{} entries", data.len()),
            ));
        }
        Ok(SparsePage {
            offset,
            data,
            base_rowid,
        })
    }

    /// Appends one line.
    pub fn push_line(&mut self, entries: &[Entry]) {
        self.data.extend_from_slice(entries);
        self.offset.push(self.data.len());
    }

    /// Number of lines.
    pub fn size(&self) -> usize {
        self.offset.len() - 1
    }

    /// True when the page holds no line.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Global id of the first line.
    pub fn base_rowid(&self) -> usize {
        self.base_rowid
    }

    /// Line offsets.
    pub fn offset(&self) -> &[usize] {
        &self.offset
    }

    /// Entries of line `i`.
    #[inline]
    pub fn line(&self, i: usize) -> &[Entry] {
        &self.data[self.offset[i]..self.offset[i + 1]]
    }

    /// Iterator over lines.
    pub fn lines(&self) -> impl Iterator<Item = &[Entry]> + '_ {
        (0..self.size()).map(move |i| self.line(i))
    }

    /// Number of entries per line.
    pub fn line_sizes(&self) -> Vec<usize> {
        self.offset.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Transposes row-major `batches` into a single column-major page with
    /// `num_col` lines. Entries of each column come out in ascending row order.
    pub fn column_major(batches: &[SparsePage], num_col: usize) -> Result<SparsePage> {
        let mut counts = vec![0usize; num_col + 1];
        for page in batches {
            for entry in &page.data {
                let col = entry.index as usize;
                if col >= num_col {
                    return Err(HistError::index_out_of_bounds(col, num_col));
                }
                counts[col + 1] += 1;
            }
        }
        for i in 0..num_col {
            counts[i + 1] += counts[i];
        }

        let mut cursor = counts.clone();
        let mut data = vec![Entry::new(0, 0.0); counts[num_col]];
        for page in batches {
            for (i, row) in page.lines().enumerate() {
                let rid = (page.base_rowid + i) as u32;
                for entry in row {
                    let col = entry.index as usize;
                    data[cursor[col]] = Entry::new(rid, entry.fvalue);
                    cursor[col] += 1;
                }
            }
        }

        Ok(SparsePage {
            offset: counts,
            data,
            base_rowid: 0,
        })
    }
}
