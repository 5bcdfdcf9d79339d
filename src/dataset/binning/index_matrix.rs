//! Bin-index matrix: every present feature value replaced by its global bin.

use super::cuts::HistogramCuts;
use super::CutsBuilder;
use crate::config::HistConfig;
use crate::core::error::{HistError, Result};
use crate::core::types::BinIndex;
use crate::core::utils::threading::{parallel_for_2d_with, BlockedSpace2d, WorkerPool};
use crate::dataset::{FeatureMatrix, SparsePage};
use num_traits::{AsPrimitive, NumCast, PrimInt};

/// Integer type a bin can be stored in.
pub trait BinType: PrimInt + AsPrimitive<usize> + Send + Sync + 'static {}

impl<T> BinType for T where T: PrimInt + AsPrimitive<usize> + Send + Sync + 'static {}

#[derive(Debug, Clone, PartialEq)]
enum BinStorage {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

/// Borrowed view of the stored bins, one variant per storage width.
///
/// Dense matrices store feature-local bins (add the feature offset to get the
/// global bin); sparse matrices store global bins.
#[derive(Debug, Clone, Copy)]
pub enum BinIndexView<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
}

/// Quantised feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct GHistIndexMatrix {
    cut: HistogramCuts,
    row_ptr: Vec<usize>,
    index: BinStorage,
    hit_count: Vec<usize>,
    is_dense: bool,
    max_num_bins_per_feat: usize,
}

static_assertions::assert_impl_all!(GHistIndexMatrix: Send, Sync);

struct FillState<'a, T> {
    /// Position of `index[0]` in the full index
    offset: usize,
    index: &'a mut [T],
    hits: Vec<usize>,
}

impl GHistIndexMatrix {
    /// Builds cuts with the strategy selected by `config`, then quantises `matrix`.
    pub fn init<M: FeatureMatrix + ?Sized>(
        matrix: &M,
        config: &HistConfig,
        pool: &WorkerPool,
    ) -> Result<Self> {
        config.validate()?;
        let cuts = CutsBuilder::select(matrix.info(), config).build(matrix, config.max_bins, pool)?;
        Self::init_with_cuts(matrix, cuts, config, pool)
    }

    /// Quantises `matrix` with previously built `cuts`.
    pub fn init_with_cuts<M: FeatureMatrix + ?Sized>(
        matrix: &M,
        cuts: HistogramCuts,
        config: &HistConfig,
        pool: &WorkerPool,
    ) -> Result<Self> {
        config.validate()?;
        let info = matrix.info();
        if cuts.num_features() != info.num_col {
            return Err(HistError::dimension_mismatch(
                format!("cuts for {} features", info.num_col),
                format!("cuts for {} features", cuts.num_features()),
            ));
        }
        let batches = matrix.row_batches();

        let mut row_ptr = Vec::with_capacity(info.num_row + 1);
        row_ptr.push(0);
        let mut is_dense = info.num_col > 0;
        for batch in batches {
            for size in batch.line_sizes() {
                is_dense &= size == info.num_col;
                let last = row_ptr[row_ptr.len() - 1];
                row_ptr.push(last + size);
            }
        }
        let num_rows = row_ptr.len() - 1;
        let nnz = row_ptr[num_rows];
        let max_num_bins_per_feat = cuts.max_bins_per_feature();

        let space = BlockedSpace2d::new(batches.len(), |b| batches[b].size(), config.block_size)?;

        let (index, hit_count) = if is_dense && max_num_bins_per_feat <= 1 << 8 {
            let (bins, hits) = fill_index::<u8>(batches, &cuts, &row_ptr, true, &space, pool);
            (BinStorage::U8(bins), hits)
        } else if is_dense && max_num_bins_per_feat <= 1 << 16 {
            let (bins, hits) = fill_index::<u16>(batches, &cuts, &row_ptr, true, &space, pool);
            (BinStorage::U16(bins), hits)
        } else {
            let (bins, hits) =
                fill_index::<u32>(batches, &cuts, &row_ptr, is_dense, &space, pool);
            (BinStorage::U32(bins), hits)
        };

        let gmat = GHistIndexMatrix {
            cut: cuts,
            row_ptr,
            index,
            hit_count,
            is_dense,
            max_num_bins_per_feat,
        };
        log::info!(
            "Built bin matrix: {} rows, {} entries, {} bins, {}-byte {} storage",
            num_rows,
            nnz,
            gmat.cut.total_bins(),
            gmat.bin_type_size(),
            if is_dense { "dense" } else { "sparse" }
        );
        Ok(gmat)
    }

    /// Cut points the matrix was quantised with.
    pub fn cut(&self) -> &HistogramCuts {
        &self.cut
    }

    /// Row offsets into the bin storage (`num_rows + 1` entries).
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// Raw stored bins.
    pub fn index(&self) -> BinIndexView<'_> {
        match &self.index {
            BinStorage::U8(v) => BinIndexView::U8(v),
            BinStorage::U16(v) => BinIndexView::U16(v),
            BinStorage::U32(v) => BinIndexView::U32(v),
        }
    }

    /// Feature offsets to add to stored bins, `Some` only for dense storage.
    pub fn offsets(&self) -> Option<&[u32]> {
        if self.is_dense {
            Some(&self.cut.ptrs()[..self.cut.num_features()])
        } else {
            None
        }
    }

    pub fn num_rows(&self) -> usize {
        self.row_ptr.len() - 1
    }

    /// True when every row holds every feature.
    pub fn is_dense(&self) -> bool {
        self.is_dense
    }

    /// Bytes per stored bin.
    pub fn bin_type_size(&self) -> usize {
        match self.index {
            BinStorage::U8(_) => 1,
            BinStorage::U16(_) => 2,
            BinStorage::U32(_) => 4,
        }
    }

    /// Number of rows falling into each global bin.
    pub fn hit_count(&self) -> &[usize] {
        &self.hit_count
    }

    pub fn max_num_bins_per_feat(&self) -> usize {
        self.max_num_bins_per_feat
    }

    /// Global bins of row `r`.
    pub fn row(&self, r: usize) -> RowBins<'_> {
        let (begin, end) = (self.row_ptr[r], self.row_ptr[r + 1]);
        let bins = match &self.index {
            BinStorage::U8(v) => BinIndexView::U8(&v[begin..end]),
            BinStorage::U16(v) => BinIndexView::U16(&v[begin..end]),
            BinStorage::U32(v) => BinIndexView::U32(&v[begin..end]),
        };
        RowBins {
            bins,
            offsets: self.offsets(),
            pos: 0,
            len: end - begin,
        }
    }
}

/// Iterator over the global bins of one row.
#[derive(Debug, Clone)]
pub struct RowBins<'a> {
    bins: BinIndexView<'a>,
    offsets: Option<&'a [u32]>,
    pos: usize,
    len: usize,
}

impl Iterator for RowBins<'_> {
    type Item = BinIndex;

    fn next(&mut self) -> Option<BinIndex> {
        if self.pos == self.len {
            return None;
        }
        let raw = match self.bins {
            BinIndexView::U8(v) => <u32 as From<u8>>::from(v[self.pos]),
            BinIndexView::U16(v) => <u32 as From<u16>>::from(v[self.pos]),
            BinIndexView::U32(v) => v[self.pos],
        };
        let bin = match self.offsets {
            Some(offsets) => raw + offsets[self.pos],
            None => raw,
        };
        self.pos += 1;
        Some(bin)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.len - self.pos;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for RowBins<'_> {}

/// Quantises all rows into a `T` index. Dense storage writes the local bin
/// of feature `f` at row position `f`; sparse storage writes global bins in
/// entry order.
fn fill_index<T: BinType>(
    batches: &[SparsePage],
    cuts: &HistogramCuts,
    row_ptr: &[usize],
    dense: bool,
    space: &BlockedSpace2d,
    pool: &WorkerPool,
) -> (Vec<T>, Vec<usize>) {
    let nnz = row_ptr[row_ptr.len() - 1];
    let total_bins = cuts.total_bins();
    let n_threads = pool.n_threads();
    let mut index = vec![T::zero(); nnz];

    let row_of = |block: usize, at_end: bool| {
        let range = space.get_range(block);
        let base = batches[space.first_dimension(block)].base_rowid();
        if at_end {
            base + range.end()
        } else {
            base + range.begin()
        }
    };

    // Each worker's blocks cover a contiguous run of rows, hence a
    // contiguous run of the index.
    let mut states: Vec<FillState<'_, T>> = Vec::with_capacity(n_threads);
    let mut rest: &mut [T] = &mut index;
    let mut consumed = 0;
    for tid in 0..n_threads {
        let blocks = space.thread_blocks(tid, n_threads);
        let (begin, end) = if blocks.is_empty() {
            (consumed, consumed)
        } else {
            (row_ptr[row_of(blocks.start, false)], row_ptr[row_of(blocks.end - 1, true)])
        };
        let (mine, tail) = std::mem::take(&mut rest).split_at_mut(end - consumed);
        rest = tail;
        states.push(FillState {
            offset: begin,
            index: &mut mine[begin - consumed..],
            hits: Vec::new(),
        });
        consumed = end;
    }

    let ptrs = cuts.ptrs();
    parallel_for_2d_with(space, pool, &mut states, |state, batch_idx, range| {
        if state.hits.is_empty() {
            state.hits = vec![0; total_bins];
        }
        let batch = &batches[batch_idx];
        for i in range.iter() {
            let rid = batch.base_rowid() + i;
            let begin = row_ptr[rid] - state.offset;
            let out = &mut state.index[begin..begin + (row_ptr[rid + 1] - row_ptr[rid])];
            for (j, entry) in batch.line(i).iter().enumerate() {
                let f = entry.index as usize;
                let local = cuts.search_bin(entry.fvalue, f);
                let global = ptrs[f] + local;
                let (pos, stored) = if dense { (f, local) } else { (j, global) };
                out[pos] = <T as NumCast>::from(stored).unwrap_or_else(T::max_value);
                state.hits[global as usize] += 1;
            }
        }
    });

    let mut hit_count = vec![0usize; total_bins];
    for state in &states {
        for (acc, &h) in hit_count.iter_mut().zip(&state.hits) {
            *acc += h;
        }
    }
    drop(states);
    (index, hit_count)
}
