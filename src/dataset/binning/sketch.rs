//! Weighted quantile sketch (Greenwald-Khanna style summaries with
//! multi-level merge-and-prune).
//!
//! A [`WQSummary`] is a sorted list of distinct values, each carrying bounds
//! on its weighted rank. [`QuantileSketch`] buffers incoming values, turns
//! full buffers into summaries and merges them level by level so that memory
//! stays `O(log(n) / eps)`. Summaries are exact while the number of distinct
//! values fits into a single level.

use std::cmp::Ordering;

/// One summary entry: `value` with rank bounds `[rmin, rmax]` and its own weight `wmin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryEntry {
    /// Minimum rank
    pub rmin: f64,
    /// Maximum rank
    pub rmax: f64,
    /// Weight of the value itself
    pub wmin: f64,
    /// The value
    pub value: f32,
}

impl SummaryEntry {
    fn new(rmin: f64, rmax: f64, wmin: f64, value: f32) -> Self {
        SummaryEntry {
            rmin,
            rmax,
            wmin,
            value,
        }
    }

    #[inline]
    fn rmin_next(&self) -> f64 {
        self.rmin + self.wmin
    }

    #[inline]
    fn rmax_prev(&self) -> f64 {
        self.rmax - self.wmin
    }
}

/// Sorted summary of a weighted value stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WQSummary {
    entries: Vec<SummaryEntry>,
}

impl WQSummary {
    /// Empty summary.
    pub fn new() -> Self {
        WQSummary::default()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the summary has no entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in increasing value order.
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    /// Value of entry `i`.
    pub fn value(&self, i: usize) -> f32 {
        self.entries[i].value
    }

    /// Builds an exact summary from `(value, weight)` pairs; equal values are merged.
    fn from_weighted(queue: &mut [(f32, f64)]) -> WQSummary {
        queue.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        let mut entries = Vec::with_capacity(queue.len());
        let mut wsum = 0.0;
        let mut i = 0;
        while i < queue.len() {
            let value = queue[i].0;
            let mut w = queue[i].1;
            let mut j = i + 1;
            while j < queue.len() && queue[j].0 == value {
                w += queue[j].1;
                j += 1;
            }
            entries.push(SummaryEntry::new(wsum, wsum + w, w, value));
            wsum += w;
            i = j;
        }
        WQSummary { entries }
    }

    /// Returns a summary of at most `max_size` entries approximating `self`.
    /// The first and last entries are always kept.
    pub fn prune(&self, max_size: usize) -> WQSummary {
        let src = &self.entries;
        if src.len() <= max_size {
            return self.clone();
        }
        if max_size < 2 {
            return WQSummary {
                entries: src.iter().take(max_size).copied().collect(),
            };
        }

        let last = src.len() - 1;
        let begin = src[0].rmax;
        let range = src[last].rmin - src[0].rmax;
        let n = (max_size - 1) as f64;

        let mut out = Vec::with_capacity(max_size);
        out.push(src[0]);
        let mut i = 1;
        let mut last_idx = 0;
        for k in 1..max_size - 1 {
            let dx2 = 2.0 * ((k as f64 * range) / n + begin);
            // first i such that dx2 < rmax[i + 1] + rmin[i + 1]
            while i < last - 1 && dx2 >= src[i + 1].rmax + src[i + 1].rmin {
                i += 1;
            }
            if dx2 < src[i].rmin_next() + src[i + 1].rmax_prev() {
                if i != last_idx {
                    out.push(src[i]);
                    last_idx = i;
                }
            } else if i + 1 != last_idx {
                out.push(src[i + 1]);
                last_idx = i + 1;
            }
        }
        if last_idx != last {
            out.push(src[last]);
        }
        WQSummary { entries: out }
    }

    /// Merges two summaries of disjoint streams into a summary of their union.
    pub fn combine(a: &WQSummary, b: &WQSummary) -> WQSummary {
        if a.is_empty() {
            return b.clone();
        }
        if b.is_empty() {
            return a.clone();
        }
        let (sa, sb) = (&a.entries, &b.entries);
        let mut out = Vec::with_capacity(sa.len() + sb.len());
        let (mut ia, mut ib) = (0, 0);
        let (mut aprev_rmin, mut bprev_rmin) = (0.0, 0.0);

        while ia < sa.len() && ib < sb.len() {
            let (ea, eb) = (sa[ia], sb[ib]);
            if ea.value == eb.value {
                out.push(SummaryEntry::new(
                    ea.rmin + eb.rmin,
                    ea.rmax + eb.rmax,
                    ea.wmin + eb.wmin,
                    ea.value,
                ));
                aprev_rmin = ea.rmin_next();
                bprev_rmin = eb.rmin_next();
                ia += 1;
                ib += 1;
            } else if ea.value < eb.value {
                out.push(SummaryEntry::new(
                    ea.rmin + bprev_rmin,
                    ea.rmax + eb.rmax_prev(),
                    ea.wmin,
                    ea.value,
                ));
                aprev_rmin = ea.rmin_next();
                ia += 1;
            } else {
                out.push(SummaryEntry::new(
                    eb.rmin + aprev_rmin,
                    eb.rmax + ea.rmax_prev(),
                    eb.wmin,
                    eb.value,
                ));
                bprev_rmin = eb.rmin_next();
                ib += 1;
            }
        }
        if ia < sa.len() {
            let brmax = sb[sb.len() - 1].rmax;
            out.extend(
                sa[ia..]
                    .iter()
                    .map(|e| SummaryEntry::new(e.rmin + bprev_rmin, e.rmax + brmax, e.wmin, e.value)),
            );
        }
        if ib < sb.len() {
            let armax = sa[sa.len() - 1].rmax;
            out.extend(
                sb[ib..]
                    .iter()
                    .map(|e| SummaryEntry::new(e.rmin + aprev_rmin, e.rmax + armax, e.wmin, e.value)),
            );
        }
        WQSummary { entries: out }
    }

    /// Largest gap between rank bounds, the absolute rank error of the summary.
    pub fn max_error(&self) -> f64 {
        let mut err = 0.0f64;
        for w in self.entries.windows(2) {
            err = err.max(w[1].rmax_prev() - w[0].rmin_next());
        }
        err
    }
}

/// Streaming weighted quantile sketch.
#[derive(Debug, Clone)]
pub struct QuantileSketch {
    limit_size: usize,
    queue: Vec<(f32, f64)>,
    queue_cap: usize,
    levels: Vec<WQSummary>,
}

impl QuantileSketch {
    /// Sketch for at most `maxn` values with rank error `eps`.
    pub fn new(maxn: usize, eps: f64) -> Self {
        let (_, limit_size) = Self::limit_size_level(maxn, eps);
        QuantileSketch {
            limit_size,
            queue: Vec::with_capacity(1),
            // grows from a single slot to `2 * limit_size` on the first overflow
            queue_cap: 1,
            levels: Vec::new(),
        }
    }

    /// Number of levels and per-level entry limit so that
    /// `2^levels * limit_size >= maxn`. The limit never exceeds `maxn`.
    pub fn limit_size_level(maxn: usize, eps: f64) -> (usize, usize) {
        let mut nlevel = 1usize;
        loop {
            let limit_size = ((nlevel as f64 / eps).ceil() as usize + 1)
                .min(maxn)
                .max(1);
            let n = 1usize.checked_shl(nlevel as u32).unwrap_or(usize::MAX);
            if n.saturating_mul(limit_size) >= maxn {
                return (nlevel, limit_size);
            }
            nlevel += 1;
        }
    }

    /// Maximum number of entries per level.
    pub fn limit_size(&self) -> usize {
        self.limit_size
    }

    /// Adds `value` with weight `weight`. Zero weights are ignored.
    pub fn push(&mut self, value: f32, weight: f64) {
        if weight == 0.0 {
            return;
        }
        if let Some(last) = self.queue.last_mut() {
            if last.0 == value {
                last.1 += weight;
                return;
            }
        }
        if self.queue.len() == self.queue_cap {
            if self.queue_cap == 1 {
                self.queue_cap = self.limit_size * 2;
                self.queue.reserve(self.queue_cap - 1);
            } else {
                let temp = WQSummary::from_weighted(&mut self.queue);
                self.queue.clear();
                self.push_summary(temp);
            }
        }
        self.queue.push((value, weight));
    }

    fn push_summary(&mut self, temp: WQSummary) {
        let mut temp = temp;
        let mut l = 1;
        loop {
            if self.levels.len() <= l {
                self.levels.resize_with(l + 1, WQSummary::new);
            }
            if self.levels[l].is_empty() {
                self.levels[l] = temp.prune(self.limit_size);
                return;
            }
            let pruned = temp.prune(self.limit_size);
            temp = WQSummary::combine(&pruned, &self.levels[l]);
            if temp.len() > self.limit_size {
                self.levels[l] = WQSummary::new();
                l += 1;
            } else {
                self.levels[l] = temp;
                return;
            }
        }
    }

    /// Summary of everything pushed so far.
    pub fn summary(&self) -> WQSummary {
        let mut queue = self.queue.clone();
        let out = WQSummary::from_weighted(&mut queue);
        if self.levels.is_empty() {
            return out.prune(self.limit_size);
        }
        let mut acc = out.prune(self.limit_size);
        for level in self.levels.iter().skip(1) {
            if level.is_empty() {
                continue;
            }
            acc = if acc.is_empty() {
                level.clone()
            } else {
                WQSummary::combine(&acc, level).prune(self.limit_size)
            };
        }
        acc
    }
}
