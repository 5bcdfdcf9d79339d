//! Per-node histogram storage.

use crate::core::error::{HistError, Result};
use crate::core::types::{GHistRow, GradStats, NodeId};
use std::collections::HashMap;
use std::ops::Index;

/// Histogram rows keyed by tree node id.
///
/// All rows share the width fixed by [`init`](Self::init). The collection
/// only stores rows; filling and reducing them is done by the builders.
#[derive(Debug, Clone, Default)]
pub struct HistCollection {
    nbins: usize,
    rows: HashMap<NodeId, GHistRow>,
}

impl HistCollection {
    pub fn new() -> Self {
        HistCollection::default()
    }

    /// Fixes the row width. Changing the width drops every existing row.
    pub fn init(&mut self, nbins: usize) {
        if nbins != self.nbins {
            if !self.rows.is_empty() {
                log::debug!(
                    "Histogram width changed from {} to {}, dropping {} rows",
                    self.nbins,
                    nbins,
                    self.rows.len()
                );
            }
            self.rows.clear();
            self.nbins = nbins;
        }
    }

    /// Row width.
    pub fn n_bins(&self) -> usize {
        self.nbins
    }

    /// Allocates a zeroed row for `nid`. An existing row is re-zeroed.
    pub fn add_hist_row(&mut self, nid: NodeId) {
        let nbins = self.nbins;
        self.rows
            .entry(nid)
            .and_modify(|row| row.fill(GradStats::default()))
            .or_insert_with(|| vec![GradStats::default(); nbins]);
    }

    pub fn get(&self, nid: NodeId) -> Result<&[GradStats]> {
        self.rows
            .get(&nid)
            .map(Vec::as_slice)
            .ok_or(HistError::NodeNotFound { node: nid })
    }

    pub fn get_mut(&mut self, nid: NodeId) -> Result<&mut [GradStats]> {
        self.rows
            .get_mut(&nid)
            .map(Vec::as_mut_slice)
            .ok_or(HistError::NodeNotFound { node: nid })
    }

    /// Mutable rows of distinct nodes `nids`, in the order given.
    pub fn rows_mut(&mut self, nids: &[NodeId]) -> Result<Vec<&mut [GradStats]>> {
        let mut position = HashMap::with_capacity(nids.len());
        for (i, &nid) in nids.iter().enumerate() {
            if !self.rows.contains_key(&nid) {
                return Err(HistError::NodeNotFound { node: nid });
            }
            if position.insert(nid, i).is_some() {
                return Err(HistError::invalid_parameter(
                    "nids",
                    nid.to_string(),
                    "node ids must be distinct",
                ));
            }
        }
        let mut out: Vec<Option<&mut [GradStats]>> = Vec::with_capacity(nids.len());
        out.resize_with(nids.len(), || None);
        for (nid, row) in self.rows.iter_mut() {
            if let Some(&i) = position.get(nid) {
                out[i] = Some(row.as_mut_slice());
            }
        }
        Ok(out.into_iter().flatten().collect())
    }

    pub fn contains(&self, nid: NodeId) -> bool {
        self.rows.contains_key(&nid)
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Node ids with a row, in ascending order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.rows.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Drops every row, keeping the width.
    pub fn reset(&mut self) {
        self.rows.clear();
    }
}

impl Index<NodeId> for HistCollection {
    type Output = [GradStats];

    /// Panics if `nid` has no row; use [`HistCollection::get`] to handle that case.
    fn index(&self, nid: NodeId) -> &[GradStats] {
        match self.rows.get(&nid) {
            Some(row) => row,
            None => panic!("histogram for node {} not found", nid),
        }
    }
}
