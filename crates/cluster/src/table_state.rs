//! Per-(node, table) registry of loaded blocks with spec grouping.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::block::{BatchBlock, ColumnSummary};

/// Table name to table state mapping, the unit a node reports in `poll`.
pub type TableStates = HashMap<String, TableState>;

/// Aggregated per-table block metrics, mergeable across nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetrics {
    /// Number of blocks.
    pub blocks: u64,
    /// Total rows.
    pub rows: u64,
    /// Total raw bytes.
    pub raw_bytes: u64,
    /// Earliest covered time, unix seconds. Zero when no blocks.
    pub min_time: i64,
    /// Latest covered time, unix seconds. Zero when no blocks.
    pub max_time: i64,
}

impl TableMetrics {
    /// Fold another metrics snapshot into this one.
    pub fn merge(&mut self, other: &TableMetrics) {
        if other.blocks == 0 {
            return;
        }
        if self.blocks == 0 {
            self.min_time = other.min_time;
            self.max_time = other.max_time;
        } else {
            self.min_time = self.min_time.min(other.min_time);
            self.max_time = self.max_time.max(other.max_time);
        }
        self.blocks += other.blocks;
        self.rows += other.rows;
        self.raw_bytes += other.raw_bytes;
    }
}

/// Blocks of one table on one node, grouped by spec id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableState {
    table: String,
    blocks: HashMap<String, HashSet<BatchBlock>>,
    metrics: TableMetrics,
}

impl TableState {
    /// Empty state for a table.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            blocks: HashMap::new(),
            metrics: TableMetrics::default(),
        }
    }

    /// Table this state tracks.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Insert one block. Returns false when a structurally-equal block is
    /// already present.
    pub fn add(&mut self, block: BatchBlock) -> bool {
        let group = self.blocks.entry(block.spec.clone()).or_default();
        if group.contains(&block) {
            return false;
        }
        if self.metrics.blocks == 0 {
            self.metrics.min_time = block.start;
            self.metrics.max_time = block.end;
        } else {
            self.metrics.min_time = self.metrics.min_time.min(block.start);
            self.metrics.max_time = self.metrics.max_time.max(block.end);
        }
        self.metrics.blocks += 1;
        self.metrics.rows += block.rows;
        self.metrics.raw_bytes += block.raw_bytes;
        group.insert(block);
        true
    }

    /// Remove every block of one spec. Returns the number removed.
    pub fn remove_by_spec(&mut self, spec: &str) -> usize {
        let removed = self.blocks.remove(spec).map(|g| g.len()).unwrap_or(0);
        if removed > 0 {
            self.recompute_metrics();
        }
        removed
    }

    /// Whether any block of this spec is present.
    pub fn has_spec(&self, spec: &str) -> bool {
        self.blocks.contains_key(spec)
    }

    /// Spec ids currently holding blocks.
    pub fn specs(&self) -> HashSet<String> {
        self.blocks.keys().cloned().collect()
    }

    /// Remove every spec group the predicate marks obsolete and return the
    /// removed `(table, spec)` identifiers.
    pub fn expired<F>(&mut self, mut pred: F) -> HashSet<(String, String)>
    where
        F: FnMut(&str, &str) -> bool,
    {
        let doomed: Vec<String> = self
            .blocks
            .keys()
            .filter(|spec| pred(&self.table, spec.as_str()))
            .cloned()
            .collect();
        let mut out = HashSet::new();
        for spec in doomed {
            self.blocks.remove(&spec);
            out.insert((self.table.clone(), spec));
        }
        if !out.is_empty() {
            self.recompute_metrics();
        }
        out
    }

    /// Total raw bytes across all blocks.
    pub fn raw_bytes(&self) -> u64 {
        self.metrics.raw_bytes
    }

    /// Current metrics snapshot.
    pub fn metrics(&self) -> TableMetrics {
        self.metrics
    }

    /// Number of blocks held.
    pub fn num_blocks(&self) -> u64 {
        self.metrics.blocks
    }

    /// True when no blocks are held.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Merged column summary at one column index across all blocks, or
    /// `None` when no block carries that column.
    pub fn column_summary(&self, col: usize) -> Option<ColumnSummary> {
        let mut merged: Option<ColumnSummary> = None;
        for block in self.blocks.values().flatten() {
            if let Some(s) = block.summaries.get(col) {
                match merged.as_mut() {
                    Some(m) => m.merge(s),
                    None => merged = Some(*s),
                }
            }
        }
        merged
    }

    fn recompute_metrics(&mut self) {
        let mut m = TableMetrics::default();
        for block in self.blocks.values().flatten() {
            if m.blocks == 0 {
                m.min_time = block.start;
                m.max_time = block.end;
            } else {
                m.min_time = m.min_time.min(block.start);
                m.max_time = m.max_time.max(block.end);
            }
            m.blocks += 1;
            m.rows += block.rows;
            m.raw_bytes += block.raw_bytes;
        }
        self.metrics = m;
    }
}
