//! Per-process registry of loaded blocks, keyed by node and table.
//!
//! One instance runs on every node (tracking its own blocks under the
//! in-process key) and one on the coordinator (tracking every node's view
//! pulled in by `poll`). All state sits behind a single mutex held only for
//! short map reads and writes, never across RPC or IO.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};

use ember_common::Result;
use ember_meta::{WorkerNode, LOCAL_NODE};

use crate::block::{BatchBlock, BlockLoader, BlockSignature, ColumnSummary};
use crate::table_state::{TableMetrics, TableState, TableStates};

#[derive(Debug, Default)]
struct Inner {
    // node address -> table -> state; the in-process entry always exists
    data: HashMap<String, TableStates>,
    empty_specs: HashSet<String>,
}

/// Block registry shared by RPC handlers and the reconciliation loop.
#[derive(Debug)]
pub struct BlockManager {
    inner: Mutex<Inner>,
}

impl Default for BlockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockManager {
    /// Fresh registry with an empty in-process view.
    pub fn new() -> Self {
        let mut data = HashMap::new();
        data.insert(LOCAL_NODE.to_string(), TableStates::new());
        Self {
            inner: Mutex::new(Inner {
                data,
                empty_specs: HashSet::new(),
            }),
        }
    }

    /// Process-wide handle, initialized on first use. Tests construct their
    /// own instances instead.
    pub fn global() -> &'static Arc<BlockManager> {
        static GLOBAL: OnceLock<Arc<BlockManager>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(BlockManager::new()))
    }

    /// Insert one locally loaded block. Returns false when a
    /// structurally-equal block is already present.
    pub fn add(&self, block: BatchBlock) -> bool {
        let mut guard = self.inner.lock().expect("block manager lock");
        let local = guard.data.entry(LOCAL_NODE.to_string()).or_default();
        local
            .entry(block.table.clone())
            .or_insert_with(|| TableState::new(&block.table))
            .add(block)
    }

    /// Drain a block list into the local view. Returns the number inserted.
    pub fn add_all(&self, blocks: &mut Vec<BatchBlock>) -> usize {
        let mut added = 0;
        for block in blocks.drain(..) {
            if self.add(block) {
                added += 1;
            }
        }
        added
    }

    /// Load a signature through the given loader and add the result.
    pub fn load_and_add(&self, loader: &dyn BlockLoader, sign: &BlockSignature) -> Result<usize> {
        let mut blocks = loader.load(sign)?;
        Ok(self.add_all(&mut blocks))
    }

    /// Remove every local block of one spec. Returns the number removed.
    pub fn remove_by_spec(&self, table: &str, spec: &str) -> usize {
        let mut guard = self.inner.lock().expect("block manager lock");
        guard
            .data
            .get_mut(LOCAL_NODE)
            .and_then(|states| states.get_mut(table))
            .map(|state| state.remove_by_spec(spec))
            .unwrap_or(0)
    }

    /// Track a spec whose load produced no blocks.
    pub fn record_empty_spec(&self, spec: &str) {
        let mut guard = self.inner.lock().expect("block manager lock");
        guard.empty_specs.insert(spec.to_string());
    }

    /// Current empty-spec set.
    pub fn empty_specs(&self) -> HashSet<String> {
        self.inner
            .lock()
            .expect("block manager lock")
            .empty_specs
            .clone()
    }

    /// Clear the empty-spec set. Runs at the start of every expire cycle.
    pub fn clear_empty_specs(&self) {
        self.inner
            .lock()
            .expect("block manager lock")
            .empty_specs
            .clear();
    }

    /// Take the empty-spec set, leaving it clear. Nodes drain on poll so a
    /// spec whose data appears later is retried.
    pub fn drain_empty_specs(&self) -> HashSet<String> {
        let mut guard = self.inner.lock().expect("block manager lock");
        std::mem::take(&mut guard.empty_specs)
    }

    /// Local state of one table; an empty sentinel when absent.
    pub fn state(&self, table: &str) -> TableState {
        let guard = self.inner.lock().expect("block manager lock");
        guard
            .data
            .get(LOCAL_NODE)
            .and_then(|states| states.get(table))
            .cloned()
            .unwrap_or_else(|| TableState::new(table))
    }

    /// Snapshot of one node's table states; empty when the node is unknown.
    pub fn states(&self, addr: &str) -> TableStates {
        let guard = self.inner.lock().expect("block manager lock");
        guard.data.get(addr).cloned().unwrap_or_default()
    }

    /// Atomically replace one node's view.
    pub fn swap(&self, addr: &str, states: TableStates) {
        let mut guard = self.inner.lock().expect("block manager lock");
        guard.data.insert(addr.to_string(), states);
    }

    /// Drop whichever node entry matches this address.
    pub fn remove_node(&self, addr: &str) {
        let mut guard = self.inner.lock().expect("block manager lock");
        guard.data.remove(addr);
    }

    /// Up to `limit` distinct table names across all known nodes.
    pub fn tables(&self, limit: usize) -> HashSet<String> {
        let guard = self.inner.lock().expect("block manager lock");
        let mut out = HashSet::new();
        for states in guard.data.values() {
            for table in states.keys() {
                out.insert(table.clone());
            }
            if out.len() >= limit {
                break;
            }
        }
        out
    }

    /// Whether a spec is covered: recorded empty, or held by the node.
    pub fn has_spec(&self, table: &str, spec: &str, addr: &str) -> bool {
        let guard = self.inner.lock().expect("block manager lock");
        if guard.empty_specs.contains(spec) {
            return true;
        }
        guard
            .data
            .get(addr)
            .and_then(|states| states.get(table))
            .map(|state| state.has_spec(spec))
            .unwrap_or(false)
    }

    /// Fold one table's metrics across every node view.
    pub fn metrics(&self, table: &str) -> TableMetrics {
        let guard = self.inner.lock().expect("block manager lock");
        let mut merged = TableMetrics::default();
        for states in guard.data.values() {
            if let Some(state) = states.get(table) {
                merged.merge(&state.metrics());
            }
        }
        merged
    }

    /// Union of spec ids seen on the given cluster members.
    pub fn active_specs(&self, nodes: &[WorkerNode]) -> HashSet<String> {
        let guard = self.inner.lock().expect("block manager lock");
        let mut out = HashSet::new();
        for node in nodes {
            if let Some(states) = guard.data.get(node.addr.as_str()) {
                for state in states.values() {
                    out.extend(state.specs());
                }
            }
        }
        out
    }

    /// Remove every obsolete spec group from one node's view and return the
    /// removed pairs plus the node's remaining raw footprint.
    pub fn expire_node<F>(&self, addr: &str, mut pred: F) -> (HashSet<(String, String)>, u64)
    where
        F: FnMut(&str, &str) -> bool,
    {
        let mut guard = self.inner.lock().expect("block manager lock");
        let mut expired = HashSet::new();
        let mut raw_bytes = 0;
        if let Some(states) = guard.data.get_mut(addr) {
            for state in states.values_mut() {
                expired.extend(state.expired(&mut pred));
                raw_bytes += state.raw_bytes();
            }
        }
        (expired, raw_bytes)
    }

    /// Total raw bytes held in one node's view.
    pub fn node_bytes(&self, addr: &str) -> u64 {
        let guard = self.inner.lock().expect("block manager lock");
        guard
            .data
            .get(addr)
            .map(|states| states.values().map(TableState::raw_bytes).sum::<u64>())
            .unwrap_or(0)
    }

    /// Merged histogram summary of one table/column over local blocks.
    pub fn hist(&self, table: &str, col: usize) -> Option<ColumnSummary> {
        let guard = self.inner.lock().expect("block manager lock");
        guard
            .data
            .get(LOCAL_NODE)
            .and_then(|states| states.get(table))
            .and_then(|state| state.column_summary(col))
    }
}
