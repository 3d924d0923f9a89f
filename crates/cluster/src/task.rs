//! Coordinator-to-node task contract and node-state snapshots.
//!
//! These are the only shapes crossing the RPC boundary; no error type does.
//! Every failure on either side surfaces as a [`TaskState`] value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use ember_meta::Spec;

use crate::table_state::TableStates;

/// Terminal and in-flight states of a node task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Accepted but not yet started.
    Queue,
    /// Currently executing.
    InProgress,
    /// Completed successfully.
    Succeeded,
    /// Failed; the coordinator retries on a later cycle.
    Failed,
}

impl TaskState {
    /// Short token for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queue => "queue",
            TaskState::InProgress => "in_progress",
            TaskState::Succeeded => "succeeded",
            TaskState::Failed => "failed",
        }
    }
}

/// Spec ids to take offline, grouped with their tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockExpire {
    /// `(table, spec)` pairs to remove.
    pub pairs: HashSet<(String, String)>,
}

impl BlockExpire {
    /// Wrap a set of `(table, spec)` pairs.
    pub fn new(pairs: HashSet<(String, String)>) -> Self {
        Self { pairs }
    }
}

/// One unit of work sent to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Task {
    /// Materialize the blocks of one spec.
    Ingestion(Spec),
    /// Remove the blocks of obsolete specs.
    Expiration(BlockExpire),
}

impl Task {
    /// Stable identity used in logs and dedup.
    pub fn signature(&self) -> String {
        match self {
            Task::Ingestion(spec) => format!("ingestion:{}", spec.id),
            Task::Expiration(be) => format!("expiration:{}", be.pairs.len()),
        }
    }
}

/// Node-state snapshot returned by `poll`.
///
/// Carries everything the coordinator mirrors per node: the block registry
/// grouped by table and spec, the specs whose last load produced no data,
/// and the node's memory footprint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStateSnapshot {
    /// Table states, block payloads stripped to summaries.
    pub states: TableStates,
    /// Specs that loaded zero blocks since the previous poll.
    pub empty_specs: HashSet<String>,
    /// Total raw bytes held.
    pub total_bytes: u64,
}

/// Opaque query fragment fanned out to nodes. Plan semantics belong to the
/// external execution engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Table the fragment reads.
    pub table: String,
    /// Serialized plan payload.
    pub payload: Vec<u8>,
}

/// Row batch returned by a node for a query fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRows {
    /// Row count.
    pub rows: u64,
    /// Serialized row payload.
    pub payload: Vec<u8>,
}
