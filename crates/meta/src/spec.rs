//! Ingestion specs: one unit of data the cluster should materialize and hold.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecState {
    /// Not yet materialized on any node, or reset after loss.
    New,
    /// Materialized and acknowledged by its affinity node.
    Ready,
}

/// One ingestion specification.
///
/// Specs are owned exclusively by the per-table registry; nodes and blocks
/// refer to them only through the string id. Once `Ready`, a spec is never
/// mutated except by [`Spec::reset`] (node loss or disappearance from both
/// the active and empty sets) or removal when its table is cleaned up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    /// Deterministic signature string identifying this partition instance.
    pub id: String,
    /// Owning table name.
    pub table: String,
    /// Generation version, `<configVersion>.<unixNow>` at creation time.
    pub version: String,
    /// Macro values applied to produce this instance's path.
    pub partition_values: BTreeMap<String, String>,
    /// Concrete source path this spec covers.
    pub path: String,
    /// Watermark anchor used during expansion.
    pub watermark: i64,
    state: SpecState,
    affinity: Option<String>,
    synced_version: Option<String>,
}

impl Spec {
    /// Construct a fresh spec in `New` state with no affinity.
    pub fn new(
        id: String,
        table: String,
        version: String,
        partition_values: BTreeMap<String, String>,
        path: String,
        watermark: i64,
    ) -> Self {
        Self {
            id,
            table,
            version,
            partition_values,
            path,
            watermark,
            state: SpecState::New,
            affinity: None,
            synced_version: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SpecState {
        self.state
    }

    /// Node address this spec is placed on, if any.
    pub fn affinity(&self) -> Option<&str> {
        self.affinity.as_deref()
    }

    /// Whether the spec has a placement.
    pub fn assigned(&self) -> bool {
        self.affinity.is_some()
    }

    /// Place the spec on a node. State stays `New` until the ingestion task
    /// is acknowledged.
    pub fn place(&mut self, addr: &str) {
        self.affinity = Some(addr.to_string());
    }

    /// Mark the spec materialized at its current version.
    pub fn mark_ready(&mut self) {
        self.state = SpecState::Ready;
        self.synced_version = Some(self.version.clone());
    }

    /// Clear affinity and return to `New`, forcing rescheduling.
    pub fn reset(&mut self) {
        self.affinity = None;
        self.state = SpecState::New;
        self.synced_version = None;
    }

    /// Whether the spec must be communicated to its affinity node: never
    /// synced, or synced at a different version than it now carries.
    pub fn need_sync(&self) -> bool {
        self.state == SpecState::New || self.synced_version.as_deref() != Some(&self.version)
    }
}
