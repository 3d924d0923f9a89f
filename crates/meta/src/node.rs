//! Worker node model.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Address used for the in-process (local) view in per-node registries.
pub const LOCAL_NODE: &str = "inproc";

/// One worker node as seen in the cluster membership view.
///
/// Identity is the canonical address string: equality and hashing ignore
/// liveness and size so a node keeps its registry slot across state churn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerNode {
    /// Canonical `host:port` address.
    pub addr: String,
    /// Whether the membership source currently reports the node live.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Observed memory footprint in bytes, published by expire passes.
    #[serde(default)]
    pub size_bytes: u64,
}

fn default_active() -> bool {
    true
}

impl WorkerNode {
    /// Construct an active node with no observed size.
    pub fn new(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            active: true,
            size_bytes: 0,
        }
    }
}

impl PartialEq for WorkerNode {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for WorkerNode {}

impl Hash for WorkerNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state);
    }
}

impl fmt::Display for WorkerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}
