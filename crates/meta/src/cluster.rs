//! Cluster view: the in-memory mirror of the external config store.
//!
//! The coordinator periodically syncs membership and table definitions from
//! the external store into a [`ClusterView`]; reconciliation passes read
//! consistent snapshots from it and publish node sizes back into it. The
//! view is injected as an `Arc` wherever it is needed, there is no process
//! singleton.

use std::fs;
use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use ember_common::{EmberError, Result};

use crate::node::WorkerNode;
use crate::table::TableConf;

/// One consistent snapshot of cluster configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterConf {
    /// Config-store version, folded into spec generation versions.
    #[serde(default)]
    pub version: u64,
    /// Known worker nodes.
    #[serde(default)]
    pub nodes: Vec<WorkerNode>,
    /// Table definitions.
    #[serde(default)]
    pub tables: Vec<TableConf>,
}

impl ClusterConf {
    /// Load a cluster definition from a `.json` or `.toml` file.
    pub fn load(path: &str) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&s)
                .map_err(|e| EmberError::InvalidConfig(format!("cluster json decode failed: {e}"))),
            Some("toml") => toml::from_str(&s)
                .map_err(|e| EmberError::InvalidConfig(format!("cluster toml decode failed: {e}"))),
            Some(other) => Err(EmberError::InvalidConfig(format!(
                "unsupported cluster definition extension '.{other}'; use .json or .toml"
            ))),
            None => Err(EmberError::InvalidConfig(
                "cluster definition path must include extension .json or .toml".to_string(),
            )),
        }
    }
}

/// Shared, mutable cluster view.
#[derive(Debug, Default)]
pub struct ClusterView {
    inner: RwLock<ClusterConf>,
}

impl ClusterView {
    /// Wrap an initial snapshot.
    pub fn new(conf: ClusterConf) -> Self {
        Self {
            inner: RwLock::new(conf),
        }
    }

    /// Replace the whole view with a freshly synced snapshot.
    pub fn apply(&self, conf: ClusterConf) {
        let mut guard = self.inner.write().expect("cluster view lock");
        info!(
            version = conf.version,
            nodes = conf.nodes.len(),
            tables = conf.tables.len(),
            "cluster view updated"
        );
        *guard = conf;
    }

    /// Current config-store version.
    pub fn version(&self) -> u64 {
        self.inner.read().expect("cluster view lock").version
    }

    /// Snapshot of known nodes.
    pub fn nodes(&self) -> Vec<WorkerNode> {
        self.inner.read().expect("cluster view lock").nodes.clone()
    }

    /// Snapshot of table definitions.
    pub fn tables(&self) -> Vec<TableConf> {
        self.inner.read().expect("cluster view lock").tables.clone()
    }

    /// Publish an observed memory footprint for a node.
    pub fn update_node_size(&self, addr: &str, bytes: u64) {
        let mut guard = self.inner.write().expect("cluster view lock");
        if let Some(node) = guard.nodes.iter_mut().find(|n| n.addr == addr) {
            node.size_bytes = bytes;
        }
    }

    /// Flip a node's liveness flag. Returns false when the address is
    /// unknown.
    pub fn set_active(&self, addr: &str, active: bool) -> bool {
        let mut guard = self.inner.write().expect("cluster view lock");
        match guard.nodes.iter_mut().find(|n| n.addr == addr) {
            Some(node) => {
                node.active = active;
                true
            }
            None => false,
        }
    }
}
