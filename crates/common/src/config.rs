use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Coordinator service configuration shared across the reconciliation loop
/// and the node-client layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Seconds between reconciliation cycles (refresh + expire + assign).
    pub cycle_interval_secs: u64,
    /// Per-RPC timeout applied at the node-client layer.
    ///
    /// A timed-out task RPC surfaces as a failed task state and the spec is
    /// retried on the next cycle.
    pub rpc_timeout_secs: u64,
    /// Attempts per task RPC before it is reported failed.
    pub rpc_retries: u32,
    /// Upper bound on watermarks enumerated per table, regardless of retention.
    #[serde(default = "default_max_time_windows")]
    pub max_time_windows: usize,
    /// Cap on distinct table names returned by block-manager table listings.
    #[serde(default = "default_table_limit")]
    pub table_limit: usize,
}

fn default_max_time_windows() -> usize {
    512
}

fn default_table_limit() -> usize {
    1000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 5,
            rpc_timeout_secs: 30,
            rpc_retries: 3,
            max_time_windows: default_max_time_windows(),
            table_limit: default_table_limit(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a `.json` or `.toml` file, dispatched on
    /// extension.
    pub fn load(path: &str) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&s)
                .map_err(|e| EmberError::InvalidConfig(format!("config json decode failed: {e}"))),
            Some("toml") => toml::from_str(&s)
                .map_err(|e| EmberError::InvalidConfig(format!("config toml decode failed: {e}"))),
            Some(other) => Err(EmberError::InvalidConfig(format!(
                "unsupported config extension '.{other}'; use .json or .toml"
            ))),
            None => Err(EmberError::InvalidConfig(
                "config path must include extension .json or .toml".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pick_explicit_rpc_budgets() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.rpc_timeout_secs, 30);
        assert_eq!(cfg.rpc_retries, 3);
    }

    #[test]
    fn toml_round_trip_keeps_optional_defaults() {
        let text = "cycle_interval_secs = 10\nrpc_timeout_secs = 5\nrpc_retries = 1\n";
        let cfg: ServiceConfig = toml::from_str(text).expect("parse");
        assert_eq!(cfg.cycle_interval_secs, 10);
        assert_eq!(cfg.max_time_windows, 512);
        assert_eq!(cfg.table_limit, 1000);
    }
}
