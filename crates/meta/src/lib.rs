//! Metadata model for the Ember control plane.
//!
//! Architecture role:
//! - path-macro engine turning templates plus a watermark into concrete paths
//! - ingestion specs and their lifecycle
//! - table definitions and the per-table desired-spec registry
//! - worker node model and the synced cluster view
//!
//! Key modules:
//! - [`macros`]
//! - [`spec`]
//! - [`table`]
//! - [`node`]
//! - [`cluster`]

pub mod cluster;
pub mod macros;
pub mod node;
pub mod spec;
pub mod table;

pub use cluster::{ClusterConf, ClusterView};
pub use macros::{
    contains_time_macro, enumerate_paths_with_macros, extract, materialize, restore_template,
    watermark, MacroValues, PatternMacro,
};
pub use node::{WorkerNode, LOCAL_NODE};
pub use spec::{Spec, SpecState};
pub use table::{TableConf, TableRegistry};
