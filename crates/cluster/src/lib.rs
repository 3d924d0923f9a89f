//! Ember control plane: block registry, spec generation, and the
//! coordinator reconciliation loop.
//!
//! Architecture role:
//! - per-node block registry with membership queries and swap semantics
//! - spec provider expanding table definitions against the wall clock
//! - spec repository driving refresh/assign/expire over node clients
//! - worker-side node service executing ingestion/expiration tasks
//!
//! Key modules:
//! - [`block`] / [`table_state`] / [`block_manager`]
//! - [`spec_provider`] / [`spec_repo`]
//! - [`task`] / [`node_client`] / [`node_service`]

pub mod block;
pub mod block_manager;
pub mod node_client;
pub mod node_service;
pub mod spec_provider;
pub mod spec_repo;
pub mod table_state;
pub mod task;

pub use block::{BatchBlock, BlockLoader, BlockSignature, ColumnSummary};
pub use block_manager::BlockManager;
pub use node_client::{send_task, ClientMaker, InProcessNodeClient, NodeClient};
pub use node_service::NodeService;
pub use spec_provider::SpecProvider;
pub use spec_repo::{CycleStats, SpecRepo};
pub use table_state::{TableMetrics, TableState, TableStates};
pub use task::{BatchRows, BlockExpire, NodeStateSnapshot, QueryPlan, Task, TaskState};
