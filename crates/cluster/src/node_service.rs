//! Worker-side service: executes coordinator tasks against the local block
//! registry and serves state snapshots.

use std::sync::Arc;

use tracing::{info, warn};

use ember_meta::LOCAL_NODE;

use crate::block::{BlockLoader, BlockSignature};
use crate::block_manager::BlockManager;
use crate::task::{NodeStateSnapshot, Task, TaskState};

/// Task handler and poll endpoint running on every worker node.
pub struct NodeService {
    blocks: Arc<BlockManager>,
    loader: Arc<dyn BlockLoader>,
}

impl NodeService {
    /// Wire the service to this node's block registry and loader.
    pub fn new(blocks: Arc<BlockManager>, loader: Arc<dyn BlockLoader>) -> Self {
        Self { blocks, loader }
    }

    /// Health check.
    pub fn echo(&self, name: &str) -> String {
        format!("ember-node: {name}")
    }

    /// Execute one coordinator task. Failures never escape; they map to
    /// [`TaskState::Failed`] and the coordinator retries next cycle.
    pub fn handle(&self, task: &Task) -> TaskState {
        match task {
            Task::Ingestion(spec) => {
                let sign = BlockSignature {
                    table: spec.table.clone(),
                    spec: spec.id.clone(),
                    path: spec.path.clone(),
                    version: spec.version.clone(),
                };
                match self.blocks.load_and_add(self.loader.as_ref(), &sign) {
                    Ok(0) => {
                        // ran clean but the source had nothing for us
                        self.blocks.record_empty_spec(&spec.id);
                        info!(table = %spec.table, spec = %spec.id, "ingestion yielded no blocks");
                        TaskState::Succeeded
                    }
                    Ok(added) => {
                        info!(table = %spec.table, spec = %spec.id, added, "ingestion loaded blocks");
                        TaskState::Succeeded
                    }
                    Err(e) => {
                        warn!(table = %spec.table, spec = %spec.id, error = %e, "ingestion failed");
                        TaskState::Failed
                    }
                }
            }
            Task::Expiration(be) => {
                let mut removed = 0;
                for (table, spec) in &be.pairs {
                    removed += self.blocks.remove_by_spec(table, spec);
                }
                info!(pairs = be.pairs.len(), removed, "expiration applied");
                TaskState::Succeeded
            }
        }
    }

    /// Snapshot local table states for the coordinator.
    ///
    /// The empty-spec set drains with the snapshot: a spec reported empty is
    /// covered for exactly one coordinator cycle, so a source that grows
    /// data later gets retried.
    pub fn poll(&self) -> NodeStateSnapshot {
        let states = self.blocks.states(LOCAL_NODE);
        let total_bytes = self.blocks.node_bytes(LOCAL_NODE);
        let empty_specs = self.blocks.drain_empty_specs();
        NodeStateSnapshot {
            states,
            empty_specs,
            total_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashSet};

    use ember_common::Result;
    use ember_meta::Spec;

    use super::*;
    use crate::block::BatchBlock;
    use crate::task::BlockExpire;

    struct FixedLoader {
        blocks_per_spec: usize,
    }

    impl BlockLoader for FixedLoader {
        fn load(&self, sign: &BlockSignature) -> Result<Vec<BatchBlock>> {
            Ok((0..self.blocks_per_spec)
                .map(|i| BatchBlock {
                    table: sign.table.clone(),
                    spec: sign.spec.clone(),
                    sequence: i as u64,
                    start: 100,
                    end: 200,
                    rows: 8,
                    raw_bytes: 1024,
                    ..BatchBlock::default()
                })
                .collect())
        }
    }

    fn spec(id: &str) -> Spec {
        Spec::new(
            id.to_string(),
            "events".to_string(),
            "1.100".to_string(),
            BTreeMap::new(),
            format!("mem://data/{id}"),
            0,
        )
    }

    #[test]
    fn ingestion_loads_blocks_and_poll_reports_them() {
        let bm = Arc::new(BlockManager::new());
        let service = NodeService::new(Arc::clone(&bm), Arc::new(FixedLoader { blocks_per_spec: 2 }));
        assert!(service.echo("ping").contains("ping"));

        let state = service.handle(&Task::Ingestion(spec("s1")));
        assert_eq!(state, TaskState::Succeeded);

        let snap = service.poll();
        assert_eq!(snap.total_bytes, 2048);
        assert!(snap.empty_specs.is_empty());
        assert!(snap
            .states
            .get("events")
            .map(|s| s.has_spec("s1"))
            .unwrap_or(false));
    }

    #[test]
    fn empty_ingestion_records_the_spec_and_drains_on_poll() {
        let bm = Arc::new(BlockManager::new());
        let service = NodeService::new(Arc::clone(&bm), Arc::new(FixedLoader { blocks_per_spec: 0 }));

        assert_eq!(service.handle(&Task::Ingestion(spec("s1"))), TaskState::Succeeded);
        let snap = service.poll();
        assert!(snap.empty_specs.contains("s1"));
        // drained: the next cycle no longer treats the spec as covered
        assert!(service.poll().empty_specs.is_empty());
    }

    #[test]
    fn expiration_removes_listed_pairs() {
        let bm = Arc::new(BlockManager::new());
        let service = NodeService::new(Arc::clone(&bm), Arc::new(FixedLoader { blocks_per_spec: 1 }));
        service.handle(&Task::Ingestion(spec("s1")));
        service.handle(&Task::Ingestion(spec("s2")));

        let mut pairs = HashSet::new();
        pairs.insert(("events".to_string(), "s1".to_string()));
        let state = service.handle(&Task::Expiration(BlockExpire::new(pairs)));
        assert_eq!(state, TaskState::Succeeded);

        let snap = service.poll();
        let table = snap.states.get("events").expect("table present");
        assert!(!table.has_spec("s1"));
        assert!(table.has_spec("s2"));
    }
}
