//! Coordinator reconciliation loop.
//!
//! Responsibilities:
//! - `refresh`: recompute the desired spec set from cluster config;
//! - `expire`: pull node states, retire blocks no longer desired;
//! - `assign`: place unassigned specs, recover orphans, drive ingestion;
//! - `lost`: reset every spec routed to a dead address.
//!
//! Serialization contract: `refresh`/`expire`/`assign` never overlap (a
//! cycle lock guards them). Registry state is touched only under its own
//! lock, which is dropped before any node RPC; outcomes are recorded under
//! a short reacquire. `lost` takes no lock because its callers are already
//! serialized.
//!
//! Ordering: orphan detection in `assign` reads the node views populated by
//! the previous `expire` pass, so a cycle runs expire before assign.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use ember_common::{global_metrics, ServiceConfig};
use ember_meta::{ClusterView, TableRegistry, WorkerNode};

use crate::block_manager::BlockManager;
use crate::node_client::{send_task, ClientMaker};
use crate::spec_provider::SpecProvider;
use crate::task::{BlockExpire, Task, TaskState};

/// Coordinator-side owner of every table's desired-spec registry.
pub struct SpecRepo {
    cluster: Arc<ClusterView>,
    blocks: Arc<BlockManager>,
    provider: SpecProvider,
    config: ServiceConfig,
    tables: RwLock<HashMap<String, TableRegistry>>,
    cycle: tokio::sync::Mutex<()>,
}

struct SyncIntent {
    table: String,
    spec_id: String,
    node: WorkerNode,
    task: Task,
}

/// Outcome counters of one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Desired specs after refresh.
    pub specs: usize,
    /// Spec ids expired off nodes.
    pub expired: usize,
    /// Ingestion tasks sent.
    pub tasks: usize,
    /// Nodes considered for placement.
    pub nodes: usize,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl SpecRepo {
    /// Wire the repository to its collaborators.
    pub fn new(
        cluster: Arc<ClusterView>,
        blocks: Arc<BlockManager>,
        provider: SpecProvider,
        config: ServiceConfig,
    ) -> Self {
        Self {
            cluster,
            blocks,
            provider,
            config,
            tables: RwLock::new(HashMap::new()),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.config.rpc_timeout_secs.max(1))
    }

    /// Recompute the desired spec set for every configured table.
    ///
    /// Per-table generation merges into the registry: existing ids are
    /// preserved verbatim, new ids arrive as `NEW`, disappeared ids drop
    /// out (their blocks expire off the workers on the next pass). Returns
    /// the total number of desired specs.
    pub async fn refresh(&self) -> usize {
        let _cycle = self.cycle.lock().await;

        let now = unix_now();
        let version = format!("{}.{}", self.cluster.version(), now);
        let table_confs = self.cluster.tables();

        // drop registries of tables whose definitions vanished
        {
            let mut guard = self.tables.write().expect("table registry lock");
            let live: std::collections::HashSet<&str> =
                table_confs.iter().map(|t| t.name.as_str()).collect();
            guard.retain(|name, _| live.contains(name.as_str()));
        }

        let mut total = 0;
        for table in &table_confs {
            let snapshot = match self.provider.generate(
                &version,
                table,
                now,
                self.config.max_time_windows,
            ) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(table = %table.name, error = %e, "table rejected at refresh");
                    continue;
                }
            };
            global_metrics().inc_specs_generated(&table.name, snapshot.len() as u64);

            let mut guard = self.tables.write().expect("table registry lock");
            let registry = guard
                .entry(table.name.clone())
                .or_insert_with(|| TableRegistry::new(&table.name));
            registry.update(snapshot);
            total += registry.len();
            global_metrics().set_specs_online(&table.name, registry.len() as u64);
        }

        info!(tables = table_confs.len(), specs = total, "refresh completed");
        total
    }

    /// Pull every active node's state and retire blocks whose spec is no
    /// longer desired. Returns the number of expired spec ids.
    pub async fn expire(&self, make: &ClientMaker) -> usize {
        let _cycle = self.cycle.lock().await;

        // empty specs are per-cycle knowledge; re-collected from node polls
        self.blocks.clear_empty_specs();

        let nodes = self.cluster.nodes();
        let mut num_expired = 0;
        for node in nodes.iter().filter(|n| n.active) {
            let client = make(node);
            if let Err(e) = client.update().await {
                warn!(node = %node.addr, error = %e, "node state pull failed; skipping node");
                continue;
            }

            let (expired, raw_bytes) = self.blocks.expire_node(&node.addr, |table, spec| {
                let guard = self.tables.read().expect("table registry lock");
                match guard.get(table) {
                    Some(registry) => !registry.online(spec),
                    None => true,
                }
            });

            if !expired.is_empty() {
                let count = expired.len();
                let task = Task::Expiration(BlockExpire::new(expired));
                let state =
                    send_task(client.as_ref(), &task, self.rpc_timeout(), self.config.rpc_retries)
                        .await;
                info!(
                    node = %node.addr,
                    specs = count,
                    state = state.as_str(),
                    "expiration task sent"
                );
                global_metrics().inc_specs_expired(&node.addr, count as u64);
                num_expired += count;
            }

            self.cluster.update_node_size(&node.addr, raw_bytes);
            global_metrics().set_node_bytes(&node.addr, raw_bytes);
        }

        num_expired
    }

    /// Place unassigned specs onto nodes and drive ingestion.
    ///
    /// Placement walks a round-robin cursor over nodes sorted
    /// least-loaded-first. A spec that claims a placement but shows up in
    /// neither the active nor the empty set was lost with its node and is
    /// reset for rescheduling. Returns `(tasks sent, nodes considered)`.
    pub async fn assign(&self, make: &ClientMaker) -> (usize, usize) {
        let _cycle = self.cycle.lock().await;

        let mut nodes = self.cluster.nodes();
        let size = nodes.len();
        if size == 0 {
            warn!("no nodes to assign specs");
            return (0, 0);
        }
        nodes.sort_by_key(|n| n.size_bytes);

        let empty_specs = self.blocks.empty_specs();
        let active_specs = self.blocks.active_specs(&nodes);

        let mut intents: Vec<SyncIntent> = Vec::new();
        let mut orphans = 0_u64;
        let mut idx = 0;
        {
            let mut guard = self.tables.write().expect("table registry lock");
            let mut table_names: Vec<String> = guard.keys().cloned().collect();
            table_names.sort();

            'tables: for name in table_names {
                let registry = guard.get_mut(&name).expect("registry present");
                for id in registry.ids() {
                    let spec = registry.get_mut(&id).expect("spec present");

                    // placed once, but no node currently holds or covers it
                    if spec.assigned()
                        && !active_specs.contains(&id)
                        && !empty_specs.contains(&id)
                    {
                        spec.reset();
                        orphans += 1;
                    }

                    if !spec.assigned() {
                        let start = idx;
                        loop {
                            if nodes[idx].active {
                                spec.place(&nodes[idx].addr);
                                idx = (idx + 1) % size;
                                break;
                            }
                            idx = (idx + 1) % size;
                            if idx == start {
                                error!("no active node found to assign a spec");
                                break 'tables;
                            }
                        }
                    }

                    if spec.need_sync() {
                        if let Some(addr) = spec.affinity() {
                            let node = nodes
                                .iter()
                                .find(|n| n.addr == addr)
                                .cloned()
                                .unwrap_or_else(|| WorkerNode::new(addr));
                            intents.push(SyncIntent {
                                table: name.clone(),
                                spec_id: id.clone(),
                                node,
                                task: Task::Ingestion(spec.clone()),
                            });
                        }
                    }
                }
            }
        }

        if orphans > 0 {
            info!(orphans, "reset lost specs for rescheduling");
            global_metrics().inc_orphans_reset(orphans);
        }

        let num_tasks = intents.len();
        for intent in intents {
            let client = make(&intent.node);
            let state = send_task(
                client.as_ref(),
                &intent.task,
                self.rpc_timeout(),
                self.config.rpc_retries,
            )
            .await;
            global_metrics().inc_ingest_task(&intent.node.addr, state.as_str());

            match state {
                TaskState::Succeeded => {
                    let mut guard = self.tables.write().expect("table registry lock");
                    if let Some(spec) = guard
                        .get_mut(&intent.table)
                        .and_then(|r| r.get_mut(&intent.spec_id))
                    {
                        spec.mark_ready();
                    }
                }
                state => {
                    warn!(
                        node = %intent.node.addr,
                        task = %intent.task.signature(),
                        state = state.as_str(),
                        "ingestion task not acknowledged; will retry next cycle"
                    );
                }
            }
        }

        (num_tasks, size)
    }

    /// One full reconciliation cycle.
    ///
    /// Expire runs before assign: orphan detection reads the node views the
    /// expire pass just pulled in.
    pub async fn run_cycle(&self, make: &ClientMaker) -> CycleStats {
        let specs = self.refresh().await;
        let expired = self.expire(make).await;
        let (tasks, nodes) = self.assign(make).await;
        CycleStats {
            specs,
            expired,
            tasks,
            nodes,
        }
    }

    /// Reset every spec whose affinity matches a dead address. Returns the
    /// number reset. Takes no cycle lock: callers (assign/expire paths and
    /// the membership-change handler) are already serialized.
    pub fn lost(&self, addr: &str) -> usize {
        let mut guard = self.tables.write().expect("table registry lock");
        let mut num = 0;
        for registry in guard.values_mut() {
            for spec in registry.specs_mut() {
                if spec.affinity() == Some(addr) {
                    spec.reset();
                    num += 1;
                }
            }
        }
        if num > 0 {
            global_metrics().inc_orphans_reset(num as u64);
        }
        num
    }

    /// Membership-change handler: reset the node's specs and drop its view.
    pub fn node_gone(&self, addr: &str) -> usize {
        let num = self.lost(addr);
        self.blocks.remove_node(addr);
        info!(node = %addr, specs = num, "node removed from placement");
        num
    }

    /// Total desired specs across all tables.
    pub fn num_specs(&self) -> usize {
        let guard = self.tables.read().expect("table registry lock");
        guard.values().map(TableRegistry::len).sum()
    }

    /// Whether a table's desired set currently carries this spec id.
    pub fn online(&self, table: &str, spec: &str) -> bool {
        let guard = self.tables.read().expect("table registry lock");
        guard.get(table).map(|r| r.online(spec)).unwrap_or(false)
    }

    /// Whether a spec reached `Ready` at its current version.
    pub fn ready(&self, table: &str, spec: &str) -> bool {
        let guard = self.tables.read().expect("table registry lock");
        guard
            .get(table)
            .and_then(|r| r.get(spec))
            .map(|s| s.state() == ember_meta::SpecState::Ready)
            .unwrap_or(false)
    }

    /// Placement of one spec, if any.
    pub fn affinity(&self, table: &str, spec: &str) -> Option<String> {
        let guard = self.tables.read().expect("table registry lock");
        guard
            .get(table)
            .and_then(|r| r.get(spec))
            .and_then(|s| s.affinity().map(str::to_string))
    }

    /// Sorted spec ids of one table. Empty when the table is unknown.
    pub fn spec_ids(&self, table: &str) -> Vec<String> {
        let guard = self.tables.read().expect("table registry lock");
        guard.get(table).map(|r| r.ids()).unwrap_or_default()
    }
}
