//! In-memory cluster fixtures shared by reconciliation tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use ember_cluster::{
    BatchBlock, BlockLoader, BlockSignature, BlockManager, ClientMaker, InProcessNodeClient,
    NodeClient, NodeService, SpecProvider, SpecRepo, Task, TaskState,
};
use ember_common::{EmberError, Result, ServiceConfig};
use ember_meta::{ClusterConf, ClusterView, TableConf, WorkerNode};
use ember_storage::{FileInfo, FileSystem};

/// Filesystem stub: every listable path holds one fixed-signature file.
pub struct StubFs;

impl FileSystem for StubFs {
    fn list(&self, path: &str) -> Result<Vec<FileInfo>> {
        Ok(vec![FileInfo {
            is_dir: false,
            timestamp: 1_700_000_000,
            size: 100,
            name: format!("{path}/part-0"),
            domain: String::new(),
        }])
    }

    fn read(&self, _: &str, _: u64, _: usize, _: &mut [u8]) -> Result<usize> {
        Err(EmberError::Unsupported("read".to_string()))
    }

    fn info(&self, path: &str) -> Result<FileInfo> {
        Ok(self.list(path)?.remove(0))
    }

    fn copy(&self, _: &str, _: &str) -> Result<()> {
        Ok(())
    }

    fn sync(&self, _: &str, _: &str, _: bool) -> Result<()> {
        Ok(())
    }

    fn temp(&self, _: bool) -> Result<String> {
        Err(EmberError::Io(io::Error::new(
            io::ErrorKind::Unsupported,
            "temp",
        )))
    }

    fn rm(&self, _: &str) -> Result<()> {
        Ok(())
    }
}

/// Loader stub: one block per spec unless the path is marked empty.
pub struct StubLoader {
    pub empty_paths: HashSet<String>,
}

impl BlockLoader for StubLoader {
    fn load(&self, sign: &BlockSignature) -> Result<Vec<BatchBlock>> {
        if self.empty_paths.contains(&sign.path) {
            return Ok(Vec::new());
        }
        Ok(vec![BatchBlock {
            table: sign.table.clone(),
            spec: sign.spec.clone(),
            sequence: 0,
            start: 1_700_000_000,
            end: 1_700_000_000,
            rows: 10,
            raw_bytes: 1024,
            ..BatchBlock::default()
        }])
    }
}

struct LoggingClient {
    node: String,
    inner: Arc<dyn NodeClient>,
    log: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl NodeClient for LoggingClient {
    async fn echo(&self, name: &str) -> Result<String> {
        self.inner.echo(name).await
    }

    async fn update(&self) -> Result<()> {
        self.inner.update().await
    }

    async fn task(&self, task: &Task) -> TaskState {
        self.log
            .lock()
            .expect("task log lock")
            .push((self.node.clone(), task.signature()));
        self.inner.task(task).await
    }

    async fn execute(&self, plan: &ember_cluster::QueryPlan) -> Result<ember_cluster::BatchRows> {
        self.inner.execute(plan).await
    }
}

/// One coordinator plus in-process worker nodes.
pub struct Harness {
    pub cluster: Arc<ClusterView>,
    pub coordinator_blocks: Arc<BlockManager>,
    pub repo: SpecRepo,
    pub node_blocks: HashMap<String, Arc<BlockManager>>,
    pub task_log: Arc<Mutex<Vec<(String, String)>>>,
    services: HashMap<String, Arc<NodeService>>,
}

impl Harness {
    pub fn new(node_addrs: &[&str], tables: Vec<TableConf>, empty_paths: HashSet<String>) -> Self {
        let cluster = Arc::new(ClusterView::new(ClusterConf {
            version: 1,
            nodes: node_addrs.iter().map(|a| WorkerNode::new(a)).collect(),
            tables,
        }));
        let coordinator_blocks = Arc::new(BlockManager::new());

        let loader: Arc<dyn BlockLoader> = Arc::new(StubLoader { empty_paths });
        let mut node_blocks = HashMap::new();
        let mut services = HashMap::new();
        for addr in node_addrs {
            let blocks = Arc::new(BlockManager::new());
            let service = Arc::new(NodeService::new(Arc::clone(&blocks), Arc::clone(&loader)));
            node_blocks.insert(addr.to_string(), blocks);
            services.insert(addr.to_string(), service);
        }

        let config = ServiceConfig {
            rpc_timeout_secs: 5,
            rpc_retries: 1,
            ..ServiceConfig::default()
        };
        let repo = SpecRepo::new(
            Arc::clone(&cluster),
            Arc::clone(&coordinator_blocks),
            SpecProvider::with_filesystem(Arc::new(StubFs)),
            config,
        );

        Self {
            cluster,
            coordinator_blocks,
            repo,
            node_blocks,
            task_log: Arc::new(Mutex::new(Vec::new())),
            services,
        }
    }

    /// Client maker wiring each address to its in-process service, with
    /// task logging.
    pub fn maker(&self) -> ClientMaker {
        let services = self.services.clone();
        let coordinator = Arc::clone(&self.coordinator_blocks);
        let log = Arc::clone(&self.task_log);
        Arc::new(move |node: &WorkerNode| -> Arc<dyn NodeClient> {
            let service = services
                .get(&node.addr)
                .cloned()
                .expect("client maker asked for unknown node");
            let inner = Arc::new(InProcessNodeClient::new(
                node.clone(),
                Arc::clone(&coordinator),
                service,
            ));
            Arc::new(LoggingClient {
                node: node.addr.clone(),
                inner,
                log: Arc::clone(&log),
            })
        })
    }

    /// Tasks sent so far whose signature starts with the given prefix.
    pub fn tasks_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.task_log
            .lock()
            .expect("task log lock")
            .iter()
            .filter(|(_, sig)| sig.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn clear_task_log(&self) {
        self.task_log.lock().expect("task log lock").clear();
    }
}

/// Daily-partitioned table over the stub filesystem.
pub fn daily_table(name: &str, days: u64) -> TableConf {
    TableConf {
        name: name.to_string(),
        location: format!("mem://data/{name}/dt={{date}}"),
        retention_secs: days * 86_400,
        macro_values: Default::default(),
        options: Default::default(),
    }
}
