//! Coordinator-side node client seam.
//!
//! The transport is external; the reconciliation loop only sees this trait
//! plus a maker closure binding clients to pooled channels. An in-process
//! client backs single-binary deployments and tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use ember_common::{EmberError, Result};
use ember_meta::WorkerNode;

use crate::block_manager::BlockManager;
use crate::node_service::NodeService;
use crate::task::{BatchRows, QueryPlan, Task, TaskState};

/// Client bound to one worker node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Health check; echoes the given name back.
    async fn echo(&self, name: &str) -> Result<String>;

    /// Pull the node's state snapshot into the coordinator's block manager:
    /// table states are swapped in under the node's key and reported empty
    /// specs are recorded.
    async fn update(&self) -> Result<()>;

    /// Send one task. Failures surface as [`TaskState::Failed`], never as
    /// an error.
    async fn task(&self, task: &Task) -> TaskState;

    /// Fan one query fragment out to the node.
    async fn execute(&self, plan: &QueryPlan) -> Result<BatchRows>;
}

/// Factory binding a client to a node, typically over a pooled channel.
pub type ClientMaker = Arc<dyn Fn(&WorkerNode) -> Arc<dyn NodeClient> + Send + Sync>;

/// Send a task with the configured per-RPC timeout and retry budget.
///
/// A timed-out attempt counts as failed. `Queue` and `InProgress` replies
/// return immediately; the node owns the task from there.
pub async fn send_task(
    client: &dyn NodeClient,
    task: &Task,
    timeout: Duration,
    retries: u32,
) -> TaskState {
    let attempts = retries.max(1);
    for attempt in 1..=attempts {
        match tokio::time::timeout(timeout, client.task(task)).await {
            Ok(TaskState::Failed) => {
                warn!(task = %task.signature(), attempt, "task attempt failed");
            }
            Ok(state) => return state,
            Err(_) => {
                warn!(task = %task.signature(), attempt, "task attempt timed out");
            }
        }
    }
    TaskState::Failed
}

/// In-process client wiring a coordinator directly to a node service.
pub struct InProcessNodeClient {
    node: WorkerNode,
    coordinator: Arc<BlockManager>,
    service: Arc<NodeService>,
}

impl InProcessNodeClient {
    /// Bind a coordinator-side view to one in-process node service.
    pub fn new(node: WorkerNode, coordinator: Arc<BlockManager>, service: Arc<NodeService>) -> Self {
        Self {
            node,
            coordinator,
            service,
        }
    }
}

#[async_trait]
impl NodeClient for InProcessNodeClient {
    async fn echo(&self, name: &str) -> Result<String> {
        Ok(self.service.echo(name))
    }

    async fn update(&self) -> Result<()> {
        let snap = self.service.poll();
        self.coordinator.swap(&self.node.addr, snap.states);
        for spec in &snap.empty_specs {
            self.coordinator.record_empty_spec(spec);
        }
        Ok(())
    }

    async fn task(&self, task: &Task) -> TaskState {
        self.service.handle(task)
    }

    async fn execute(&self, _plan: &QueryPlan) -> Result<BatchRows> {
        Err(EmberError::Unsupported(
            "query execution is not wired for in-process nodes".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyClient {
        fail_first: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl NodeClient for FlakyClient {
        async fn echo(&self, name: &str) -> Result<String> {
            Ok(name.to_string())
        }

        async fn update(&self) -> Result<()> {
            Ok(())
        }

        async fn task(&self, _task: &Task) -> TaskState {
            use std::sync::atomic::Ordering;
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                TaskState::Failed
            } else {
                TaskState::Succeeded
            }
        }

        async fn execute(&self, _plan: &QueryPlan) -> Result<BatchRows> {
            Ok(BatchRows::default())
        }
    }

    #[tokio::test]
    async fn send_task_retries_through_transient_failures() {
        let client = FlakyClient {
            fail_first: std::sync::atomic::AtomicU32::new(2),
        };
        let task = Task::Expiration(Default::default());
        let state = send_task(&client, &task, Duration::from_secs(1), 3).await;
        assert_eq!(state, TaskState::Succeeded);
    }

    #[tokio::test]
    async fn send_task_gives_up_after_the_retry_budget() {
        let client = FlakyClient {
            fail_first: std::sync::atomic::AtomicU32::new(10),
        };
        let task = Task::Expiration(Default::default());
        let state = send_task(&client, &task, Duration::from_secs(1), 2).await;
        assert_eq!(state, TaskState::Failed);
    }
}
