//! Launch Seams
//!
//! The dispatcher hands work to two external subsystems it never looks
//! inside: the asynchronous worker invocation mechanism and the resharding
//! subsystem. Both are trait objects so deployments can wire in their
//! transport of choice; delivery is fire-and-forget, at-least-once, and
//! the worker is idempotent to compensate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::Result;
use crate::worker::{RewardAssignmentWorker, WorkerPayload};

/// Enqueue an asynchronous worker invocation.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    async fn launch(&self, payload: WorkerPayload) -> Result<()>;
}

/// Hand a shard to the external resharding subsystem.
#[async_trait]
pub trait ReshardLauncher: Send + Sync {
    /// Ask for a parent→children split of an oversize shard.
    async fn start_reshard(&self, project: &str, shard: &str) -> Result<()>;

    /// Ask the subsystem to continue any unfinished splits.
    async fn continue_reshard(&self, project: &str, parents: &[String], force: bool) -> Result<()>;
}

/// Runs workers in-process on the current runtime, detached. Used by the
/// CLI; production deployments substitute their queueing transport.
pub struct SpawnWorkerLauncher {
    worker: Arc<RewardAssignmentWorker>,
}

impl SpawnWorkerLauncher {
    pub fn new(worker: Arc<RewardAssignmentWorker>) -> Self {
        Self { worker }
    }
}

#[async_trait]
impl WorkerLauncher for SpawnWorkerLauncher {
    async fn launch(&self, payload: WorkerPayload) -> Result<()> {
        let worker = self.worker.clone();
        tokio::spawn(async move {
            if let Err(err) = worker.assign_rewards(&payload).await {
                error!(
                    project = %payload.project_name,
                    shard = %payload.shard_id,
                    error = %err,
                    "reward-assignment worker failed"
                );
            }
        });
        Ok(())
    }
}

/// Records reshard requests in the log and succeeds. Stands in when no
/// resharding subsystem is deployed.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyReshardLauncher;

#[async_trait]
impl ReshardLauncher for LogOnlyReshardLauncher {
    async fn start_reshard(&self, project: &str, shard: &str) -> Result<()> {
        info!(project = %project, shard = %shard, "reshard requested");
        Ok(())
    }

    async fn continue_reshard(&self, project: &str, parents: &[String], force: bool) -> Result<()> {
        info!(
            project = %project,
            parents = ?parents,
            force = force,
            "reshard continuation requested"
        );
        Ok(())
    }
}
