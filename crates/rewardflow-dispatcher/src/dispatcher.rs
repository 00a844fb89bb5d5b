//! Dispatch Control Loop
//!
//! One invocation walks every configured project:
//!
//! 1. List the project's shards and load the last-processed registry,
//!    concurrently. Projects without shards are skipped.
//! 2. Classify shards into resharding parents, resharding children and
//!    stable shards.
//! 3. Concurrently, hand unfinished parents back to the resharding
//!    subsystem and run the assign-rewards gate over the stable set.
//!
//! The gate orders incoming shards oldest-last-processed first so no shard
//! starves, spends a bounded worker budget, and for each selected shard
//! marks the registry and enqueues the worker together. Mark-first
//! ordering keeps the window for a duplicate dispatch as small as the
//! storage round-trip.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rewardflow_core::CustomizationConfig;
use rewardflow_engine::{ReshardLauncher, WorkerLauncher, WorkerPayload};
use rewardflow_storage::{group_shards, RecordStore, RuntimeConfig, ShardRegistry};

use crate::error::Result;

/// Input to one dispatcher invocation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// Ignore the worker budget, cool-downs and resharding suppression.
    #[serde(default)]
    pub force_processing: bool,

    /// Passed through to the resharding subsystem when parents exist.
    #[serde(default)]
    pub force_continue_reshard: bool,
}

/// Counts for one dispatcher invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub projects: u64,
    pub failed_projects: u64,
    pub workers_dispatched: u64,
}

pub struct Dispatcher {
    store: RecordStore,
    registry: ShardRegistry,
    customization: Arc<CustomizationConfig>,
    runtime: RuntimeConfig,
    workers: Arc<dyn WorkerLauncher>,
    reshard: Arc<dyn ReshardLauncher>,
}

impl Dispatcher {
    pub fn new(
        store: RecordStore,
        customization: Arc<CustomizationConfig>,
        runtime: RuntimeConfig,
        workers: Arc<dyn WorkerLauncher>,
        reshard: Arc<dyn ReshardLauncher>,
    ) -> Self {
        Self {
            registry: ShardRegistry::new(store.clone()),
            store,
            customization,
            runtime,
            workers,
            reshard,
        }
    }

    /// Run one control-loop tick over all projects.
    ///
    /// A failing project is logged and does not stop the others; only the
    /// per-project counts make it into the returned stats.
    pub async fn dispatch_reward_assignment_workers(
        &self,
        event: &DispatchEvent,
    ) -> Result<DispatchStats> {
        let projects = self.customization.all_projects();
        let results = join_all(
            projects
                .iter()
                .map(|project| self.dispatch_project(project, event)),
        )
        .await;

        let mut stats = DispatchStats::default();
        for (project, result) in projects.iter().zip(results) {
            match result {
                Ok(dispatched) => {
                    stats.projects += 1;
                    stats.workers_dispatched += dispatched;
                }
                Err(error) => {
                    warn!(project = %project, error = %error, "project dispatch failed");
                    stats.failed_projects += 1;
                }
            }
        }

        info!(
            projects = stats.projects,
            failed_projects = stats.failed_projects,
            workers_dispatched = stats.workers_dispatched,
            "dispatch tick complete"
        );
        Ok(stats)
    }

    async fn dispatch_project(&self, project: &str, event: &DispatchEvent) -> Result<u64> {
        let (mut shards, last_processed) = tokio::try_join!(
            async { self.store.list_all_shards(project).await.map_err(crate::Error::from) },
            async {
                self.registry
                    .load_and_consolidate(project)
                    .await
                    .map_err(crate::Error::from)
            },
        )?;

        if shards.is_empty() {
            debug!(project = %project, "no shards, skipping project");
            return Ok(0);
        }
        shards.sort();

        let groups = group_shards(&shards);
        let stable: HashSet<String> = groups.stable.iter().cloned().collect();

        let (reshard_result, gate_result) = tokio::join!(
            self.continue_unfinished_resharding(
                project,
                &groups.parents,
                event.force_continue_reshard
            ),
            self.dispatch_assign_rewards_if_necessary(
                project,
                &stable,
                &last_processed,
                event.force_processing
            ),
        );
        reshard_result?;
        gate_result
    }

    async fn continue_unfinished_resharding(
        &self,
        project: &str,
        parents: &[String],
        force: bool,
    ) -> Result<()> {
        if parents.is_empty() {
            return Ok(());
        }
        debug!(project = %project, parents = ?parents, "continuing unfinished resharding");
        self.reshard
            .continue_reshard(project, parents, force)
            .await?;
        Ok(())
    }

    async fn dispatch_assign_rewards_if_necessary(
        &self,
        project: &str,
        stable: &HashSet<String>,
        last_processed: &HashMap<String, DateTime<Utc>>,
        force_processing: bool,
    ) -> Result<u64> {
        let incoming = self
            .store
            .list_all_incoming_history_shards(project)
            .await?;

        // Oldest last-processed first; never-processed shards sort to the
        // front at epoch 0. Ties break on shard id to stay deterministic.
        let mut queue: Vec<(String, DateTime<Utc>)> = incoming
            .into_iter()
            .map(|shard| {
                let last = last_processed
                    .get(&shard)
                    .copied()
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
                (shard, last)
            })
            .collect();
        queue.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        let mut remaining_workers = i64::from(self.runtime.worker_count.max(1));
        let wait = self.runtime.reprocess_wait();
        let now = Utc::now();
        let mut dispatched = 0u64;

        for (shard, last) in queue {
            if !force_processing {
                if remaining_workers <= 0 {
                    debug!(project = %project, shard = %shard, "worker budget exhausted, skipping");
                    continue;
                }
                if !stable.contains(&shard) {
                    debug!(project = %project, shard = %shard, "shard is resharding, skipping");
                    continue;
                }
                if now - last < wait {
                    debug!(project = %project, shard = %shard, "shard in cool-down, skipping");
                    continue;
                }
            }
            remaining_workers -= 1;

            let payload = WorkerPayload {
                project_name: project.to_string(),
                shard_id: shard.clone(),
                last_processed_timestamp_updated: true,
            };
            // Mark first, then dispatch: the paired operations keep the
            // window for a double-fire down to one storage round-trip.
            let (marked, launched) = tokio::join!(
                self.registry.update_last_processed(project, &shard),
                self.workers.launch(payload),
            );
            marked?;
            launched?;
            dispatched += 1;
            info!(project = %project, shard = %shard, "dispatched reward-assignment worker");
        }

        Ok(dispatched)
    }
}
