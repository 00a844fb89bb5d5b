//! Reward-Assignment Worker
//!
//! One worker invocation processes one (project, shard) pair end to end:
//! load the shard's stale history, join rewards onto decisions, write the
//! per-model training partitions, and only then delete the incoming
//! markers that triggered the pass.
//!
//! ## Failure discipline
//!
//! Marker deletion is the last step. Any earlier failure leaves the
//! markers in place, so the next dispatcher tick retries the shard; the
//! loader's message-id dedup makes the retry idempotent. A shard whose
//! stale payload exceeds the configured threshold is not processed at all:
//! it is escalated to the resharding subsystem and the markers survive
//! for the pass that runs against the new shard layout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use rewardflow_core::{CustomizationConfig, CustomizationHooks};
use rewardflow_storage::{
    HistoryLoader, RecordStore, RewardedDecisionWriter, RuntimeConfig, ShardRegistry, WriteStats,
};

use crate::builder::{build_rewarded_group, group_by_history_id};
use crate::error::{Error, Result};
use crate::launch::ReshardLauncher;
use crate::stale::{ReadAll, StaleObjectFilter};

/// Input handed to a worker by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerPayload {
    #[serde(default)]
    pub project_name: String,

    #[serde(default)]
    pub shard_id: String,

    /// Set by the dispatcher after it marks the shard; a worker invoked
    /// some other way re-marks before processing.
    #[serde(default)]
    pub last_processed_timestamp_updated: bool,
}

impl WorkerPayload {
    pub fn new(project: impl Into<String>, shard: impl Into<String>) -> Self {
        Self {
            project_name: project.into(),
            shard_id: shard.into(),
            last_processed_timestamp_updated: false,
        }
    }
}

/// What one worker invocation did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentSummary {
    /// The shard was escalated to resharding instead of processed.
    pub resharded: bool,
    /// No incoming markers were pending; nothing was read or written.
    pub no_op: bool,
    pub records: u64,
    pub duplicates: u64,
    pub groups: u64,
    pub failed_groups: u64,
    pub write_stats: Option<WriteStats>,
}

pub struct RewardAssignmentWorker {
    store: RecordStore,
    registry: ShardRegistry,
    loader: HistoryLoader,
    writer: RewardedDecisionWriter,
    hooks: Arc<dyn CustomizationHooks>,
    customization: Arc<CustomizationConfig>,
    runtime: RuntimeConfig,
    stale_filter: Arc<dyn StaleObjectFilter>,
    reshard: Arc<dyn ReshardLauncher>,
}

impl RewardAssignmentWorker {
    pub fn new(
        store: RecordStore,
        hooks: Arc<dyn CustomizationHooks>,
        customization: Arc<CustomizationConfig>,
        runtime: RuntimeConfig,
        reshard: Arc<dyn ReshardLauncher>,
    ) -> Self {
        Self {
            registry: ShardRegistry::new(store.clone()),
            loader: HistoryLoader::new(store.clone()),
            writer: RewardedDecisionWriter::new(
                store.clone(),
                hooks.clone(),
                customization.clone(),
            ),
            store,
            hooks,
            customization,
            runtime,
            stale_filter: Arc::new(ReadAll),
            reshard,
        }
    }

    /// Substitute the stale-object selection policy.
    pub fn with_stale_filter(mut self, filter: Arc<dyn StaleObjectFilter>) -> Self {
        self.stale_filter = filter;
        self
    }

    /// Run one reward-assignment pass.
    pub async fn assign_rewards(&self, payload: &WorkerPayload) -> Result<AssignmentSummary> {
        let project = payload.project_name.as_str();
        let shard = payload.shard_id.as_str();
        if project.is_empty() {
            return Err(Error::InvalidPayload("missing project_name".to_string()));
        }
        if shard.is_empty() {
            return Err(Error::InvalidPayload("missing shard_id".to_string()));
        }

        if !payload.last_processed_timestamp_updated {
            self.registry.update_last_processed(project, shard).await?;
        }

        let (objects, incoming) = tokio::try_join!(
            self.store.list_history_shard_objects(project, shard),
            self.store.list_incoming_marker_keys(project, shard),
        )?;

        if incoming.is_empty() {
            info!(project = %project, shard = %shard, "no incoming markers, nothing to do");
            return Ok(AssignmentSummary {
                no_op: true,
                ..AssignmentSummary::default()
            });
        }

        let stale = self.stale_filter.select(objects, &incoming);
        let payload_bytes: u64 = stale.iter().map(|o| o.size).sum();
        if payload_bytes > self.runtime.max_payload_bytes {
            warn!(
                project = %project,
                shard = %shard,
                payload_bytes,
                threshold = self.runtime.max_payload_bytes,
                "stale payload exceeds threshold, escalating to reshard"
            );
            self.reshard.start_reshard(project, shard).await?;
            return Ok(AssignmentSummary {
                resharded: true,
                ..AssignmentSummary::default()
            });
        }

        let loaded = self.loader.load_and_consolidate(&stale).await?;
        let records = self.hooks.modify_history_records(project, loaded.records)?;

        let window = self.customization.reward_window();
        let groups = group_by_history_id(&records);
        let mut summary = AssignmentSummary {
            records: records.len() as u64,
            duplicates: loaded.duplicates,
            groups: groups.len() as u64,
            ..AssignmentSummary::default()
        };

        let mut decisions = Vec::new();
        for (history_id, group_records) in &groups {
            match build_rewarded_group(
                project,
                history_id,
                group_records,
                self.hooks.as_ref(),
                window,
            ) {
                Ok(group_decisions) => decisions.extend(group_decisions),
                Err(source) => {
                    let err = Error::Group {
                        history_id: history_id.clone(),
                        source,
                    };
                    warn!(project = %project, shard = %shard, error = %err, "abandoning group");
                    summary.failed_groups += 1;
                }
            }
        }

        let stats = self.writer.write_all(project, shard, &decisions).await?;
        summary.write_stats = Some(stats);

        // Success: consume the markers so the next dispatch is a no-op.
        self.store.delete_keys(&incoming).await?;

        info!(
            project = %project,
            shard = %shard,
            records = summary.records,
            duplicates = summary.duplicates,
            groups = summary.groups,
            failed_groups = summary.failed_groups,
            markers_consumed = incoming.len(),
            "reward assignment pass complete"
        );
        Ok(summary)
    }
}
