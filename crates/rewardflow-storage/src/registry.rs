//! Shard Registry
//!
//! Tracks when each (project, shard) pair was last handed to a
//! reward-assignment worker, and classifies shards by their resharding
//! state.
//!
//! ## Last-processed fan-in
//!
//! Every update writes a fresh single-entry registry object instead of
//! read-modify-writing a shared one, so concurrent writers never clobber
//! each other. Loading merges all registry objects taking the per-shard
//! **maximum** timestamp, and collapses a multi-object registry back to a
//! single consolidated object (write first, delete originals after).
//!
//! ## Shard classification
//!
//! Shard ids are binary prefix strings (`"0"`, `"01"`, ...). Resharding
//! splits shard `s` into `s0` and `s1`, and parent and children coexist
//! while the split runs. Classification is purely prefix-based:
//!
//! - a shard with a listed proper-prefix ancestor is a *resharding child*
//! - a shard some listed shard descends from is a *resharding parent*
//! - everything else is *stable*
//!
//! A mid-chain shard (both ancestor and descendant) counts as a child: it
//! is itself still being filled by a split. Only stable shards are
//! eligible for reward assignment.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::naming;
use crate::store::RecordStore;

/// Shards grouped by resharding state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShardGroups {
    pub parents: Vec<String>,
    pub children: Vec<String>,
    pub stable: Vec<String>,
}

/// Classify shards by prefix relations. Deterministic and invariant under
/// input order; the output vectors are sorted.
pub fn group_shards(shards: &[String]) -> ShardGroups {
    let mut sorted: Vec<String> = shards.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut groups = ShardGroups::default();
    for shard in &sorted {
        let has_ancestor = sorted
            .iter()
            .any(|other| other != shard && shard.starts_with(other.as_str()));
        let has_descendant = sorted
            .iter()
            .any(|other| other != shard && other.starts_with(shard.as_str()));

        if has_ancestor {
            groups.children.push(shard.clone());
        } else if has_descendant {
            groups.parents.push(shard.clone());
        } else {
            groups.stable.push(shard.clone());
        }
    }
    groups
}

/// Persisted per-shard last-processed timestamps.
#[derive(Clone)]
pub struct ShardRegistry {
    store: RecordStore,
}

impl ShardRegistry {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Read every registry object for a project and merge them, taking the
    /// per-shard maximum timestamp. When more than one object contributed,
    /// write one consolidated object and delete the originals.
    pub async fn load_and_consolidate(
        &self,
        project: &str,
    ) -> Result<HashMap<String, DateTime<Utc>>> {
        let keys = self.store.list_keys(&naming::registry_prefix(project)).await?;

        let mut merged: HashMap<String, DateTime<Utc>> = HashMap::new();
        for key in &keys {
            let value = self.store.get_json(key).await?;
            let Some(entries) = value.as_object() else {
                warn!(key = %key, "registry object is not a JSON object, skipping");
                continue;
            };
            for (shard, raw) in entries {
                let Some(parsed) = raw
                    .as_str()
                    .and_then(|s| rewardflow_core::parse_timestamp(s).ok())
                else {
                    warn!(key = %key, shard = %shard, "unparseable registry timestamp, skipping");
                    continue;
                };
                merged
                    .entry(shard.clone())
                    .and_modify(|existing| {
                        if parsed > *existing {
                            *existing = parsed;
                        }
                    })
                    .or_insert(parsed);
            }
        }

        if keys.len() > 1 {
            let consolidated: serde_json::Map<String, Value> = merged
                .iter()
                .map(|(shard, ts)| (shard.clone(), Value::String(ts.to_rfc3339())))
                .collect();
            self.store
                .put_json(
                    &naming::new_registry_key(project),
                    &Value::Object(consolidated),
                )
                .await?;
            self.store.delete_keys(&keys).await?;
            debug!(
                project = %project,
                collapsed = keys.len(),
                "consolidated shard registry"
            );
        }

        Ok(merged)
    }

    /// Record that a shard was just handed to a worker.
    pub async fn update_last_processed(&self, project: &str, shard: &str) -> Result<()> {
        let entry = serde_json::json!({ shard: Utc::now().to_rfc3339() });
        self.store
            .put_json(&naming::new_registry_key(project), &entry)
            .await
    }
}
