//! History Loader
//!
//! Loads all stale history objects for one shard, drops duplicate records
//! by `message_id`, and coalesces many small objects sharing a date path
//! into one consolidated object.
//!
//! ## Dedup
//!
//! The `message_id` set is tracked for the whole pass. A record whose
//! `message_id` is missing or already seen is dropped and counted; this is
//! tolerated, not an error, and it is what makes worker retries idempotent.
//!
//! ## Consolidation
//!
//! When a date path holds more than one object, the surviving records for
//! that path are written to the canonical `consolidated.jsonl.gz` key and
//! the originals deleted afterwards. Individual record contents are never
//! altered; only duplicates vanish. Date paths are processed in calendar
//! order with the reads inside each path issued concurrently, so the load
//! order (and therefore which duplicate survives) is deterministic.

use std::collections::HashSet;

use futures::future::try_join_all;
use rewardflow_core::record::message_id_of;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::naming;
use crate::store::{RecordStore, StoredObject};

/// Result of loading a shard's stale history.
#[derive(Debug, Default)]
pub struct LoadedHistory {
    /// Surviving records in load order.
    pub records: Vec<Value>,
    /// Records dropped for a missing or repeated `message_id`.
    pub duplicates: u64,
    /// Number of date paths collapsed into a consolidated object.
    pub consolidated_paths: u64,
}

#[derive(Clone)]
pub struct HistoryLoader {
    store: RecordStore,
}

impl HistoryLoader {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Load, dedup and consolidate the given history objects.
    pub async fn load_and_consolidate(&self, objects: &[StoredObject]) -> Result<LoadedHistory> {
        let keys: Vec<String> = objects.iter().map(|o| o.key.clone()).collect();
        let groups = naming::group_history_keys_by_date_path(&keys)?;

        let mut loaded = LoadedHistory::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (date_path, group_keys) in &groups {
            let reads = try_join_all(
                group_keys
                    .iter()
                    .map(|key| self.store.get_json_lines(key)),
            )
            .await?;

            let mut group_records: Vec<Value> = Vec::new();
            for record in reads.into_iter().flatten() {
                match message_id_of(&record) {
                    Some(id) if !seen.contains(id) => {
                        seen.insert(id.to_string());
                        group_records.push(record);
                    }
                    _ => loaded.duplicates += 1,
                }
            }

            if group_keys.len() > 1 {
                let consolidated_key = naming::consolidated_history_key(&group_keys[0])?;
                self.store
                    .put_json_lines(&consolidated_key, &group_records)
                    .await?;
                let originals: Vec<String> = group_keys
                    .iter()
                    .filter(|key| **key != consolidated_key)
                    .cloned()
                    .collect();
                self.store.delete_keys(&originals).await?;
                loaded.consolidated_paths += 1;
                debug!(
                    date_path = %date_path,
                    objects = group_keys.len(),
                    records = group_records.len(),
                    "consolidated history date path"
                );
            }

            loaded.records.extend(group_records);
        }

        info!(
            records = loaded.records.len(),
            duplicates = loaded.duplicates,
            consolidated_paths = loaded.consolidated_paths,
            "loaded shard history"
        );
        Ok(loaded)
    }
}
