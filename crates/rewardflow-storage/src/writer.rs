//! Rewarded-Decision Writer
//!
//! Projects joined decisions onto the output shape, runs the final
//! customization hook, validates, and flushes one gzip-JSONL object per
//! (project, model, shard, date) partition.
//!
//! Two records with identical partition coordinates always collate into the
//! same output object. Any validation or store failure aborts the whole
//! pass before incoming markers are touched, so the next dispatch retries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::try_join_all;
use rewardflow_core::{
    assert_valid_rewarded_decision, CustomizationConfig, CustomizationHooks, DecisionRecord,
    RewardedDecision,
};
use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::naming;
use crate::store::RecordStore;

/// Counts reported after a successful write pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteStats {
    /// Rewarded decisions emitted.
    pub total: u64,
    /// Emitted decisions carrying a non-zero reward.
    pub rewarded: u64,
    /// Largest reward observed, when any reward was credited.
    pub max_reward: Option<f64>,
    /// Mean over credited rewards, when any reward was credited.
    pub mean_reward: Option<f64>,
}

pub struct RewardedDecisionWriter {
    store: RecordStore,
    hooks: Arc<dyn CustomizationHooks>,
    customization: Arc<CustomizationConfig>,
}

impl RewardedDecisionWriter {
    pub fn new(
        store: RecordStore,
        hooks: Arc<dyn CustomizationHooks>,
        customization: Arc<CustomizationConfig>,
    ) -> Self {
        Self {
            store,
            hooks,
            customization,
        }
    }

    /// Partition and write all decisions of one pass.
    pub async fn write_all(
        &self,
        project: &str,
        shard: &str,
        decisions: &[DecisionRecord],
    ) -> Result<WriteStats> {
        // Domain resolutions repeat heavily within a pass; cache them for
        // the lifetime of this writer call only.
        let mut model_cache: HashMap<String, String> = HashMap::new();
        let mut partitions: BTreeMap<(String, NaiveDate), Vec<Value>> = BTreeMap::new();
        let mut stats = WriteStats::default();
        let mut reward_sum = 0.0;
        let mut reward_count = 0u64;

        for decision in decisions {
            let projected = serde_json::to_value(RewardedDecision::from(decision))?;
            let rewarded = self.hooks.modify_rewarded_action(project, projected)?;
            assert_valid_rewarded_decision(&rewarded)?;

            let model = self.resolve_model(project, decision, &rewarded, &mut model_cache)?;

            stats.total += 1;
            if let Some(reward) = decision.reward {
                reward_sum += reward;
                reward_count += 1;
                if reward != 0.0 {
                    stats.rewarded += 1;
                }
                stats.max_reward = Some(match stats.max_reward {
                    Some(max) if max >= reward => max,
                    _ => reward,
                });
            }

            partitions
                .entry((model, decision.timestamp_date.date_naive()))
                .or_default()
                .push(rewarded);
        }

        if reward_count > 0 {
            stats.mean_reward = Some(reward_sum / reward_count as f64);
        }

        try_join_all(partitions.iter().map(|((model, date), records)| {
            let key = naming::rewarded_decision_key(project, model, shard, *date);
            let store = self.store.clone();
            async move { store.put_json_lines(&key, records).await }
        }))
        .await?;

        info!(
            project = %project,
            shard = %shard,
            total = stats.total,
            rewarded = stats.rewarded,
            max_reward = ?stats.max_reward,
            mean_reward = ?stats.mean_reward,
            partitions = partitions.len(),
            "wrote rewarded decisions"
        );
        Ok(stats)
    }

    fn resolve_model(
        &self,
        project: &str,
        decision: &DecisionRecord,
        rewarded: &Value,
        cache: &mut HashMap<String, String>,
    ) -> Result<String> {
        // The hook names a model per action; only config lookups are cached.
        if let Some(named) = self.hooks.model_name_for_action(rewarded)? {
            return Ok(named);
        }

        let domain_key = decision
            .domain
            .clone()
            .unwrap_or_else(|| rewardflow_core::DEFAULT_MODEL_DOMAIN.to_string());
        if let Some(model) = cache.get(&domain_key) {
            return Ok(model.clone());
        }
        let model = self
            .customization
            .model_for_domain(project, decision.domain.as_deref())?
            .to_string();
        cache.insert(domain_key, model.clone());
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use rewardflow_core::{parse_timestamp, IdentityHooks, DEFAULT_REWARD_KEY};
    use serde_json::json;

    fn config() -> Arc<CustomizationConfig> {
        Arc::new(
            CustomizationConfig::from_json(
                r#"{
                    "reward_window_in_seconds": 100,
                    "projects": {
                        "messenger": {
                            "models": {
                                "default": "messenger-v3",
                                "greetings": "greetings-v1"
                            }
                        }
                    }
                }"#,
            )
            .unwrap(),
        )
    }

    fn writer_and_store() -> (RewardedDecisionWriter, RecordStore) {
        let store = RecordStore::new(Arc::new(InMemory::new()));
        let writer = RewardedDecisionWriter::new(
            store.clone(),
            Arc::new(IdentityHooks),
            config(),
        );
        (writer, store)
    }

    fn decision(message_id: &str, domain: Option<&str>, reward: Option<f64>) -> DecisionRecord {
        DecisionRecord {
            history_id: "h".to_string(),
            message_id: message_id.to_string(),
            timestamp: "2024-03-01T00:00:00Z".to_string(),
            timestamp_date: parse_timestamp("2024-03-01T00:00:00Z").unwrap(),
            reward_key: DEFAULT_REWARD_KEY.to_string(),
            reward,
            chosen: Some(json!("A")),
            context: None,
            domain: domain.map(str::to_string),
            propensity: None,
        }
    }

    #[tokio::test]
    async fn test_write_partitions_by_model_and_date() {
        let (writer, store) = writer_and_store();
        let decisions = vec![
            decision("m1", None, Some(1.0)),
            decision("m2", Some("greetings"), None),
        ];
        let stats = writer
            .write_all("messenger", "0", &decisions)
            .await
            .unwrap();
        assert_eq!(stats.total, 2);

        let default_model = store
            .list_keys("rewarded_decisions/messenger/messenger-v3/0")
            .await
            .unwrap();
        let greetings_model = store
            .list_keys("rewarded_decisions/messenger/greetings-v1/0")
            .await
            .unwrap();
        assert_eq!(default_model.len(), 1);
        assert_eq!(greetings_model.len(), 1);
    }

    #[tokio::test]
    async fn test_same_coordinates_collate() {
        let (writer, store) = writer_and_store();
        let decisions = vec![
            decision("m1", None, Some(1.0)),
            decision("m2", None, Some(2.0)),
        ];
        writer
            .write_all("messenger", "0", &decisions)
            .await
            .unwrap();

        let keys = store
            .list_keys("rewarded_decisions/messenger/messenger-v3/0")
            .await
            .unwrap();
        assert_eq!(keys.len(), 1);
        let records = store.get_json_lines(&keys[0]).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let (writer, _) = writer_and_store();
        let decisions = vec![
            decision("m1", None, Some(2.0)),
            decision("m2", None, Some(0.0)),
            decision("m3", None, Some(4.0)),
            decision("m4", None, None),
        ];
        let stats = writer
            .write_all("messenger", "0", &decisions)
            .await
            .unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.rewarded, 2);
        assert_eq!(stats.max_reward, Some(4.0));
        assert_eq!(stats.mean_reward, Some(2.0));
    }

    #[tokio::test]
    async fn test_stats_no_rewards() {
        let (writer, _) = writer_and_store();
        let stats = writer
            .write_all("messenger", "0", &[decision("m1", None, None)])
            .await
            .unwrap();
        assert_eq!(stats.rewarded, 0);
        assert_eq!(stats.max_reward, None);
        assert_eq!(stats.mean_reward, None);
    }

    #[tokio::test]
    async fn test_output_fields_projection() {
        let (writer, store) = writer_and_store();
        writer
            .write_all("messenger", "0", &[decision("m1", None, Some(1.5))])
            .await
            .unwrap();
        let keys = store
            .list_keys("rewarded_decisions/messenger/messenger-v3/0")
            .await
            .unwrap();
        let records = store.get_json_lines(&keys[0]).await.unwrap();
        let record = records[0].as_object().unwrap();
        assert_eq!(record["chosen"], json!("A"));
        assert_eq!(record["reward"], json!(1.5));
        assert_eq!(record["message_id"], json!("m1"));
        assert_eq!(record["history_id"], json!("h"));
        // absent optionals omitted
        assert!(!record.contains_key("context"));
        assert!(!record.contains_key("domain"));
        assert!(!record.contains_key("propensity"));
    }

    #[tokio::test]
    async fn test_hook_failure_is_fatal_and_writes_nothing() {
        struct FailingHooks;
        impl CustomizationHooks for FailingHooks {
            fn model_name_for_action(&self, _: &Value) -> rewardflow_core::Result<Option<String>> {
                Ok(None)
            }
            fn modify_history_records(
                &self,
                _: &str,
                records: Vec<Value>,
            ) -> rewardflow_core::Result<Vec<Value>> {
                Ok(records)
            }
            fn modify_rewarded_action(
                &self,
                _: &str,
                _: Value,
            ) -> rewardflow_core::Result<Value> {
                Err(rewardflow_core::Error::Hook("boom".to_string()))
            }
            fn action_records_from_history_record(
                &self,
                _: &str,
                _: &Value,
                inferred: Vec<Value>,
            ) -> rewardflow_core::Result<Option<Vec<Value>>> {
                Ok(Some(inferred))
            }
            fn rewards_record_from_history_record(
                &self,
                _: &str,
                _: &Value,
            ) -> rewardflow_core::Result<Option<Value>> {
                Ok(None)
            }
            fn project_name(&self, _: &Value) -> rewardflow_core::Result<Option<String>> {
                Ok(None)
            }
        }

        let store = RecordStore::new(Arc::new(InMemory::new()));
        let writer =
            RewardedDecisionWriter::new(store.clone(), Arc::new(FailingHooks), config());
        let result = writer
            .write_all("messenger", "0", &[decision("m1", None, None)])
            .await;
        assert!(result.is_err());
        assert!(store
            .list_keys("rewarded_decisions")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_project_is_fatal() {
        let (writer, _) = writer_and_store();
        let result = writer.write_all("nope", "0", &[decision("m1", None, None)]).await;
        assert!(result.is_err());
    }
}
