//! Customization Hooks
//!
//! User-pluggable transforms the pipeline calls at fixed points. The six
//! hooks form one capability interface injected at construction; the core
//! never assumes a hook is pure, only that a returned `Err` is fatal to the
//! hook's current unit of work (the conversation group for builder-side
//! hooks, the whole pass for writer-side hooks).
//!
//! Hooks operate on raw `serde_json::Value` records so user code can carry
//! fields the core does not model. Fields the core owns (`timestamp`,
//! `history_id`, `type`) are re-stamped after
//! `action_records_from_history_record` returns: a hook cannot move a
//! decision in time, and a conflicting `history_id` abandons the group.

use serde_json::Value;

use crate::error::Result;

/// Capability interface for user-supplied transforms.
pub trait CustomizationHooks: Send + Sync {
    /// Name the model an action record should train, overriding the
    /// domain-based lookup. `None` keeps the configured mapping.
    fn model_name_for_action(&self, action: &Value) -> Result<Option<String>>;

    /// Rewrite the full set of loaded history records before grouping.
    /// The result replaces the loaded records.
    fn modify_history_records(&self, project: &str, records: Vec<Value>) -> Result<Vec<Value>>;

    /// Rewrite a single rewarded decision just before validation and write.
    fn modify_rewarded_action(&self, project: &str, rewarded: Value) -> Result<Value>;

    /// Derive the decision records for one history record. `inferred` holds
    /// the record itself (when typed as a decision) followed by its embedded
    /// `decisions`, in order. Return `None` to emit nothing.
    fn action_records_from_history_record(
        &self,
        project: &str,
        record: &Value,
        inferred: Vec<Value>,
    ) -> Result<Option<Vec<Value>>>;

    /// Derive the rewards record for one history record, or `None` when the
    /// record carries no rewards.
    fn rewards_record_from_history_record(
        &self,
        project: &str,
        record: &Value,
    ) -> Result<Option<Value>>;

    /// Resolve the project a dispatch event belongs to.
    fn project_name(&self, event: &Value) -> Result<Option<String>>;
}

/// The identity implementation: every hook is the obvious projection.
/// Used by the CLI when no customization module is configured, and by tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHooks;

impl CustomizationHooks for IdentityHooks {
    fn model_name_for_action(&self, _action: &Value) -> Result<Option<String>> {
        Ok(None)
    }

    fn modify_history_records(&self, _project: &str, records: Vec<Value>) -> Result<Vec<Value>> {
        Ok(records)
    }

    fn modify_rewarded_action(&self, _project: &str, rewarded: Value) -> Result<Value> {
        Ok(rewarded)
    }

    fn action_records_from_history_record(
        &self,
        _project: &str,
        _record: &Value,
        inferred: Vec<Value>,
    ) -> Result<Option<Vec<Value>>> {
        Ok(Some(inferred))
    }

    fn rewards_record_from_history_record(
        &self,
        _project: &str,
        record: &Value,
    ) -> Result<Option<Value>> {
        Ok(record.get("rewards").map(|_| record.clone()))
    }

    fn project_name(&self, event: &Value) -> Result<Option<String>> {
        Ok(event
            .get("project_name")
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_keeps_history_records() {
        let records = vec![json!({"a": 1}), json!({"b": 2})];
        let out = IdentityHooks
            .modify_history_records("p", records.clone())
            .unwrap();
        assert_eq!(out, records);
    }

    #[test]
    fn test_identity_keeps_inferred_decisions() {
        let inferred = vec![json!({"chosen": "A"})];
        let out = IdentityHooks
            .action_records_from_history_record("p", &json!({}), inferred.clone())
            .unwrap();
        assert_eq!(out, Some(inferred));
    }

    #[test]
    fn test_identity_rewards_record_present() {
        let record = json!({"rewards": {"reward": 1}, "history_id": "h"});
        let out = IdentityHooks
            .rewards_record_from_history_record("p", &record)
            .unwrap();
        assert_eq!(out, Some(record));
    }

    #[test]
    fn test_identity_rewards_record_absent() {
        let record = json!({"history_id": "h"});
        let out = IdentityHooks
            .rewards_record_from_history_record("p", &record)
            .unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn test_identity_project_name() {
        assert_eq!(
            IdentityHooks
                .project_name(&json!({"project_name": "messenger"}))
                .unwrap(),
            Some("messenger".to_string())
        );
        assert_eq!(IdentityHooks.project_name(&json!({})).unwrap(), None);
    }
}
