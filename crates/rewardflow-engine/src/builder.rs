//! Rewarded-Decision Builder
//!
//! Expands one conversation group's history records into decision and
//! rewards records, then runs the single-pass temporal join that
//! distributes each reward bundle across eligible, non-expired decisions
//! sharing a reward key.
//!
//! ## Expansion
//!
//! A history record contributes decisions two ways, and both at once is
//! legal: the record itself when `type == "decision"`, plus every element
//! of its `decisions` array. The combined sequence is offered to the
//! `action_records_from_history_record` hook; whatever comes back is
//! stamped with the outer record's identity (`timestamp`, `history_id`,
//! `message_id` with a `-{i}` suffix for i > 0), so a hook cannot move a
//! decision in time. A returned decision carrying a different `history_id`
//! abandons the whole group.
//!
//! ## Join
//!
//! Decisions and rewards merge into one sequence sorted ascending by
//! timestamp (stable, decisions first on ties). The walk keeps per-key
//! listener queues in insertion order; each rewards record credits every
//! still-live listener under its key and garbage-collects expired ones,
//! walking the queue in reverse so in-place removal is safe. Forward time
//! order makes the pass amortized linear.
//!
//! A reward at `t` credits a decision at `t_d` iff `t_d <= t < t_d + W`;
//! the window is half-open, so a reward landing exactly at `t_d + W` both
//! misses the decision and expires it.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use rewardflow_core::record::{history_id_of, message_id_of, timestamp_of};
use rewardflow_core::{
    numeric_reward, CustomizationHooks, DecisionRecord, Error, RewardsRecord, Result,
    DECISION_TYPE, DEFAULT_REWARD_KEY, REWARDS_TYPE,
};
use serde_json::Value;

/// Group raw records by `history_id`. Records without one collect under the
/// empty key, which the builder rejects as a failed group.
pub fn group_by_history_id(records: &[Value]) -> BTreeMap<String, Vec<Value>> {
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for record in records {
        let key = history_id_of(record).unwrap_or_default().to_string();
        groups.entry(key).or_default().push(record.clone());
    }
    groups
}

/// Build the rewarded decisions for one conversation group.
///
/// Any error is fatal to this group only; the caller skips the group and
/// continues the pass.
pub fn build_rewarded_group(
    project: &str,
    history_id: &str,
    records: &[Value],
    hooks: &dyn CustomizationHooks,
    window: Duration,
) -> Result<Vec<DecisionRecord>> {
    if history_id.is_empty() {
        return Err(Error::InvalidHistoryId);
    }

    let mut decisions: Vec<DecisionRecord> = Vec::new();
    let mut rewards: Vec<RewardsRecord> = Vec::new();

    for record in records {
        let (raw_timestamp, timestamp_date) = timestamp_of(record)?;
        let message_id = message_id_of(record)
            .ok_or(Error::InvalidMessageId)?
            .to_string();

        let kind = record.get("type").and_then(Value::as_str);
        if let Some(kind) = kind {
            if kind != DECISION_TYPE && kind != REWARDS_TYPE {
                return Err(Error::UnknownRecordType(kind.to_string()));
            }
        }

        let mut inferred: Vec<Value> = Vec::new();
        if kind == Some(DECISION_TYPE) {
            inferred.push(record.clone());
        }
        if let Some(embedded) = record.get("decisions") {
            let list = embedded.as_array().ok_or(Error::DecisionsNotArray)?;
            inferred.extend(list.iter().cloned());
        }

        let returned = hooks
            .action_records_from_history_record(project, record, inferred)?
            .unwrap_or_default();
        for (index, action) in returned.into_iter().enumerate() {
            decisions.push(stamp_decision(
                history_id,
                &message_id,
                &raw_timestamp,
                timestamp_date,
                index,
                action,
            )?);
        }

        if let Some(rewards_record) = hooks.rewards_record_from_history_record(project, record)? {
            let map = rewards_record
                .get("rewards")
                .and_then(Value::as_object)
                .cloned()
                .ok_or(Error::RewardsNotObject)?;
            for (key, value) in &map {
                numeric_reward(value).ok_or_else(|| Error::NonNumericReward(key.clone()))?;
            }
            rewards.push(RewardsRecord {
                history_id: history_id.to_string(),
                timestamp_date,
                rewards: map,
            });
        }
    }

    join_rewards(decisions, rewards, window)
}

/// Turn a hook-returned action into a decision record, re-stamping the
/// fields the pipeline owns.
fn stamp_decision(
    history_id: &str,
    message_id: &str,
    raw_timestamp: &str,
    timestamp_date: DateTime<Utc>,
    index: usize,
    action: Value,
) -> Result<DecisionRecord> {
    let action = action.as_object().ok_or(Error::ActionNotObject)?;

    if let Some(returned_history_id) = action.get("history_id").and_then(Value::as_str) {
        if returned_history_id != history_id {
            return Err(Error::HistoryIdMismatch {
                expected: history_id.to_string(),
                got: returned_history_id.to_string(),
            });
        }
    }

    let message_id = if index == 0 {
        message_id.to_string()
    } else {
        format!("{message_id}-{index}")
    };

    Ok(DecisionRecord {
        history_id: history_id.to_string(),
        message_id,
        timestamp: raw_timestamp.to_string(),
        timestamp_date,
        reward_key: action
            .get("reward_key")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_REWARD_KEY)
            .to_string(),
        reward: None,
        chosen: action.get("chosen").cloned(),
        context: action.get("context").cloned(),
        domain: action
            .get("domain")
            .and_then(Value::as_str)
            .map(str::to_string),
        propensity: action.get("propensity").and_then(Value::as_f64),
    })
}

enum JoinItem {
    Decision(usize),
    Rewards(usize),
}

/// The single-pass temporal join.
fn join_rewards(
    mut decisions: Vec<DecisionRecord>,
    rewards: Vec<RewardsRecord>,
    window: Duration,
) -> Result<Vec<DecisionRecord>> {
    if rewards.is_empty() {
        return Ok(decisions);
    }

    // Decisions go in first so a stable sort keeps them ahead of rewards
    // with the same timestamp.
    let mut merged: Vec<(DateTime<Utc>, JoinItem)> =
        Vec::with_capacity(decisions.len() + rewards.len());
    for (index, decision) in decisions.iter().enumerate() {
        merged.push((decision.timestamp_date, JoinItem::Decision(index)));
    }
    for (index, bundle) in rewards.iter().enumerate() {
        merged.push((bundle.timestamp_date, JoinItem::Rewards(index)));
    }
    merged.sort_by_key(|(timestamp, _)| *timestamp);

    let window_ends: Vec<DateTime<Utc>> = decisions
        .iter()
        .map(|d| d.timestamp_date + window)
        .collect();
    let mut listeners: HashMap<String, Vec<usize>> = HashMap::new();

    for (_, item) in merged {
        match item {
            JoinItem::Decision(index) => {
                listeners
                    .entry(decisions[index].reward_key.clone())
                    .or_default()
                    .push(index);
            }
            JoinItem::Rewards(reward_index) => {
                let bundle = &rewards[reward_index];
                for (key, value) in &bundle.rewards {
                    let Some(queue) = listeners.get_mut(key) else {
                        continue;
                    };
                    let amount =
                        numeric_reward(value).ok_or_else(|| Error::NonNumericReward(key.clone()))?;
                    // Reverse walk so in-place removal is safe.
                    for position in (0..queue.len()).rev() {
                        let decision_index = queue[position];
                        if bundle.timestamp_date >= window_ends[decision_index] {
                            // Expired: the walk is time-ordered, so this
                            // decision can never be credited again.
                            queue.remove(position);
                        } else {
                            let decision = &mut decisions[decision_index];
                            decision.reward = Some(decision.reward.unwrap_or(0.0) + amount);
                        }
                    }
                }
            }
        }
    }

    Ok(decisions)
}
