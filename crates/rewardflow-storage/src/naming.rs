//! Key Layout
//!
//! Pure functions mapping logical identifiers (project, shard, history id,
//! date) to storage keys and back. The mapping is injective: two distinct
//! logical coordinates never collide on a key, and a key parses back to the
//! coordinates that produced it.
//!
//! History objects are partitioned by UTC calendar date; keys sharing a
//! date path are consolidation candidates.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const HISTORIES_PREFIX: &str = "histories";
pub const INCOMING_PREFIX: &str = "incoming";
pub const REGISTRY_PREFIX: &str = "registry";
pub const REWARDED_DECISIONS_PREFIX: &str = "rewarded_decisions";

pub const HISTORY_SUFFIX: &str = ".jsonl.gz";
pub const CONSOLIDATED_FILE_NAME: &str = "consolidated.jsonl.gz";

/// `histories/{project}/{shard}`
pub fn history_shard_prefix(project: &str, shard: &str) -> String {
    format!("{HISTORIES_PREFIX}/{project}/{shard}")
}

/// A fresh history object key under the given shard and date.
pub fn new_history_key(project: &str, shard: &str, date: DateTime<Utc>) -> String {
    format!(
        "{HISTORIES_PREFIX}/{project}/{shard}/{}/{}{HISTORY_SUFFIX}",
        date_path(date.date_naive()),
        Uuid::new_v4()
    )
}

/// `incoming/{project}/{shard}`
pub fn incoming_shard_prefix(project: &str, shard: &str) -> String {
    format!("{INCOMING_PREFIX}/{project}/{shard}")
}

/// The marker key signalling that a history object needs (re)processing.
/// Derived from the history key so ingestion retries land on the same
/// marker instead of accumulating duplicates.
pub fn incoming_history_key(history_key: &str) -> Result<String> {
    let (project, shard, _, file) = split_history_key(history_key)?;
    let stem = file
        .strip_suffix(HISTORY_SUFFIX)
        .ok_or_else(|| Error::InvalidKey(history_key.to_string()))?;
    Ok(format!("{INCOMING_PREFIX}/{project}/{shard}/{stem}.json"))
}

/// `registry/{project}`
pub fn registry_prefix(project: &str) -> String {
    format!("{REGISTRY_PREFIX}/{project}")
}

/// A fresh registry object key. Each last-processed update writes its own
/// object; consolidation collapses them.
pub fn new_registry_key(project: &str) -> String {
    format!("{REGISTRY_PREFIX}/{project}/{}.json", Uuid::new_v4())
}

/// A fresh rewarded-decision output key for one (project, model, shard,
/// date) partition.
pub fn rewarded_decision_key(project: &str, model: &str, shard: &str, date: NaiveDate) -> String {
    format!(
        "{REWARDED_DECISIONS_PREFIX}/{project}/{model}/{shard}/{}/{}{HISTORY_SUFFIX}",
        date_path(date),
        Uuid::new_v4()
    )
}

/// `YYYY/MM/DD`
pub fn date_path(date: NaiveDate) -> String {
    date.format("%Y/%m/%d").to_string()
}

/// Whether a key names a history object.
pub fn is_history_key(key: &str) -> bool {
    split_history_key(key).is_ok()
}

/// The `YYYY/MM/DD` segment of a history key.
pub fn date_path_of(key: &str) -> Result<String> {
    let (_, _, date, _) = split_history_key(key)?;
    Ok(date)
}

/// Group history keys by their calendar-date path. Non-history keys are
/// rejected rather than silently dropped.
pub fn group_history_keys_by_date_path(
    keys: &[String],
) -> Result<BTreeMap<String, Vec<String>>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for key in keys {
        groups
            .entry(date_path_of(key)?)
            .or_default()
            .push(key.clone());
    }
    for group in groups.values_mut() {
        group.sort();
    }
    Ok(groups)
}

/// The canonical consolidated key for the date path a history key lives in.
pub fn consolidated_history_key(any_key_from_group: &str) -> Result<String> {
    let (dir, _) = any_key_from_group
        .rsplit_once('/')
        .ok_or_else(|| Error::InvalidKey(any_key_from_group.to_string()))?;
    // Validate before rewriting so arbitrary keys don't round-trip.
    split_history_key(any_key_from_group)?;
    Ok(format!("{dir}/{CONSOLIDATED_FILE_NAME}"))
}

/// Split `histories/{project}/{shard}/{YYYY}/{MM}/{DD}/{file}.jsonl.gz`.
fn split_history_key(key: &str) -> Result<(String, String, String, String)> {
    let parts: Vec<&str> = key.split('/').collect();
    let invalid = || Error::InvalidKey(key.to_string());

    if parts.len() != 7 || parts[0] != HISTORIES_PREFIX {
        return Err(invalid());
    }
    let [project, shard, year, month, day, file] = [
        parts[1], parts[2], parts[3], parts[4], parts[5], parts[6],
    ];
    if project.is_empty() || shard.is_empty() {
        return Err(invalid());
    }
    let all_digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(year, 4) || !all_digits(month, 2) || !all_digits(day, 2) {
        return Err(invalid());
    }
    if !file.ends_with(HISTORY_SUFFIX) {
        return Err(invalid());
    }
    Ok((
        project.to_string(),
        shard.to_string(),
        format!("{year}/{month}/{day}"),
        file.to_string(),
    ))
}
