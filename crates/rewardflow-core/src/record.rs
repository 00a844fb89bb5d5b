//! Record Model
//!
//! History records arrive from ingestion as one JSON object per line of a
//! gzip JSONL object. The raw shape is dynamic, so raw records are handled
//! as `serde_json::Value`; the accessor functions in this module pull out
//! the fields the pipeline needs and validate them.
//!
//! ## Shapes
//!
//! A history record carries:
//! - `timestamp`: ISO-8601 string, required, parseable
//! - `message_id`: non-empty string, unique within a shard's live set
//! - `history_id`: non-empty string, the conversation key
//! - `type`: optional, `"decision"` or `"rewards"`
//! - `decisions`: optional array of embedded decision records
//! - `rewards`: optional map of reward-key → number-or-bool
//!
//! The derived records ([`DecisionRecord`], [`RewardsRecord`]) live only for
//! the duration of one worker pass; [`RewardedDecision`] is the durable
//! output projection.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Record type tag for decisions.
pub const DECISION_TYPE: &str = "decision";

/// Record type tag for reward bundles.
pub const REWARDS_TYPE: &str = "rewards";

/// Reward key used when a decision does not name one.
pub const DEFAULT_REWARD_KEY: &str = "reward";

/// A decision awaiting reward credit during the temporal join.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub history_id: String,
    pub message_id: String,
    /// Original timestamp string, carried through to the output unmodified.
    pub timestamp: String,
    pub timestamp_date: DateTime<Utc>,
    pub reward_key: String,
    /// Accumulated reward. Absent until the first credit; additive after.
    pub reward: Option<f64>,
    pub chosen: Option<Value>,
    pub context: Option<Value>,
    pub domain: Option<String>,
    pub propensity: Option<f64>,
}

/// A bundle of reward values observed at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardsRecord {
    pub history_id: String,
    pub timestamp_date: DateTime<Utc>,
    pub rewards: serde_json::Map<String, Value>,
}

/// The output projection of a decision: exactly the eight fields downstream
/// training consumes, with absent optionals omitted from the JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardedDecision {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chosen: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub timestamp: String,
    pub message_id: String,
    pub history_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub propensity: Option<f64>,
}

impl From<&DecisionRecord> for RewardedDecision {
    fn from(d: &DecisionRecord) -> Self {
        Self {
            chosen: d.chosen.clone(),
            context: d.context.clone(),
            domain: d.domain.clone(),
            timestamp: d.timestamp.clone(),
            message_id: d.message_id.clone(),
            history_id: d.history_id.clone(),
            reward: d.reward,
            propensity: d.propensity,
        }
    }
}

/// Parse an ISO-8601 timestamp. Accepts an explicit offset (RFC 3339) or a
/// naive timestamp, which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::InvalidTimestamp(raw.to_string()))
}

/// Extract and parse the required `timestamp` field of a raw record.
pub fn timestamp_of(record: &Value) -> Result<(String, DateTime<Utc>)> {
    let raw = record
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidTimestamp(record.get("timestamp").map(|v| v.to_string()).unwrap_or_default()))?;
    let parsed = parse_timestamp(raw)?;
    Ok((raw.to_string(), parsed))
}

/// The `message_id` of a raw record, if present and a non-empty string.
pub fn message_id_of(record: &Value) -> Option<&str> {
    record
        .get("message_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// The `history_id` of a raw record, if present and a non-empty string.
pub fn history_id_of(record: &Value) -> Option<&str> {
    record
        .get("history_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Coerce a reward value to a number. Booleans count as 1/0; anything else
/// (including NaN/infinite numbers) is rejected.
pub fn numeric_reward(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) => Some(0.0),
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Validate a rewarded decision just before it is written.
///
/// Required: the value is a JSON object carrying a parseable `timestamp`
/// and non-empty `message_id` and `history_id` strings. `reward`, when
/// present, must be a finite number. Customization hooks run before this
/// check, so a hook cannot smuggle an invalid record past it.
pub fn assert_valid_rewarded_decision(record: &Value) -> Result<()> {
    let obj = record.as_object().ok_or(Error::RewardedDecisionNotObject)?;

    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or(Error::MissingRequiredField("timestamp"))?;
    parse_timestamp(timestamp)?;

    obj.get("message_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingRequiredField("message_id"))?;

    obj.get("history_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(Error::MissingRequiredField("history_id"))?;

    if let Some(reward) = obj.get("reward") {
        reward
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or(Error::NonFiniteReward)?;
    }

    // The projection drops `type`; a hook that reintroduces it may only
    // call the record what it is.
    if let Some(kind) = obj.get("type") {
        if kind.as_str() != Some(DECISION_TYPE) {
            return Err(Error::UnknownRecordType(kind.to_string()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ---------------------------------------------------------------
    // Timestamp parsing
    // ---------------------------------------------------------------

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let dt = parse_timestamp("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_with_offset() {
        let dt = parse_timestamp("2024-03-01T12:30:00+02:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        let dt = parse_timestamp("2024-03-01T12:30:00.250").unwrap();
        assert_eq!(dt.timestamp_millis() % 1000, 250);
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_timestamp_of_missing_field() {
        assert!(timestamp_of(&json!({"message_id": "m"})).is_err());
    }

    #[test]
    fn test_timestamp_of_non_string() {
        assert!(timestamp_of(&json!({"timestamp": 1700000000})).is_err());
    }

    // ---------------------------------------------------------------
    // Field accessors
    // ---------------------------------------------------------------

    #[test]
    fn test_message_id_of() {
        assert_eq!(message_id_of(&json!({"message_id": "m-1"})), Some("m-1"));
        assert_eq!(message_id_of(&json!({"message_id": ""})), None);
        assert_eq!(message_id_of(&json!({"message_id": 7})), None);
        assert_eq!(message_id_of(&json!({})), None);
    }

    #[test]
    fn test_history_id_of() {
        assert_eq!(history_id_of(&json!({"history_id": "h"})), Some("h"));
        assert_eq!(history_id_of(&json!({"history_id": ""})), None);
        assert_eq!(history_id_of(&json!({})), None);
    }

    // ---------------------------------------------------------------
    // Reward coercion
    // ---------------------------------------------------------------

    #[test]
    fn test_numeric_reward_booleans() {
        assert_eq!(numeric_reward(&json!(true)), Some(1.0));
        assert_eq!(numeric_reward(&json!(false)), Some(0.0));
    }

    #[test]
    fn test_numeric_reward_numbers() {
        assert_eq!(numeric_reward(&json!(1.5)), Some(1.5));
        assert_eq!(numeric_reward(&json!(-2)), Some(-2.0));
        assert_eq!(numeric_reward(&json!(0)), Some(0.0));
    }

    #[test]
    fn test_numeric_reward_rejects_non_numbers() {
        assert_eq!(numeric_reward(&json!("1.5")), None);
        assert_eq!(numeric_reward(&json!(null)), None);
        assert_eq!(numeric_reward(&json!([1])), None);
    }

    // ---------------------------------------------------------------
    // Output validation
    // ---------------------------------------------------------------

    fn valid_rewarded() -> Value {
        json!({
            "chosen": "A",
            "timestamp": "2024-03-01T00:00:00Z",
            "message_id": "m-1",
            "history_id": "h-1",
            "reward": 2.5,
        })
    }

    #[test]
    fn test_assert_valid_passes() {
        assert_valid_rewarded_decision(&valid_rewarded()).unwrap();
    }

    #[test]
    fn test_assert_valid_reward_absent_ok() {
        let mut v = valid_rewarded();
        v.as_object_mut().unwrap().remove("reward");
        assert_valid_rewarded_decision(&v).unwrap();
    }

    #[test]
    fn test_assert_valid_rejects_missing_message_id() {
        let mut v = valid_rewarded();
        v.as_object_mut().unwrap().remove("message_id");
        assert!(matches!(
            assert_valid_rewarded_decision(&v),
            Err(Error::MissingRequiredField("message_id"))
        ));
    }

    #[test]
    fn test_assert_valid_rejects_bad_timestamp() {
        let mut v = valid_rewarded();
        v["timestamp"] = json!("not-a-time");
        assert!(assert_valid_rewarded_decision(&v).is_err());
    }

    #[test]
    fn test_assert_valid_rejects_string_reward() {
        let mut v = valid_rewarded();
        v["reward"] = json!("2.5");
        assert!(matches!(
            assert_valid_rewarded_decision(&v),
            Err(Error::NonFiniteReward)
        ));
    }

    #[test]
    fn test_assert_valid_type_must_be_decision() {
        let mut v = valid_rewarded();
        v["type"] = json!("rewards");
        assert!(assert_valid_rewarded_decision(&v).is_err());
        v["type"] = json!("decision");
        assert_valid_rewarded_decision(&v).unwrap();
    }

    #[test]
    fn test_assert_valid_rejects_array() {
        assert!(matches!(
            assert_valid_rewarded_decision(&json!([1, 2])),
            Err(Error::RewardedDecisionNotObject)
        ));
    }

    // ---------------------------------------------------------------
    // Output projection
    // ---------------------------------------------------------------

    #[test]
    fn test_rewarded_decision_projection() {
        let d = DecisionRecord {
            history_id: "h".to_string(),
            message_id: "m".to_string(),
            timestamp: "2024-03-01T00:00:00Z".to_string(),
            timestamp_date: parse_timestamp("2024-03-01T00:00:00Z").unwrap(),
            reward_key: DEFAULT_REWARD_KEY.to_string(),
            reward: Some(1.0),
            chosen: Some(json!("A")),
            context: None,
            domain: Some("greetings".to_string()),
            propensity: Some(0.5),
        };
        let rewarded = RewardedDecision::from(&d);
        let v = serde_json::to_value(&rewarded).unwrap();
        assert_eq!(v["chosen"], json!("A"));
        assert_eq!(v["reward"], json!(1.0));
        assert_eq!(v["propensity"], json!(0.5));
        // absent optionals are omitted, not null
        assert!(v.get("context").is_none());
    }

    #[test]
    fn test_rewarded_decision_omits_absent_reward() {
        let d = DecisionRecord {
            history_id: "h".to_string(),
            message_id: "m".to_string(),
            timestamp: "2024-03-01T00:00:00Z".to_string(),
            timestamp_date: parse_timestamp("2024-03-01T00:00:00Z").unwrap(),
            reward_key: DEFAULT_REWARD_KEY.to_string(),
            reward: None,
            chosen: None,
            context: None,
            domain: None,
            propensity: None,
        };
        let v = serde_json::to_value(RewardedDecision::from(&d)).unwrap();
        assert!(v.get("reward").is_none());
        let fields: Vec<&String> = v.as_object().unwrap().keys().collect();
        assert_eq!(fields.len(), 3); // timestamp, message_id, history_id
    }
}
