//! Error Types for Rewardflow Core
//!
//! Record-level validation failures are *fatal to the group* (one
//! `history_id` within one pass): the worker logs them and continues with
//! the remaining conversation groups. Configuration and output-validation
//! failures are fatal to the whole pass; the split is made by the caller,
//! not encoded here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("missing or empty message_id")]
    InvalidMessageId,

    #[error("missing or empty history_id")]
    InvalidHistoryId,

    #[error("history_id mismatch: expected {expected:?}, got {got:?}")]
    HistoryIdMismatch { expected: String, got: String },

    #[error("'decisions' must be an array")]
    DecisionsNotArray,

    #[error("'rewards' must be an object")]
    RewardsNotObject,

    #[error("reward value for key {0:?} is not a number or boolean")]
    NonNumericReward(String),

    #[error("unknown record type: {0:?}")]
    UnknownRecordType(String),

    #[error("inferred decision is not a JSON object")]
    ActionNotObject,

    #[error("rewarded decision is not a JSON object")]
    RewardedDecisionNotObject,

    #[error("rewarded decision missing required field {0:?}")]
    MissingRequiredField(&'static str),

    #[error("rewarded decision reward is not a finite number")]
    NonFiniteReward,

    #[error("unknown project: {0:?}")]
    UnknownProject(String),

    #[error("no model configured for project {project:?} and domain {domain:?}")]
    NoModelForDomain { project: String, domain: String },

    #[error("invalid customization config: {0}")]
    InvalidConfig(String),

    #[error("customization hook failed: {0}")]
    Hook(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
