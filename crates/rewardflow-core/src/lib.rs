//! Rewardflow Core
//!
//! This crate defines the shared vocabulary of the reward-assignment
//! pipeline: the record model, the static customization configuration, and
//! the customization-hook capability interface.
//!
//! ## Record model
//!
//! Raw *history records* arrive as dynamic JSON (`serde_json::Value`): a
//! record may simultaneously *be* a decision (via its `type` field) and
//! *carry* embedded decisions (via a `decisions` array). The builder in
//! `rewardflow-engine` expands them into the typed records defined here:
//!
//! - [`DecisionRecord`]: a single decision awaiting reward credit
//! - [`RewardsRecord`]: a bundle of reward values keyed by reward key
//! - [`RewardedDecision`]: the eight-field output projection written to
//!   training partitions
//!
//! ## Customization
//!
//! [`CustomizationConfig`] carries the reward window and the per-project
//! domain→model mapping; [`CustomizationHooks`] is the pluggable transform
//! interface called at fixed points of the pipeline, with
//! [`IdentityHooks`] as the no-op implementation used by tests and the CLI.

pub mod config;
pub mod error;
pub mod hooks;
pub mod record;

pub use config::{CustomizationConfig, ProjectConfig, DEFAULT_MODEL_DOMAIN};
pub use error::{Error, Result};
pub use hooks::{CustomizationHooks, IdentityHooks};
pub use record::{
    assert_valid_rewarded_decision, history_id_of, message_id_of, numeric_reward,
    parse_timestamp, timestamp_of, DecisionRecord, RewardedDecision, RewardsRecord,
    DECISION_TYPE, DEFAULT_REWARD_KEY, REWARDS_TYPE,
};
