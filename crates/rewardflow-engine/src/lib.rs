//! Rewardflow Engine
//!
//! The shard-level reward-assignment engine: given one shard's deduped
//! history, it correlates decisions with subsequent reward signals inside a
//! per-decision reward window and hands the credited decisions to the
//! output writer.
//!
//! ## Pipeline
//!
//! ```text
//! RewardAssignmentWorker::assign_rewards(payload)
//!     │
//!     ├─ list history objects + incoming markers
//!     ├─ StaleObjectFilter          ← strategy seam, ReadAll default
//!     ├─ oversize? ─────────────────→ ReshardLauncher::start_reshard
//!     ├─ HistoryLoader              ← dedup + consolidate (storage crate)
//!     ├─ modify_history_records     ← customization hook
//!     ├─ builder: per history_id    ← expansion + single-pass temporal join
//!     ├─ RewardedDecisionWriter     ← partitioned gzip JSONL (storage crate)
//!     └─ delete incoming markers    ← last step, only on full success
//! ```
//!
//! A poisoned conversation group aborts only itself; everything up to the
//! final marker deletion is retry-safe because the loader dedups by
//! `message_id` and markers survive any failure.

pub mod builder;
pub mod error;
pub mod launch;
pub mod stale;
pub mod worker;

pub use builder::{build_rewarded_group, group_by_history_id};
pub use error::{Error, Result};
pub use launch::{LogOnlyReshardLauncher, ReshardLauncher, SpawnWorkerLauncher, WorkerLauncher};
pub use stale::{ReadAll, StaleObjectFilter};
pub use worker::{AssignmentSummary, RewardAssignmentWorker, WorkerPayload};
