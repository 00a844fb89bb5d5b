//! Rewardflow Dispatcher
//!
//! The single-writer control loop. Each invocation inspects every
//! project's shards, suppresses shards that are resharding or recently
//! processed, and fans out a bounded number of asynchronous worker
//! dispatches, oldest-last-processed first.
//!
//! A dispatcher invocation must not overlap with another one; that is an
//! infrastructure-level guarantee (a scheduler rule, a singleton timer),
//! not enforced in-process. Workers run concurrently across shards and are
//! idempotent, so the one race the design tolerates (a duplicate dispatch
//! landing inside the mark-then-dispatch window) is harmless.

pub mod dispatcher;
pub mod error;

pub use dispatcher::{DispatchEvent, DispatchStats, Dispatcher};
pub use error::{Error, Result};
