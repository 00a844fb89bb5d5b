//! Runtime Configuration
//!
//! Environment-driven knobs for the dispatcher and workers. Parsed once at
//! startup; malformed values are a configuration error rather than a
//! silent default.
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `REWARD_ASSIGNMENT_WORKER_COUNT` | Worker dispatches per control-loop tick | `1` |
//! | `REWARD_ASSIGNMENT_REPROCESS_SHARD_WAIT_TIME_IN_SECONDS` | Per-shard cool-down | `1800` |
//! | `REWARD_ASSIGNMENT_WORKER_MAX_PAYLOAD_IN_MB` | Reshard escalation threshold | `100` |
//! | `RECORDS_BUCKET` | Object-store namespace (consumed by the CLI) | — |

use chrono::Duration;

use crate::error::{Error, Result};

pub const ENV_WORKER_COUNT: &str = "REWARD_ASSIGNMENT_WORKER_COUNT";
pub const ENV_REPROCESS_WAIT: &str = "REWARD_ASSIGNMENT_REPROCESS_SHARD_WAIT_TIME_IN_SECONDS";
pub const ENV_MAX_PAYLOAD_MB: &str = "REWARD_ASSIGNMENT_WORKER_MAX_PAYLOAD_IN_MB";
pub const ENV_RECORDS_BUCKET: &str = "RECORDS_BUCKET";

const DEFAULT_WORKER_COUNT: u32 = 1;
const DEFAULT_REPROCESS_WAIT_SECONDS: u64 = 1800;
const DEFAULT_MAX_PAYLOAD_MB: u64 = 100;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on concurrent worker dispatches per dispatcher
    /// invocation. Never below 1.
    pub worker_count: u32,

    /// Per-shard cool-down between dispatches, in seconds.
    pub reprocess_wait_seconds: u64,

    /// Stale-payload size beyond which a shard is escalated to resharding.
    pub max_payload_bytes: u64,

    /// Object-store namespace. `None` when the embedder injects a store
    /// directly instead of letting the CLI build one.
    pub records_bucket: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            reprocess_wait_seconds: DEFAULT_REPROCESS_WAIT_SECONDS,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_MB * 1024 * 1024,
            records_bucket: None,
        }
    }
}

impl RuntimeConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let worker_count = parse_env_u64(ENV_WORKER_COUNT)?
            .map(|v| (v.max(1)).min(u32::MAX as u64) as u32)
            .unwrap_or(DEFAULT_WORKER_COUNT);
        let reprocess_wait_seconds =
            parse_env_u64(ENV_REPROCESS_WAIT)?.unwrap_or(DEFAULT_REPROCESS_WAIT_SECONDS);
        let max_payload_mb =
            parse_env_u64(ENV_MAX_PAYLOAD_MB)?.unwrap_or(DEFAULT_MAX_PAYLOAD_MB);
        let records_bucket = match std::env::var(ENV_RECORDS_BUCKET) {
            Ok(v) if !v.trim().is_empty() => Some(v),
            _ => None,
        };

        Ok(Self {
            worker_count,
            reprocess_wait_seconds,
            max_payload_bytes: max_payload_mb.saturating_mul(1024 * 1024),
            records_bucket,
        })
    }

    /// The cool-down as a duration for timestamp arithmetic.
    pub fn reprocess_wait(&self) -> Duration {
        Duration::seconds(self.reprocess_wait_seconds.min(i64::MAX as u64) as i64)
    }
}

fn parse_env_u64(name: &'static str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::Env {
                name,
                message: format!("expected an unsigned integer, got {raw:?}: {e}"),
            }),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Env {
            name,
            message: e.to_string(),
        }),
    }
}
