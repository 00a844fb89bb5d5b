//! Rewardflow Storage Layer
//!
//! Everything that touches the object store lives here: the key layout, the
//! gzip-JSONL codec, the store adapter, the shard registry, the history
//! loader/consolidator, and the rewarded-decision writer.
//!
//! ## Layout
//!
//! One logical bucket holds four prefixes:
//!
//! ```text
//! histories/{project}/{shard}/{YYYY}/{MM}/{DD}/{object}.jsonl.gz   raw history
//! incoming/{project}/{shard}/{marker}.json                        reprocess markers
//! registry/{project}/{object}.json                                last-processed registry
//! rewarded_decisions/{project}/{model}/{shard}/{YYYY}/{MM}/{DD}/  training output
//! ```
//!
//! ## Store injection
//!
//! All adapters take an `Arc<dyn object_store::ObjectStore>`; production
//! wires in S3, tests wire in `object_store::memory::InMemory`. Nothing in
//! this crate reads the environment; the CLI resolves `RECORDS_BUCKET`
//! into a store and passes it down.

pub mod config;
pub mod error;
pub mod jsonl;
pub mod loader;
pub mod naming;
pub mod registry;
pub mod store;
pub mod writer;

pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use loader::{HistoryLoader, LoadedHistory};
pub use registry::{group_shards, ShardGroups, ShardRegistry};
pub use store::{RecordStore, StoredObject};
pub use writer::{RewardedDecisionWriter, WriteStats};
