//! Error Types for the Engine
//!
//! The taxonomy mirrors the blast radius:
//!
//! - [`Error::Group`] is fatal to one conversation group; the worker logs
//!   it and continues with the other groups.
//! - Storage, hook-at-write and validation errors are fatal to the pass;
//!   they propagate out of the worker before incoming markers are deleted,
//!   so the next dispatch retries.
//! - [`Error::InvalidPayload`] is fatal to the dispatch itself.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("group {history_id:?}: {source}")]
    Group {
        history_id: String,
        #[source]
        source: rewardflow_core::Error,
    },

    #[error("invalid worker payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Storage(#[from] rewardflow_storage::Error),

    #[error(transparent)]
    Core(#[from] rewardflow_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
