//! Error Types for the Storage Layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] rewardflow_core::Error),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("environment variable {name}: {message}")]
    Env { name: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
