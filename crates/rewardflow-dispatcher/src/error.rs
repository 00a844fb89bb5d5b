//! Error Types for the Dispatcher

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] rewardflow_storage::Error),

    #[error(transparent)]
    Engine(#[from] rewardflow_engine::Error),

    #[error(transparent)]
    Core(#[from] rewardflow_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
