//! Errors that abort a run.
//!
//! Everything that can go wrong *inside* a round (bad agent text, failed
//! queries, rejected transfers) is recovered locally and recorded in the
//! event log. Only the failures below reach the caller.

use arena_env::EnvError;
use thiserror::Error;

/// Fatal run errors
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Capability error: {0}")]
    Env(#[from] EnvError),
}

impl ArenaError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
