//! Error types for BOTBRAIN

use thiserror::Error;

/// Main error type for BOTBRAIN
#[derive(Error, Debug)]
pub enum BrainError {
    // ============ Query Errors ============
    #[error("User {0} has no name")]
    MissingUserName(String),

    // ============ Scheduler Errors ============
    #[error("Invalid save interval: {0} seconds")]
    InvalidInterval(u64),

    #[error("No async runtime available to drive the save timer")]
    NoRuntime,

    // ============ Event Errors ============
    #[error("Event handler failed: {0}")]
    Handler(String),

    // ============ Storage Errors ============
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    Config(String),

    // ============ General Errors ============
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for BrainError {
    fn from(err: std::io::Error) -> Self {
        BrainError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for BrainError {
    fn from(err: serde_json::Error) -> Self {
        BrainError::Serialization(err.to_string())
    }
}
