//! Core traits defining BOTBRAIN interfaces
//!
//! These traits define the contracts for event listeners and persistence
//! adapters plugged into the brain.

use crate::types::*;

/// Result type for BOTBRAIN operations
pub type BrainResult<T> = Result<T, crate::error::BrainError>;

/// Listener for brain notifications
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are reported by the dispatcher and do not
    /// stop delivery to later handlers.
    fn handle(&self, event: &BrainEvent) -> BrainResult<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&BrainEvent) -> BrainResult<()> + Send + Sync,
{
    fn handle(&self, event: &BrainEvent) -> BrainResult<()> {
        self(event)
    }
}

/// Persistence adapter for brain snapshots
pub trait BrainStorage: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &str;

    /// Load previously stored data, if any
    fn load(&self) -> BrainResult<Option<StoredData>>;

    /// Persist a snapshot
    fn store(&self, snapshot: &BrainSnapshot) -> BrainResult<()>;

    /// Make stored data durable
    fn flush(&self) -> BrainResult<()> {
        Ok(())
    }
}
