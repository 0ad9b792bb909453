//! BOTBRAIN State Management
//!
//! Provides the brain: user records, a private key/value namespace, an
//! event channel, timer-driven autosave and storage adapters.

pub mod brain;
pub mod events;
pub mod autosave;
pub mod users;
pub mod adapter;
pub mod memory;
pub mod persistent;

pub use brain::*;
pub use events::*;
pub use autosave::*;
pub use adapter::*;
pub use memory::*;
pub use persistent::*;
