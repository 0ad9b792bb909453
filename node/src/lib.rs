//! BOTBRAIN Node Implementation
//!
//! Host binary that combines:
//! - The brain and its autosave lifecycle
//! - Sled-backed persistence
//! - Read-only HTTP API

mod api;
mod logging;
mod node;
mod runtime;

pub use api::*;
pub use logging::*;
pub use node::*;
pub use runtime::*;
