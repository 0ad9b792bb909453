//! BOTBRAIN Core Library
//!
//! Core types, traits, and configuration for the BOTBRAIN state container.
//! This crate provides the foundation for all other BOTBRAIN components.

pub mod types;
pub mod traits;
pub mod error;
pub mod config;

pub use types::*;
pub use traits::*;
pub use error::*;
pub use config::*;
