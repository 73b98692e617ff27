//! Weave Common Utilities
//!
//! Shared infrastructure for all Weave crates:
//! - Error types and result aliases
//! - Clock and output timestamp utilities
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
