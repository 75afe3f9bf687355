//! # Tether Utilities
//!
//! Shared utilities and logging bootstrap for Tether.
//!
//! This crate provides common functionality used across the Tether workspace,
//! currently the `tracing`-based logging infrastructure shared by the CLI and
//! the core engine's tests.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel};
pub use tracing::{debug, error, info, trace, warn};
