//! # Types
//!
//! Platform-agnostic types used throughout the engine.
//!
//! These types abstract away platform-specific details, allowing callers to
//! work with concepts like "process ID", "memory region", or "launch request"
//! without knowing which tracing backend is underneath.

pub mod address;
pub mod process;
pub mod region;

pub use address::Address;
pub use process::{LaunchParams, ProcessId, ProcessRecord, ThreadId};
pub use region::{Permissions, Region};
