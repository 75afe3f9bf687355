//! # Error Types
//!
//! Error handling for the engine.
//!
//! We use `thiserror` to generate `Error` impls and display messages. The
//! split mirrors how failures actually behave at the tracing boundary:
//! transient syscall failures surface as `Err` values and leave prior engine
//! state untouched, while precondition violations (operating on a detached
//! session) are guarded no-ops that never reach this type.

use thiserror::Error;

use crate::types::Address;

/// Main error type for engine operations
#[derive(Error, Debug)]
pub enum TetherError
{
    /// The process with the given PID doesn't exist or has already exited
    ///
    /// Returned when attaching to a pid that is gone, or was never valid.
    #[error("Process not found: PID {0}")]
    ProcessNotFound(u32),

    /// Insufficient permissions to trace the target process
    ///
    /// On Linux this typically means a Yama `ptrace_scope` restriction or a
    /// target owned by another user; run with elevated privileges or pick a
    /// descendant process.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Failed to attach to a process
    ///
    /// General attach failure that isn't a missing process or a permission
    /// problem; the string carries the OS detail.
    #[error("Failed to attach to process: {0}")]
    AttachFailed(String),

    /// Failed to launch a tracee
    ///
    /// Covers fork failure, a failed wait for the child's first stop, and a
    /// first stop that wasn't the expected trap. The session is back in the
    /// detached state whenever this is returned.
    #[error("Failed to launch tracee: {0}")]
    LaunchFailed(String),

    /// A tracee memory access faulted
    ///
    /// The address was unmapped or the mapping denied the access. The word
    /// read/write that produced this had no other effect.
    #[error("Memory access fault at {address}")]
    MemoryFault
    {
        /// The faulting tracee address.
        address: Address,
    },

    /// Operation requires an attached session
    ///
    /// Returned by memory and breakpoint operations that have to produce a
    /// value and therefore cannot degrade to a guarded no-op.
    #[error("No attached session")]
    NotAttached,

    /// Invalid argument passed to an engine operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Raw OS error from the tracing syscall layer
    #[cfg(target_os = "linux")]
    #[error("OS error: {0}")]
    Sys(#[from] nix::errno::Errno),

    /// I/O error (procfs reads, terminal device opens, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, TetherError>;
