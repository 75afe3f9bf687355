//! # tether-core
//!
//! Process control, debug-event delivery, and register state transfer for
//! Tether.
//!
//! This crate is the engine of an interactive debugger: it attaches to,
//! controls, and inspects a traced process and its threads, and presents one
//! contract over the per-OS tracing APIs:
//!
//! - Launch/attach/detach/kill lifecycle with implicit-detach-first semantics
//! - A blocking, timeout-bounded debug-event wait loop
//! - Opaque per-thread register snapshots with per-class transfer outcomes
//! - Word-granular tracee memory access and trap-byte breakpoint mechanics
//! - A point-in-time snapshot of the OS process table
//!
//! ## Platform Support
//!
//! - **Linux**: `ptrace` + `/proc`
//! - **OpenBSD**: `ptrace` (`PT_*`) + `sysctl` process table
//!
//! ## Why unsafe code is needed
//!
//! Controlling another process means raw syscalls: `ptrace`, `fork`,
//! `waitpid`, `sysctl`. Those calls are wrapped in safe functions at the
//! backend boundary; nothing outside `platform` needs `unsafe`.

#![allow(unsafe_code)] // Required for the raw tracing syscalls

pub mod breakpoints;
pub mod debugger;
pub mod error;
pub mod event;
pub mod platform;
pub mod prelude;
pub mod state;
pub mod threads;
pub mod types;

pub use debugger::{create_debugger, Debugger};
// Re-export commonly used types
pub use error::{Result, TetherError};
pub use event::{DebugEvent, EventCause, EventHandler, ResumeDisposition};
#[cfg(target_os = "linux")]
pub use platform::linux::LinuxDebugger;
#[cfg(target_os = "openbsd")]
pub use platform::openbsd::OpenBsdDebugger;
pub use state::{ThreadState, TransferReport};
pub use types::{Address, LaunchParams, ProcessId, ProcessRecord, Region, ThreadId};
