//! # Platform Backends
//!
//! One process-control backend per supported OS.
//!
//! Each submodule implements the [`Debugger`](crate::Debugger) trait with
//! that platform's native tracing API:
//!
//! - **linux**: the `ptrace` syscall, `/proc` for enumeration and memory maps
//! - **openbsd**: the `ptrace` syscall (`PT_*` requests), `sysctl` process table
//!
//! Only the module for the build target is compiled; the
//! [`create_debugger`](crate::debugger::create_debugger) factory picks it.

#[cfg(target_os = "linux")]
pub mod linux;

#[cfg(target_os = "openbsd")]
pub mod openbsd;
