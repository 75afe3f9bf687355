//! # Linux Backend
//!
//! Process control via `ptrace`.
//!
//! Linux exposes tracing through one overloaded syscall. We use a hybrid of
//! two crates to reach it:
//!
//! - **nix**: for the well-maintained wrappers (`attach`, `cont`, `step`,
//!   `traceme`) and signal delivery
//! - **libc**: for everything where the raw calling convention matters: the
//!   undecoded wait-status word, the errno-disambiguated
//!   `PTRACE_PEEKDATA`/`PTRACE_POKEDATA` word transfers, the
//!   `PTRACE_GETREGSET`/`PTRACE_SETREGSET` iovec calls, and the
//!   `PTRACE_PEEKUSER` debug-register slots
//!
//! Process enumeration and memory maps come from `/proc`; there is no
//! syscall-level process table on Linux.
//!
//! ## References
//!
//! - [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)
//! - [proc(5) man page](https://man7.org/linux/man-pages/man5/proc.5.html)

mod engine;
mod launch;
mod memory;
mod procfs;
mod registers;
mod wait;

pub use engine::LinuxDebugger;

use nix::unistd::Pid;

use crate::types::ThreadId;

/// Convert an engine thread id into the pid type nix expects.
pub(crate) fn nix_pid(tid: ThreadId) -> Pid
{
    Pid::from_raw(tid.raw() as i32)
}
