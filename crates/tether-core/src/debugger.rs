//! # Debugger Trait
//!
//! The backend contract for platform-specific process control.
//!
//! One debugger front end drives every supported OS through this trait; each
//! platform implements it with its own tracing API:
//!
//! - **Linux**: `ptrace` (`PTRACE_ATTACH`, `PTRACE_CONT`, register sets)
//! - **OpenBSD**: `ptrace` (`PT_ATTACH`, `PT_CONTINUE`, `PT_GETREGS`)
//!
//! The implementation for the build target is selected at compile time via
//! [`create_debugger`]; no runtime plugin machinery is involved.
//!
//! ## Session model
//!
//! An implementation owns at most one session at a time:
//! `Detached -> Attaching -> Attached -> Detached`. Every mutating operation
//! is a guarded no-op while detached, so callers never need to pre-check
//! session state: the guard is the one invariant, enforced uniformly.
//!
//! ## Thread Safety
//!
//! A debugger instance is not thread-safe: a single controlling thread drives
//! it, and the only blocking point is [`Debugger::wait_debug_event`], which is
//! always bounded by its timeout.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::Result;
use crate::event::{DebugEvent, ResumeDisposition};
use crate::state::{ThreadState, TransferReport};
use crate::types::{Address, LaunchParams, ProcessId, ProcessRecord, Region, ThreadId};

/// Process-control interface implemented once per target OS
pub trait Debugger
{
    /// Launch a new tracee under debugger control
    ///
    /// Any existing session is implicitly detached first. The child requests
    /// to be traced, optionally reopens its standard streams on the terminal
    /// device named in `params`, changes into the requested working
    /// directory, and execs the target. A failed exec is fatal to the
    /// child: it aborts and never returns through normal control flow.
    ///
    /// The call blocks until the child's first stop. If that stop is not the
    /// expected trap signal the launch is abandoned and the session reverts
    /// to detached.
    ///
    /// On success the tracee is stopped at its entry trap, the initial
    /// thread is registered and active, and the first call to
    /// [`Debugger::wait_debug_event`] reports the entry stop.
    ///
    /// ## Errors
    ///
    /// - `LaunchFailed`: fork failure, a failed wait for the first stop, or
    ///   an unexpected first stop. The session is detached and no thread is
    ///   registered.
    /// - `InvalidArgument`: a path or argument that cannot be passed to exec
    ///   (embedded NUL).
    fn launch(&mut self, params: &LaunchParams) -> Result<()>;

    /// Attach to a running process
    ///
    /// Any existing session is implicitly detached first. On success the
    /// target's initial thread is registered as the sole known thread and
    /// made active; its attach stop is observed by the next
    /// [`Debugger::wait_debug_event`] call.
    ///
    /// Only the initial thread is attached. Sibling threads of a
    /// multi-threaded target are picked up by the wait loop if the kernel
    /// reports their stops, but they are not traced at attach time. This is
    /// limitation, not silently worked around.
    ///
    /// ## Errors
    ///
    /// - `ProcessNotFound`: no such pid.
    /// - `PermissionDenied`: tracing the target is not allowed.
    /// - `AttachFailed`: any other attach failure.
    fn attach(&mut self, pid: ProcessId) -> Result<()>;

    /// Release tracing control over the tracee
    ///
    /// No-op when detached; idempotent; safe to call from `Drop`. Installed
    /// breakpoints are cleared *before* control is released, since detaching
    /// a trap byte still patched in can crash the tracee or make the OS
    /// refuse the detach. Teardown failures are logged, not returned.
    fn detach(&mut self);

    /// Forcibly terminate the tracee
    ///
    /// No-op when detached. Clears breakpoints, kills the tracee, performs a
    /// blocking reap wait, and clears all session state. Unlike
    /// [`Debugger::detach`] this always leaves the tracee non-existent.
    fn kill(&mut self);

    /// Ask every registered thread to stop
    ///
    /// Sends a stop signal to each thread in the registry and returns
    /// without waiting for confirmation; the resulting stops are observed
    /// by subsequent [`Debugger::wait_debug_event`] calls. Pure best effort;
    /// no failure is reported. This is the only way to interrupt a running
    /// tracee from the controlling thread.
    fn pause(&mut self);

    /// Continue the active thread
    ///
    /// No-op when detached or when `disposition` is
    /// [`ResumeDisposition::Stop`]. With
    /// [`ResumeDisposition::ExceptionNotHandled`] the signal recorded for
    /// the active thread's last stop is re-delivered, preserving the
    /// tracee's default signal disposition; otherwise no signal is
    /// forwarded.
    fn resume(&mut self, disposition: ResumeDisposition) -> Result<()>;

    /// Single-step the active thread
    ///
    /// Same guard and signal-forwarding rules as [`Debugger::resume`], but
    /// the thread stops again after one instruction.
    fn step(&mut self, disposition: ResumeDisposition) -> Result<()>;

    /// Wait for the next debug event
    ///
    /// The single integration point between the OS's asynchronous stop
    /// notifications and the engine's synchronous state. Blocks until a
    /// traced thread reports a status change or the timeout elapses:
    ///
    /// - `None`: wait without bound
    /// - `Some(Duration::ZERO)`: one non-blocking poll
    /// - `Some(timeout)`: bounded wait
    ///
    /// On a status change the reporting thread becomes the active thread,
    /// its registry entry is updated, and the decoded event is returned. On
    /// timeout (or immediately when detached) `Ok(None)` is returned and
    /// the session is untouched. Successive calls are strictly sequential;
    /// there is no concurrent waiting on one session.
    fn wait_debug_event(&mut self, timeout: Option<Duration>) -> Result<Option<DebugEvent>>;

    /// Capture the active thread's register state into `state`
    ///
    /// When detached, clears `state` and reports every class as skipped.
    /// Otherwise reads the general-purpose, floating-point, and (where the
    /// backend exposes them) hardware debug register classes independently:
    /// one class failing does not stop the others from being attempted, and
    /// the per-class outcome is reported. The snapshot is a copy with no
    /// live binding to the tracee.
    fn get_state(&mut self, state: &mut ThreadState) -> TransferReport;

    /// Apply a previously captured snapshot to the active thread
    ///
    /// When detached, a no-op reporting every class as skipped. Register
    /// classes absent from the snapshot are skipped; present classes are
    /// written independently, general-purpose registers as one unit.
    fn set_state(&mut self, state: &ThreadState) -> TransferReport;

    /// Read one machine word from tracee memory
    ///
    /// ## Errors
    ///
    /// `MemoryFault` for an unmapped address or denied access. Callers
    /// needing bulk or byte-granular access compose this primitive.
    fn read_word(&mut self, address: Address) -> Result<u64>;

    /// Write one machine word to tracee memory
    ///
    /// ## Errors
    ///
    /// `MemoryFault` for an unmapped address or denied access.
    fn write_word(&mut self, address: Address, value: u64) -> Result<()>;

    /// Install an OS-enforced trap at `address`
    ///
    /// Mechanism only: the original word is saved and the architecture's
    /// trap instruction patched in. Installing twice at one address is a
    /// no-op. Where the breakpoint goes is the caller's business.
    fn set_breakpoint(&mut self, address: Address) -> Result<()>;

    /// Remove the trap at `address`, restoring the original word
    ///
    /// ## Errors
    ///
    /// `InvalidArgument` if no breakpoint is installed there.
    fn remove_breakpoint(&mut self, address: Address) -> Result<()>;

    /// Restore every patched word, best-effort
    ///
    /// Called internally before detach and kill; harmless when empty.
    fn clear_breakpoints(&mut self);

    /// Enumerate the tracee's mapped memory regions
    ///
    /// A detached session yields an empty list.
    ///
    /// ## Errors
    ///
    /// OS query failures surface as the underlying error.
    fn memory_regions(&self) -> Result<Vec<Region>>;

    /// Snapshot the OS process table
    ///
    /// Independent of any attached session; no caching, no diffing. A
    /// failure to query the table yields an error and no records, never a
    /// partial map. Races against concurrently exiting processes degrade
    /// single rows (stale name, zero parent pid) instead of failing the
    /// call.
    fn enumerate_processes(&self) -> Result<BTreeMap<ProcessId, ProcessRecord>>;

    /// Select the thread targeted by register and memory operations
    ///
    /// ## Panics
    ///
    /// Panics if `tid` is not in the thread registry. Selecting an
    /// unregistered thread is a caller programming error, not a recoverable
    /// condition.
    fn set_active_thread(&mut self, tid: ThreadId);

    /// The currently active thread, if attached.
    fn active_thread(&self) -> Option<ThreadId>;

    /// Whether a session is currently attached.
    fn attached(&self) -> bool;

    /// Pid of the attached tracee's leader, if attached.
    fn pid(&self) -> Option<ProcessId>;

    /// Size of a memory page on this system.
    fn page_size(&self) -> u64;
}

/// Create the debugger backend for the build target
///
/// ## Errors
///
/// Returns `InvalidArgument` on targets with no process-control backend.
///
/// ## Example
///
/// ```rust,no_run
/// use tether_core::debugger::create_debugger;
/// use tether_core::types::ProcessId;
/// use tether_core::Debugger;
///
/// let mut debugger = create_debugger()?;
/// debugger.attach(ProcessId::from(12345))?;
/// # Ok::<(), tether_core::error::TetherError>(())
/// ```
pub fn create_debugger() -> Result<Box<dyn Debugger>>
{
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(crate::platform::linux::LinuxDebugger::new()))
    }

    #[cfg(target_os = "openbsd")]
    {
        Ok(Box::new(crate::platform::openbsd::OpenBsdDebugger::new()))
    }

    #[cfg(not(any(target_os = "linux", target_os = "openbsd")))]
    {
        Err(crate::error::TetherError::InvalidArgument(format!(
            "no process-control backend for platform: {}",
            std::env::consts::OS
        )))
    }
}
