//! # Debug Events
//!
//! One wait-status observation, decoded.
//!
//! Every iteration of the event-wait loop produces exactly one [`DebugEvent`]:
//! the raw status word the kernel reported, plus which process and thread
//! reported it. Decoding is pure: an event can be constructed and inspected
//! without a live tracee, which is what makes the decode rules unit-testable.
//!
//! The [`ResumeDisposition`] returned by an [`EventHandler`] names the three
//! ways a caller can answer an event: keep going silently, keep going but
//! re-deliver the signal that caused the stop (so default signal disposition
//! is preserved), or leave the tracee stopped.

use std::fmt;

use crate::types::{ProcessId, ThreadId};

/// Decoded cause of a debug event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCause
{
    /// The thread stopped on delivery of the given signal.
    Stopped(i32),
    /// The process was terminated by the given signal.
    Terminated(i32),
    /// The process exited normally with the given exit code.
    Exited(i32),
}

impl fmt::Display for EventCause
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            EventCause::Stopped(sig) => write!(f, "stopped by signal {sig}"),
            EventCause::Terminated(sig) => write!(f, "terminated by signal {sig}"),
            EventCause::Exited(code) => write!(f, "exited with code {code}"),
        }
    }
}

/// One observed change in a traced thread's execution state
///
/// Wraps the raw OS wait status together with the process and thread that
/// produced it. The value is immutable; ownership transfers to the caller of
/// the wait loop. Construction has no side effects.
///
/// ## Example
///
/// ```rust
/// use tether_core::event::{DebugEvent, EventCause};
/// use tether_core::types::{ProcessId, ThreadId};
///
/// // A wait status encoding "stopped by SIGTRAP (5)"
/// let event = DebugEvent::new((5 << 8) | 0x7f, ProcessId(100), ThreadId(100));
/// assert_eq!(event.cause(), EventCause::Stopped(5));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugEvent
{
    pid: ProcessId,
    tid: ThreadId,
    raw_status: i32,
}

impl DebugEvent
{
    /// Wrap a raw wait status together with its originating process/thread.
    pub const fn new(raw_status: i32, pid: ProcessId, tid: ThreadId) -> Self
    {
        Self { pid, tid, raw_status }
    }

    /// Process the event belongs to.
    pub const fn process(&self) -> ProcessId
    {
        self.pid
    }

    /// Thread that reported the status change.
    pub const fn thread(&self) -> ThreadId
    {
        self.tid
    }

    /// The raw, undecoded wait status.
    pub const fn raw_status(&self) -> i32
    {
        self.raw_status
    }

    /// Decode the wait status into its cause.
    ///
    /// The decode is total: every status the kernel can report for a traced
    /// thread is a stop, a signal termination, or a normal exit.
    pub fn cause(&self) -> EventCause
    {
        let status = self.raw_status;
        if libc::WIFSTOPPED(status) {
            EventCause::Stopped(libc::WSTOPSIG(status))
        } else if libc::WIFEXITED(status) {
            EventCause::Exited(libc::WEXITSTATUS(status))
        } else {
            EventCause::Terminated(libc::WTERMSIG(status))
        }
    }

    /// Whether this event ends the thread (signal termination or exit).
    pub fn is_terminal(&self) -> bool
    {
        !libc::WIFSTOPPED(self.raw_status)
    }
}

impl fmt::Display for DebugEvent
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "pid {} tid {}: {}", self.pid, self.tid, self.cause())
    }
}

/// Signal number to re-deliver when a stop is resumed as "not handled"
///
/// For a status encoding a signal stop this is the stop signal; for a signal
/// termination it is the terminating signal; anything else (including a
/// never-observed thread with status `0`) yields `0`, meaning no signal is
/// forwarded.
pub fn resume_signal(raw_status: i32) -> i32
{
    if libc::WIFSIGNALED(raw_status) {
        libc::WTERMSIG(raw_status)
    } else if libc::WIFSTOPPED(raw_status) {
        libc::WSTOPSIG(raw_status)
    } else {
        0
    }
}

/// Caller's answer to a debug event
///
/// Consumed by [`Debugger::resume`](crate::Debugger::resume) and
/// [`Debugger::step`](crate::Debugger::step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDisposition
{
    /// Continue the tracee without delivering any signal.
    Continue,
    /// Continue the tracee, re-delivering the signal recorded for the active
    /// thread's last stop, so the tracee's default disposition (e.g. dying on
    /// SIGSEGV) still applies.
    ExceptionNotHandled,
    /// Leave the tracee stopped.
    Stop,
}

/// Contract for components that react to debug events
///
/// The wait-loop caller hands each event to a handler and feeds the returned
/// disposition straight back into `resume`/`step`.
pub trait EventHandler
{
    /// React to one debug event and decide how the tracee resumes.
    fn handle_event(&mut self, event: &DebugEvent) -> ResumeDisposition;
}
