//! Raw `waitpid` helpers.
//!
//! The engine keeps the undecoded wait-status word (the thread registry
//! stores it, signal re-delivery derives from it), so these helpers call
//! `libc::waitpid` directly instead of going through nix's decoded
//! `WaitStatus`. `__WALL` is always set: traced clone children do not count
//! as ordinary wait children without it.

use nix::errno::Errno;

use crate::error::{Result, TetherError};
use crate::types::ThreadId;

/// What one non-blocking poll of a thread observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome
{
    /// The thread reported the contained raw wait status.
    StatusChange(i32),
    /// No status change pending.
    NoChange,
    /// The kernel no longer knows this thread as a waitable child.
    Gone,
}

/// Poll one traced thread for a status change without blocking.
pub(crate) fn poll_status(tid: ThreadId) -> Result<PollOutcome>
{
    let mut status: libc::c_int = 0;
    let rc = unsafe { libc::waitpid(tid.raw() as libc::pid_t, &mut status, libc::WNOHANG | libc::__WALL) };
    if rc == -1 {
        return match Errno::last() {
            Errno::ECHILD => Ok(PollOutcome::Gone),
            Errno::EINTR => Ok(PollOutcome::NoChange),
            errno => Err(TetherError::Sys(errno)),
        };
    }
    if rc == 0 {
        Ok(PollOutcome::NoChange)
    } else {
        Ok(PollOutcome::StatusChange(status))
    }
}

/// Block until a thread reports a status change, retrying on signal
/// interruption. Used for the launch first-stop wait and the kill reap.
pub(crate) fn wait_blocking(tid: ThreadId) -> Result<i32>
{
    let mut status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(tid.raw() as libc::pid_t, &mut status, libc::__WALL) };
        if rc == -1 {
            match Errno::last() {
                Errno::EINTR => continue,
                errno => return Err(TetherError::Sys(errno)),
            }
        }
        return Ok(status);
    }
}
