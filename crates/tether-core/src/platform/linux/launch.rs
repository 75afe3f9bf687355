//! Tracee launch: fork, trace request, stream redirect, exec.
//!
//! The child half of the fork runs between `fork` and `exec`, so it sticks
//! to plain syscalls: request tracing, reopen the standard streams on the
//! requested terminal device, change directory, exec. All allocation (the
//! `CString` vectors) happens before the fork. Exec failure is unrecoverable
//! for the child; it aborts rather than returning into a second copy of the
//! caller.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::sys::ptrace;
use nix::unistd::{execv, fork, ForkResult, Pid};
use tracing::debug;

use crate::error::{Result, TetherError};
use crate::types::{LaunchParams, ThreadId};

use super::wait;

/// Fork a traced child exec'ing the target, and wait for its first stop.
///
/// Returns the child pid and the raw status of the first stop; the caller
/// decides whether that stop is the expected entry trap. Fork and wait
/// failures surface as `LaunchFailed`.
pub(crate) fn spawn_traced(params: &LaunchParams) -> Result<(Pid, i32)>
{
    let path = path_cstring(&params.path, "target path")?;

    let mut argv = Vec::with_capacity(params.args.len() + 1);
    argv.push(path.clone());
    for arg in &params.args {
        argv.push(
            CString::new(arg.as_bytes())
                .map_err(|_| TetherError::InvalidArgument(format!("argument contains a NUL byte: {arg:?}")))?,
        );
    }

    let tty = params.tty.as_deref().map(|tty| path_cstring(tty, "tty path")).transpose()?;
    let working_dir = params
        .working_dir
        .as_deref()
        .map(|dir| path_cstring(dir, "working directory"))
        .transpose()?;

    debug!(path = %params.path.display(), args = params.args.len(), "forking tracee");

    match unsafe { fork() } {
        Err(errno) => Err(TetherError::LaunchFailed(format!("fork failed: {errno}"))),
        Ok(ForkResult::Child) => exec_in_child(&path, &argv, tty.as_deref(), working_dir.as_deref()),
        Ok(ForkResult::Parent { child }) => {
            // The very first status must arrive before the session exists
            let status = wait::wait_blocking(ThreadId(child.as_raw() as u32))
                .map_err(|err| TetherError::LaunchFailed(format!("wait for first stop failed: {err}")))?;
            Ok((child, status))
        }
    }
}

fn path_cstring(path: &Path, what: &str) -> Result<CString>
{
    CString::new(path.as_os_str().as_bytes())
        .map_err(|_| TetherError::InvalidArgument(format!("{what} contains a NUL byte")))
}

/// Child side of the fork. Never returns.
fn exec_in_child(path: &CString, argv: &[CString], tty: Option<&std::ffi::CStr>, working_dir: Option<&std::ffi::CStr>)
    -> !
{
    let _ = ptrace::traceme();

    if let Some(tty) = tty {
        let fd = unsafe { libc::open(tty.as_ptr(), libc::O_RDWR) };
        if fd != -1 {
            unsafe {
                libc::dup2(fd, libc::STDIN_FILENO);
                libc::dup2(fd, libc::STDOUT_FILENO);
                libc::dup2(fd, libc::STDERR_FILENO);
            }
        }
    }

    if let Some(dir) = working_dir {
        unsafe {
            libc::chdir(dir.as_ptr());
        }
    }

    let _ = execv(path, argv);

    // Exec only returns on failure; there is no usable state left in this
    // half of the fork.
    std::process::abort();
}
