//! Register state transfer.
//!
//! nix wraps `PTRACE_GETREGS` for one architecture only, so the class
//! transfers here go straight to `libc::ptrace` with the regset interface:
//! `PTRACE_GETREGSET`/`PTRACE_SETREGSET` plus an iovec, selected by ELF note
//! (`NT_PRSTATUS` for general-purpose, `NT_PRFPREG` for the FPU block). The
//! x86-64 hardware debug registers have no regset and are reached one slot
//! at a time through the user area (`PTRACE_PEEKUSER`/`PTRACE_POKEUSER`).
//!
//! Kernel structures never leave this module tree: each architecture
//! submodule marshals them field by field into the portable snapshot types.

#[cfg(target_arch = "aarch64")]
mod arm64;
#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
use std::io;
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
use std::mem::{self, MaybeUninit};

use crate::state::{ThreadState, TransferReport};
use crate::types::ThreadId;

/// Capture the register classes of a stopped thread into `state`.
pub(crate) fn capture(tid: ThreadId, state: &mut ThreadState) -> TransferReport
{
    #[cfg(target_arch = "x86_64")]
    {
        x86_64::capture(tid, state)
    }

    #[cfg(target_arch = "aarch64")]
    {
        arm64::capture(tid, state)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        let _ = tid;
        state.clear();
        TransferReport::unsupported()
    }
}

/// Apply a snapshot to a stopped thread, class by class.
pub(crate) fn apply(tid: ThreadId, state: &ThreadState) -> TransferReport
{
    #[cfg(target_arch = "x86_64")]
    {
        x86_64::apply(tid, state)
    }

    #[cfg(target_arch = "aarch64")]
    {
        arm64::apply(tid, state)
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        let _ = (tid, state);
        TransferReport::unsupported()
    }
}

/// Fetch one register set into a zero-initialized kernel structure.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn get_regset<T>(tid: ThreadId, set: libc::c_int) -> io::Result<T>
{
    let mut value = MaybeUninit::<T>::zeroed();
    let mut iov = libc::iovec {
        iov_base: value.as_mut_ptr().cast::<libc::c_void>(),
        iov_len: mem::size_of::<T>(),
    };
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_GETREGSET,
            tid.raw() as libc::pid_t,
            set as usize as *mut libc::c_void,
            &mut iov as *mut libc::iovec,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { value.assume_init() })
}

/// Write one register set from a kernel structure.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
fn set_regset<T>(tid: ThreadId, set: libc::c_int, value: &T) -> io::Result<()>
{
    let mut iov = libc::iovec {
        iov_base: (value as *const T).cast_mut().cast::<libc::c_void>(),
        iov_len: mem::size_of::<T>(),
    };
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_SETREGSET,
            tid.raw() as libc::pid_t,
            set as usize as *mut libc::c_void,
            &mut iov as *mut libc::iovec,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read one word from the thread's user area.
///
/// `PTRACE_PEEKUSER` reports its result in the return value, so a `-1` word
/// is only an error when errno says so; errno must be cleared first.
#[cfg(target_arch = "x86_64")]
fn peek_user(tid: ThreadId, offset: usize) -> io::Result<u64>
{
    unsafe {
        *libc::__errno_location() = 0;
    }
    let value = unsafe {
        libc::ptrace(
            libc::PTRACE_PEEKUSER,
            tid.raw() as libc::pid_t,
            offset as *mut libc::c_void,
            std::ptr::null_mut::<libc::c_void>(),
        )
    };
    let errno = unsafe { *libc::__errno_location() };
    if value == -1 && errno != 0 {
        return Err(io::Error::from_raw_os_error(errno));
    }
    Ok(value as u64)
}

/// Write one word into the thread's user area.
#[cfg(target_arch = "x86_64")]
fn poke_user(tid: ThreadId, offset: usize, value: u64) -> io::Result<()>
{
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_POKEUSER,
            tid.raw() as libc::pid_t,
            offset as *mut libc::c_void,
            value as libc::c_long,
        )
    };
    if rc == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
