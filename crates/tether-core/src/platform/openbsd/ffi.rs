//! Declarations missing from the libc crate.
//!
//! Request numbers from `sys/ptrace.h`, register blocks from
//! `machine/reg.h` (amd64). These never cross the backend boundary; the
//! marshaling in `registers` turns them into the portable snapshot types.

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, pid_t};

pub(crate) const PT_TRACE_ME: c_int = 0;
pub(crate) const PT_READ_D: c_int = 2;
pub(crate) const PT_WRITE_D: c_int = 5;
pub(crate) const PT_CONTINUE: c_int = 7;
pub(crate) const PT_KILL: c_int = 8;
pub(crate) const PT_ATTACH: c_int = 9;
pub(crate) const PT_DETACH: c_int = 10;
pub(crate) const PT_STEP: c_int = 32;
pub(crate) const PT_GETREGS: c_int = 33;
pub(crate) const PT_SETREGS: c_int = 34;
pub(crate) const PT_GETFPREGS: c_int = 35;
pub(crate) const PT_SETFPREGS: c_int = 36;

/// amd64 general-purpose register block (`struct reg`).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct reg
{
    pub r_rdi: i64,
    pub r_rsi: i64,
    pub r_rdx: i64,
    pub r_rcx: i64,
    pub r_r8: i64,
    pub r_r9: i64,
    pub r_r10: i64,
    pub r_r11: i64,
    pub r_r12: i64,
    pub r_r13: i64,
    pub r_r14: i64,
    pub r_r15: i64,
    pub r_rbp: i64,
    pub r_rbx: i64,
    pub r_rax: i64,
    pub r_rsp: i64,
    pub r_rip: i64,
    pub r_rflags: i64,
    pub r_cs: i64,
    pub r_ss: i64,
    pub r_ds: i64,
    pub r_es: i64,
    pub r_fs: i64,
    pub r_gs: i64,
}

/// amd64 FXSAVE64 area (`struct fxsave64`), the payload of `struct fpreg`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct fxsave64
{
    pub fx_fcw: u16,
    pub fx_fsw: u16,
    pub fx_ftw: u8,
    pub fx_unused1: u8,
    pub fx_fop: u16,
    pub fx_rip: u64,
    pub fx_rdp: u64,
    pub fx_mxcsr: u32,
    pub fx_mxcsr_mask: u32,
    pub fx_st: [[u64; 2]; 8],
    pub fx_xmm: [[u64; 2]; 16],
    pub fx_unused3: [u8; 96],
}

impl Default for fxsave64
{
    fn default() -> Self
    {
        Self {
            fx_fcw: 0,
            fx_fsw: 0,
            fx_ftw: 0,
            fx_unused1: 0,
            fx_fop: 0,
            fx_rip: 0,
            fx_rdp: 0,
            fx_mxcsr: 0,
            fx_mxcsr_mask: 0,
            fx_st: [[0; 2]; 8],
            fx_xmm: [[0; 2]; 16],
            fx_unused3: [0; 96],
        }
    }
}

/// Issue one ptrace request, mapping `-1` to the current errno.
pub(crate) fn pt(request: c_int, pid: pid_t, addr: *mut c_char, data: c_int) -> std::io::Result<c_int>
{
    let rc = unsafe { libc::ptrace(request, pid, addr, data) };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(rc)
}

/// The `(caddr_t)1` continue address: resume where the thread stopped.
pub(crate) fn continue_addr() -> *mut c_char
{
    1 as *mut c_char
}

/// `PT_READ_D`: the word comes back in the return value, so `-1` is only an
/// error when errno says so.
pub(crate) fn pt_read(pid: pid_t, addr: *mut c_char) -> std::io::Result<c_int>
{
    unsafe {
        *libc::__errno() = 0;
    }
    let value = unsafe { libc::ptrace(PT_READ_D, pid, addr, 0) };
    let errno = unsafe { *libc::__errno() };
    if value == -1 && errno != 0 {
        return Err(std::io::Error::from_raw_os_error(errno));
    }
    Ok(value)
}
