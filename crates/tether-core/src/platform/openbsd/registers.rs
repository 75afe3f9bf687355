//! Register marshaling for the amd64 `PT_GETREGS` family.
//!
//! The kernel has no userspace path to the hardware debug registers, so only
//! the general-purpose and FPU classes transfer; the debug class is reported
//! unsupported. The `struct reg` block carries no fs/gs base slots either,
//! those stay zero in the snapshot.

use std::mem;

use tracing::warn;

use crate::state::{ClassOutcome, ThreadState, TransferReport, X86_64Fpu, X86_64Gp, X86_64State};
use crate::types::ThreadId;

use super::ffi;

pub(crate) fn capture(tid: ThreadId, state: &mut ThreadState) -> TransferReport
{
    let pid = tid.raw() as libc::pid_t;
    let mut snapshot = X86_64State::default();
    let mut report = TransferReport::skipped();
    report.debug = ClassOutcome::Unsupported;

    let mut regs = ffi::reg::default();
    match ffi::pt(ffi::PT_GETREGS, pid, (&mut regs as *mut ffi::reg).cast(), 0) {
        Ok(_) => {
            snapshot.gp = Some(gp_from_kernel(&regs));
            report.gp = ClassOutcome::Transferred;
        }
        Err(err) => {
            warn!(%tid, %err, "general-purpose register read failed");
            report.gp = ClassOutcome::Failed;
        }
    }

    let mut fpregs = ffi::fxsave64::default();
    match ffi::pt(ffi::PT_GETFPREGS, pid, (&mut fpregs as *mut ffi::fxsave64).cast(), 0) {
        Ok(_) => {
            snapshot.fpu = Some(fpu_from_kernel(&fpregs));
            report.fpu = ClassOutcome::Transferred;
        }
        Err(err) => {
            warn!(%tid, %err, "FPU register read failed");
            report.fpu = ClassOutcome::Failed;
        }
    }

    *state = ThreadState::X86_64(snapshot);
    report
}

pub(crate) fn apply(tid: ThreadId, state: &ThreadState) -> TransferReport
{
    let snapshot = match state {
        ThreadState::X86_64(snapshot) => snapshot,
        ThreadState::Empty => return TransferReport::skipped(),
        ThreadState::Arm64(_) => {
            warn!(%tid, "snapshot architecture does not match the tracee");
            return TransferReport {
                gp: ClassOutcome::Failed,
                fpu: ClassOutcome::Failed,
                debug: ClassOutcome::Failed,
            };
        }
    };

    let pid = tid.raw() as libc::pid_t;
    let mut report = TransferReport::skipped();
    report.debug = ClassOutcome::Unsupported;

    if let Some(gp) = &snapshot.gp {
        let mut regs = gp_to_kernel(gp);
        report.gp = match ffi::pt(ffi::PT_SETREGS, pid, (&mut regs as *mut ffi::reg).cast(), 0) {
            Ok(_) => ClassOutcome::Transferred,
            Err(err) => {
                warn!(%tid, %err, "general-purpose register write failed");
                ClassOutcome::Failed
            }
        };
    }

    if let Some(fpu) = &snapshot.fpu {
        let mut fpregs = fpu_to_kernel(fpu);
        report.fpu = match ffi::pt(ffi::PT_SETFPREGS, pid, (&mut fpregs as *mut ffi::fxsave64).cast(), 0) {
            Ok(_) => ClassOutcome::Transferred,
            Err(err) => {
                warn!(%tid, %err, "FPU register write failed");
                ClassOutcome::Failed
            }
        };
    }

    report
}

fn gp_from_kernel(regs: &ffi::reg) -> X86_64Gp
{
    X86_64Gp {
        r15: regs.r_r15 as u64,
        r14: regs.r_r14 as u64,
        r13: regs.r_r13 as u64,
        r12: regs.r_r12 as u64,
        rbp: regs.r_rbp as u64,
        rbx: regs.r_rbx as u64,
        r11: regs.r_r11 as u64,
        r10: regs.r_r10 as u64,
        r9: regs.r_r9 as u64,
        r8: regs.r_r8 as u64,
        rax: regs.r_rax as u64,
        rcx: regs.r_rcx as u64,
        rdx: regs.r_rdx as u64,
        rsi: regs.r_rsi as u64,
        rdi: regs.r_rdi as u64,
        orig_rax: 0,
        rip: regs.r_rip as u64,
        cs: regs.r_cs as u64,
        rflags: regs.r_rflags as u64,
        rsp: regs.r_rsp as u64,
        ss: regs.r_ss as u64,
        fs_base: 0,
        gs_base: 0,
        ds: regs.r_ds as u64,
        es: regs.r_es as u64,
        fs: regs.r_fs as u64,
        gs: regs.r_gs as u64,
    }
}

fn gp_to_kernel(gp: &X86_64Gp) -> ffi::reg
{
    ffi::reg {
        r_rdi: gp.rdi as i64,
        r_rsi: gp.rsi as i64,
        r_rdx: gp.rdx as i64,
        r_rcx: gp.rcx as i64,
        r_r8: gp.r8 as i64,
        r_r9: gp.r9 as i64,
        r_r10: gp.r10 as i64,
        r_r11: gp.r11 as i64,
        r_r12: gp.r12 as i64,
        r_r13: gp.r13 as i64,
        r_r14: gp.r14 as i64,
        r_r15: gp.r15 as i64,
        r_rbp: gp.rbp as i64,
        r_rbx: gp.rbx as i64,
        r_rax: gp.rax as i64,
        r_rsp: gp.rsp as i64,
        r_rip: gp.rip as i64,
        r_rflags: gp.rflags as i64,
        r_cs: gp.cs as i64,
        r_ss: gp.ss as i64,
        r_ds: gp.ds as i64,
        r_es: gp.es as i64,
        r_fs: gp.fs as i64,
        r_gs: gp.gs as i64,
    }
}

fn fpu_from_kernel(fx: &ffi::fxsave64) -> X86_64Fpu
{
    let mut fpu = X86_64Fpu {
        cwd: fx.fx_fcw,
        swd: fx.fx_fsw,
        ftw: u16::from(fx.fx_ftw),
        fop: fx.fx_fop,
        rip: fx.fx_rip,
        rdp: fx.fx_rdp,
        mxcsr: fx.fx_mxcsr,
        mxcsr_mask: fx.fx_mxcsr_mask,
        ..X86_64Fpu::default()
    };
    fpu.st_space = unsafe { mem::transmute::<[[u64; 2]; 8], [u32; 32]>(fx.fx_st) };
    fpu.xmm_space = unsafe { mem::transmute::<[[u64; 2]; 16], [u32; 64]>(fx.fx_xmm) };
    fpu
}

fn fpu_to_kernel(fpu: &X86_64Fpu) -> ffi::fxsave64
{
    let mut fx = ffi::fxsave64 {
        fx_fcw: fpu.cwd,
        fx_fsw: fpu.swd,
        fx_ftw: fpu.ftw as u8,
        fx_fop: fpu.fop,
        fx_rip: fpu.rip,
        fx_rdp: fpu.rdp,
        fx_mxcsr: fpu.mxcsr,
        fx_mxcsr_mask: fpu.mxcsr_mask,
        ..ffi::fxsave64::default()
    };
    fx.fx_st = unsafe { mem::transmute::<[u32; 32], [[u64; 2]; 8]>(fpu.st_space) };
    fx.fx_xmm = unsafe { mem::transmute::<[u32; 64], [[u64; 2]; 16]>(fpu.xmm_space) };
    fx
}
