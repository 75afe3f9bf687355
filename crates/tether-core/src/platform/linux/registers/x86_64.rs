//! x86-64 register marshaling.
//!
//! Three classes: general-purpose registers (one `NT_PRSTATUS` regset,
//! segment selectors and fs/gs bases included), the FXSAVE FPU/SSE block
//! (`NT_PRFPREG`), and the DR0-DR7 debug registers (user-area words, since
//! Linux exposes no regset for them).

use std::io;
use std::mem;

use libc::{user, user_fpregs_struct, user_regs_struct};
use tracing::warn;

use crate::state::{ClassOutcome, DebugRegs, ThreadState, TransferReport, X86_64Fpu, X86_64Gp, X86_64State};
use crate::types::ThreadId;

use super::{get_regset, peek_user, poke_user, set_regset};

const DEBUGREG_OFFSET: usize = mem::offset_of!(user, u_debugreg);

pub(crate) fn capture(tid: ThreadId, state: &mut ThreadState) -> TransferReport
{
    let mut snapshot = X86_64State::default();
    let mut report = TransferReport::skipped();

    match get_regset::<user_regs_struct>(tid, libc::NT_PRSTATUS) {
        Ok(regs) => {
            snapshot.gp = Some(gp_from_kernel(&regs));
            report.gp = ClassOutcome::Transferred;
        }
        Err(err) => {
            warn!(%tid, %err, "general-purpose register read failed");
            report.gp = ClassOutcome::Failed;
        }
    }

    // A failed class never blocks the remaining ones
    match get_regset::<user_fpregs_struct>(tid, libc::NT_PRFPREG) {
        Ok(fpregs) => {
            snapshot.fpu = Some(fpu_from_kernel(&fpregs));
            report.fpu = ClassOutcome::Transferred;
        }
        Err(err) => {
            warn!(%tid, %err, "FPU register read failed");
            report.fpu = ClassOutcome::Failed;
        }
    }

    match read_debug_regs(tid) {
        Ok(debug) => {
            snapshot.debug = Some(debug);
            report.debug = ClassOutcome::Transferred;
        }
        Err(err) => {
            warn!(%tid, %err, "debug register read failed");
            report.debug = ClassOutcome::Failed;
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

    let mut report = TransferReport::skipped();

    if let Some(gp) = &snapshot.gp {
        let regs = gp_to_kernel(gp);
        report.gp = match set_regset(tid, libc::NT_PRSTATUS, &regs) {
            Ok(()) => ClassOutcome::Transferred,
            Err(err) => {
                warn!(%tid, %err, "general-purpose register write failed");
                ClassOutcome::Failed
            }
        };
    }

    if let Some(fpu) = &snapshot.fpu {
        let fpregs = fpu_to_kernel(fpu);
        report.fpu = match set_regset(tid, libc::NT_PRFPREG, &fpregs) {
            Ok(()) => ClassOutcome::Transferred,
            Err(err) => {
                warn!(%tid, %err, "FPU register write failed");
                ClassOutcome::Failed
            }
        };
    }

    if let Some(debug) = &snapshot.debug {
        report.debug = match write_debug_regs(tid, debug) {
            Ok(()) => ClassOutcome::Transferred,
            Err(err) => {
                warn!(%tid, %err, "debug register write failed");
                ClassOutcome::Failed
            }
        };
    }

    report
}

fn gp_from_kernel(regs: &user_regs_struct) -> X86_64Gp
{
    X86_64Gp {
        r15: regs.r15,
        r14: regs.r14,
        r13: regs.r13,
        r12: regs.r12,
        rbp: regs.rbp,
        rbx: regs.rbx,
        r11: regs.r11,
        r10: regs.r10,
        r9: regs.r9,
        r8: regs.r8,
        rax: regs.rax,
        rcx: regs.rcx,
        rdx: regs.rdx,
        rsi: regs.rsi,
        rdi: regs.rdi,
        orig_rax: regs.orig_rax,
        rip: regs.rip,
        cs: regs.cs,
        rflags: regs.eflags,
        rsp: regs.rsp,
        ss: regs.ss,
        fs_base: regs.fs_base,
        gs_base: regs.gs_base,
        ds: regs.ds,
        es: regs.es,
        fs: regs.fs,
        gs: regs.gs,
    }
}

fn gp_to_kernel(gp: &X86_64Gp) -> user_regs_struct
{
    let mut regs: user_regs_struct = unsafe { mem::zeroed() };
    regs.r15 = gp.r15;
    regs.r14 = gp.r14;
    regs.r13 = gp.r13;
    regs.r12 = gp.r12;
    regs.rbp = gp.rbp;
    regs.rbx = gp.rbx;
    regs.r11 = gp.r11;
    regs.r10 = gp.r10;
    regs.r9 = gp.r9;
    regs.r8 = gp.r8;
    regs.rax = gp.rax;
    regs.rcx = gp.rcx;
    regs.rdx = gp.rdx;
    regs.rsi = gp.rsi;
    regs.rdi = gp.rdi;
    regs.orig_rax = gp.orig_rax;
    regs.rip = gp.rip;
    regs.cs = gp.cs;
    regs.eflags = gp.rflags;
    regs.rsp = gp.rsp;
    regs.ss = gp.ss;
    regs.fs_base = gp.fs_base;
    regs.gs_base = gp.gs_base;
    regs.ds = gp.ds;
    regs.es = gp.es;
    regs.fs = gp.fs;
    regs.gs = gp.gs;
    regs
}

fn fpu_from_kernel(fpregs: &user_fpregs_struct) -> X86_64Fpu
{
    X86_64Fpu {
        cwd: fpregs.cwd,
        swd: fpregs.swd,
        ftw: fpregs.ftw,
        fop: fpregs.fop,
        rip: fpregs.rip,
        rdp: fpregs.rdp,
        mxcsr: fpregs.mxcsr,
        mxcsr_mask: fpregs.mxcr_mask,
        st_space: fpregs.st_space,
        xmm_space: fpregs.xmm_space,
    }
}

fn fpu_to_kernel(fpu: &X86_64Fpu) -> user_fpregs_struct
{
    let mut fpregs: user_fpregs_struct = unsafe { mem::zeroed() };
    fpregs.cwd = fpu.cwd;
    fpregs.swd = fpu.swd;
    fpregs.ftw = fpu.ftw;
    fpregs.fop = fpu.fop;
    fpregs.rip = fpu.rip;
    fpregs.rdp = fpu.rdp;
    fpregs.mxcsr = fpu.mxcsr;
    fpregs.mxcr_mask = fpu.mxcsr_mask;
    fpregs.st_space = fpu.st_space;
    fpregs.xmm_space = fpu.xmm_space;
    fpregs
}

fn read_debug_regs(tid: ThreadId) -> io::Result<DebugRegs>
{
    let mut dr = [0u64; 8];
    for (slot, value) in dr.iter_mut().enumerate() {
        *value = peek_user(tid, DEBUGREG_OFFSET + slot * mem::size_of::<u64>())?;
    }
    Ok(DebugRegs { dr })
}

fn write_debug_regs(tid: ThreadId, debug: &DebugRegs) -> io::Result<()>
{
    // DR4 and DR5 are architecturally reserved; poking them can fault
    for slot in [0usize, 1, 2, 3, 6, 7] {
        poke_user(tid, DEBUGREG_OFFSET + slot * mem::size_of::<u64>(), debug.dr[slot])?;
    }
    Ok(())
}
