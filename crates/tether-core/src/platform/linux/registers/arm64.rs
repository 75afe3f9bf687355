//! AArch64 register marshaling.
//!
//! Two classes: general-purpose (`NT_PRSTATUS`) and FP/SIMD (`NT_PRFPREG`).
//! Linux exposes no userspace path to the AArch64 hardware debug registers,
//! so the debug class is reported unsupported rather than faked.

use libc::{user_fpsimd_struct, user_regs_struct};
use std::mem;
use tracing::warn;

use crate::state::{Arm64Fpu, Arm64Gp, Arm64State, ClassOutcome, ThreadState, TransferReport};
use crate::types::ThreadId;

use super::{get_regset, set_regset};

pub(crate) fn capture(tid: ThreadId, state: &mut ThreadState) -> TransferReport
{
    let mut snapshot = Arm64State::default();
    let mut report = TransferReport::skipped();
    report.debug = ClassOutcome::Unsupported;

    match get_regset::<user_regs_struct>(tid, libc::NT_PRSTATUS) {
        Ok(regs) => {
            snapshot.gp = Some(Arm64Gp {
                x: regs.regs,
                sp: regs.sp,
                pc: regs.pc,
                pstate: regs.pstate,
            });
            report.gp = ClassOutcome::Transferred;
        }
        Err(err) => {
            warn!(%tid, %err, "general-purpose register read failed");
            report.gp = ClassOutcome::Failed;
        }
    }

    match get_regset::<user_fpsimd_struct>(tid, libc::NT_PRFPREG) {
        Ok(fpsimd) => {
            snapshot.fpu = Some(Arm64Fpu {
                vregs: fpsimd.vregs,
                fpsr: fpsimd.fpsr,
                fpcr: fpsimd.fpcr,
            });
            report.fpu = ClassOutcome::Transferred;
        }
        Err(err) => {
            warn!(%tid, %err, "FP/SIMD register read failed");
            report.fpu = ClassOutcome::Failed;
        }
    }

    *state = ThreadState::Arm64(snapshot);
    report
}

pub(crate) fn apply(tid: ThreadId, state: &ThreadState) -> TransferReport
{
    let snapshot = match state {
        ThreadState::Arm64(snapshot) => snapshot,
        ThreadState::Empty => return TransferReport::skipped(),
        ThreadState::X86_64(_) => {
            warn!(%tid, "snapshot architecture does not match the tracee");
            return TransferReport {
                gp: ClassOutcome::Failed,
                fpu: ClassOutcome::Failed,
                debug: ClassOutcome::Failed,
            };
        }
    };

    let mut report = TransferReport::skipped();
    report.debug = ClassOutcome::Unsupported;

    if let Some(gp) = &snapshot.gp {
        let mut regs: user_regs_struct = unsafe { mem::zeroed() };
        regs.regs = gp.x;
        regs.sp = gp.sp;
        regs.pc = gp.pc;
        regs.pstate = gp.pstate;
        report.gp = match set_regset(tid, libc::NT_PRSTATUS, &regs) {
            Ok(()) => ClassOutcome::Transferred,
            Err(err) => {
                warn!(%tid, %err, "general-purpose register write failed");
                ClassOutcome::Failed
            }
        };
    }

    if let Some(fpu) = &snapshot.fpu {
        let mut fpsimd: user_fpsimd_struct = unsafe { mem::zeroed() };
        fpsimd.vregs = fpu.vregs;
        fpsimd.fpsr = fpu.fpsr;
        fpsimd.fpcr = fpu.fpcr;
        report.fpu = match set_regset(tid, libc::NT_PRFPREG, &fpsimd) {
            Ok(()) => ClassOutcome::Transferred,
            Err(err) => {
                warn!(%tid, %err, "FP/SIMD register write failed");
                ClassOutcome::Failed
            }
        };
    }

    report
}
