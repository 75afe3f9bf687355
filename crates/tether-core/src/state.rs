//! # Thread State Snapshots
//!
//! Portable per-thread register snapshots.
//!
//! A [`ThreadState`] is a captured copy of one thread's register sets with no
//! live binding to the tracee: once obtained it only changes when the caller
//! mutates it, and it only reaches the tracee again through an explicit
//! apply. The kernel's own register structures never cross the backend
//! boundary; each backend marshals them field by field into the tagged
//! per-architecture representation here.
//!
//! Register classes transfer independently. General-purpose registers move
//! as one unit; the FPU block and the hardware debug registers are separate
//! units that may each fail (or be unsupported on a backend) without
//! invalidating the classes already transferred. [`TransferReport`] carries
//! the per-class outcome of every capture and apply.

use crate::types::Address;

/// Outcome of transferring one register class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassOutcome
{
    /// The class was read or written successfully.
    Transferred,
    /// The OS call for this class failed; other classes are unaffected.
    Failed,
    /// The backend or architecture does not expose this class.
    Unsupported,
    /// Nothing was attempted (detached session, or the snapshot does not
    /// carry this class).
    #[default]
    Skipped,
}

/// Per-class outcome of a state capture or apply
///
/// Partial success is normal: a backend commonly supports a subset of the
/// register classes, and a combined transfer reports what happened to each
/// instead of collapsing into one all-or-nothing flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferReport
{
    /// General-purpose register outcome.
    pub gp: ClassOutcome,
    /// Floating-point register outcome.
    pub fpu: ClassOutcome,
    /// Hardware debug register outcome.
    pub debug: ClassOutcome,
}

impl TransferReport
{
    /// Report for an operation that never reached the kernel (detached
    /// session): every class skipped.
    pub const fn skipped() -> Self
    {
        Self {
            gp: ClassOutcome::Skipped,
            fpu: ClassOutcome::Skipped,
            debug: ClassOutcome::Skipped,
        }
    }

    /// Report for a backend with no state support at all.
    pub const fn unsupported() -> Self
    {
        Self {
            gp: ClassOutcome::Unsupported,
            fpu: ClassOutcome::Unsupported,
            debug: ClassOutcome::Unsupported,
        }
    }

    /// Whether the general-purpose class transferred.
    pub fn gp_transferred(&self) -> bool
    {
        self.gp == ClassOutcome::Transferred
    }
}

/// x86-64 general-purpose registers, flags, segments, and segment bases
///
/// Field names follow the architecture; values are exactly what the kernel
/// reported, including `orig_rax` so a capture/apply round trip is
/// bit-faithful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct X86_64Gp
{
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub orig_rax: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
    pub fs_base: u64,
    pub gs_base: u64,
    pub ds: u64,
    pub es: u64,
    pub fs: u64,
    pub gs: u64,
}

/// x86-64 FPU/SSE state in the kernel's FXSAVE layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct X86_64Fpu
{
    pub cwd: u16,
    pub swd: u16,
    pub ftw: u16,
    pub fop: u16,
    pub rip: u64,
    pub rdp: u64,
    pub mxcsr: u32,
    pub mxcsr_mask: u32,
    /// ST0-ST7 in 16-byte slots.
    pub st_space: [u32; 32],
    /// XMM0-XMM15 in 16-byte slots.
    pub xmm_space: [u32; 64],
}

impl Default for X86_64Fpu
{
    fn default() -> Self
    {
        Self {
            cwd: 0,
            swd: 0,
            ftw: 0,
            fop: 0,
            rip: 0,
            rdp: 0,
            mxcsr: 0,
            mxcsr_mask: 0,
            st_space: [0; 32],
            xmm_space: [0; 64],
        }
    }
}

/// x86-64 hardware debug registers DR0-DR7
///
/// Slots 4 and 5 are architecturally reserved and always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugRegs
{
    /// DR0-DR7 by index.
    pub dr: [u64; 8],
}

/// AArch64 general-purpose registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(missing_docs)]
pub struct Arm64Gp
{
    /// X0-X30.
    pub x: [u64; 31],
    pub sp: u64,
    pub pc: u64,
    pub pstate: u64,
}

/// AArch64 FP/SIMD state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Arm64Fpu
{
    /// V0-V31.
    pub vregs: [u128; 32],
    pub fpsr: u32,
    pub fpcr: u32,
}

impl Default for Arm64Fpu
{
    fn default() -> Self
    {
        Self {
            vregs: [0; 32],
            fpsr: 0,
            fpcr: 0,
        }
    }
}

/// Captured x86-64 thread state
///
/// Each class is `Some` only if the capture that produced this snapshot
/// transferred it; an apply skips absent classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct X86_64State
{
    /// General-purpose registers.
    pub gp: Option<X86_64Gp>,
    /// FPU/SSE state.
    pub fpu: Option<X86_64Fpu>,
    /// Hardware debug registers.
    pub debug: Option<DebugRegs>,
}

/// Captured AArch64 thread state
///
/// Userspace debug-register access is not exposed on this architecture, so
/// there is no debug class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Arm64State
{
    /// General-purpose registers.
    pub gp: Option<Arm64Gp>,
    /// FP/SIMD state.
    pub fpu: Option<Arm64Fpu>,
}

/// Opaque per-thread register snapshot, tagged by architecture
///
/// Start from [`ThreadState::default()`] (empty), fill it with
/// [`Debugger::get_state`](crate::Debugger::get_state), and hand it back via
/// [`Debugger::set_state`](crate::Debugger::set_state). Capturing on a
/// detached session clears the destination back to `Empty`.
///
/// ## Example
///
/// ```rust
/// use tether_core::state::ThreadState;
///
/// let state = ThreadState::default();
/// assert!(state.is_empty());
/// assert_eq!(state.program_counter(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadState
{
    /// No state captured.
    #[default]
    Empty,
    /// x86-64 snapshot.
    X86_64(X86_64State),
    /// AArch64 snapshot.
    Arm64(Arm64State),
}

impl ThreadState
{
    /// Reset the snapshot to empty.
    pub fn clear(&mut self)
    {
        *self = ThreadState::Empty;
    }

    /// Whether the snapshot carries no state.
    pub fn is_empty(&self) -> bool
    {
        matches!(self, ThreadState::Empty)
    }

    /// Program counter from the general-purpose class, if captured.
    pub fn program_counter(&self) -> Option<Address>
    {
        match self {
            ThreadState::X86_64(state) => state.gp.map(|gp| Address::new(gp.rip)),
            ThreadState::Arm64(state) => state.gp.map(|gp| Address::new(gp.pc)),
            ThreadState::Empty => None,
        }
    }

    /// Stack pointer from the general-purpose class, if captured.
    pub fn stack_pointer(&self) -> Option<Address>
    {
        match self {
            ThreadState::X86_64(state) => state.gp.map(|gp| Address::new(gp.rsp)),
            ThreadState::Arm64(state) => state.gp.map(|gp| Address::new(gp.sp)),
            ThreadState::Empty => None,
        }
    }
}
