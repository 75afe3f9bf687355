//! The Linux process-control engine.
//!
//! [`LinuxDebugger`] owns the attach state machine and is the only place in
//! this backend that issues tracing syscalls. The session fields mirror the
//! contract's data model: an `attached` flag, the leader pid, the active
//! thread, the page size, and the thread registry. Every mutating operation
//! checks `attached` first and degrades to a no-op, so a caller never has to
//! pre-check session state.
//!
//! ## Event-wait strategy
//!
//! `wait_debug_event` sweeps the registered threads with `WNOHANG` polls
//! instead of waiting on `-1`. Waiting on `-1` would reap status changes
//! belonging to *any* child of this process, including tracees of a second,
//! independent engine instance, and a stolen status cannot be put back.
//! Sweeping costs a few syscalls per poll interval and keeps sessions fully
//! isolated from each other.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::ptrace;
use nix::sys::signal::{kill, Signal};
use tracing::{debug, info, warn};

use crate::breakpoints::{trap_word, PatchSet, TrapPatch};
use crate::debugger::Debugger;
use crate::error::{Result, TetherError};
use crate::event::{resume_signal, DebugEvent, ResumeDisposition};
use crate::state::{ThreadState, TransferReport};
use crate::threads::ThreadRegistry;
use crate::types::{Address, LaunchParams, ProcessId, ProcessRecord, Region, ThreadId};

use super::wait::PollOutcome;
use super::{launch, memory, nix_pid, procfs, registers, wait};

/// Sweep granularity of the bounded event wait.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Linux `ptrace` debugger backend
pub struct LinuxDebugger
{
    /// Whether a session is live. Guards every mutating operation.
    attached: bool,
    /// Leader pid of the attached tracee.
    leader: Option<ProcessId>,
    /// Thread targeted by register and memory operations.
    active_thread: Option<ThreadId>,
    /// Registry of observed tracee threads and their last wait status.
    threads: ThreadRegistry,
    /// Installed breakpoint trap patches, restored before losing control.
    patches: PatchSet,
    /// Event recorded during launch, delivered by the first wait call.
    pending_event: Option<DebugEvent>,
    /// System page size, queried once at construction.
    page_size: u64,
}

impl LinuxDebugger
{
    /// Create a detached engine instance.
    pub fn new() -> Self
    {
        let page_size = match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
            size if size > 0 => size as u64,
            _ => 4096,
        };

        Self {
            attached: false,
            leader: None,
            active_thread: None,
            threads: ThreadRegistry::new(),
            patches: PatchSet::new(),
            pending_event: None,
            page_size,
        }
    }

    /// Leader pid as a thread id (the initial thread shares the pid).
    fn leader_thread(&self) -> Option<ThreadId>
    {
        self.leader.map(ThreadId::from)
    }

    /// Drop all session state. The tracee itself is untouched.
    fn teardown(&mut self, why: &str)
    {
        debug!(pid = ?self.leader, why, "session teardown");
        self.attached = false;
        self.leader = None;
        self.active_thread = None;
        self.threads.clear();
        self.patches.clear();
        self.pending_event = None;
    }

    /// Fold one observed status change into the session.
    fn absorb_event(&mut self, event: &DebugEvent)
    {
        self.threads.record_status(event.thread(), event.raw_status());
        self.active_thread = Some(event.thread());

        if event.is_terminal() {
            if Some(event.thread()) == self.leader_thread() {
                // Leader gone means the session is over; its resources are
                // already reaped by the waitpid that produced this event
                self.teardown("tracee exited");
            } else {
                self.threads.remove(event.thread());
            }
        }
    }

    /// A polled thread the kernel no longer recognizes.
    fn forget_thread(&mut self, tid: ThreadId)
    {
        warn!(%tid, "thread disappeared without a terminal event");
        self.threads.remove(tid);
        if Some(tid) == self.leader_thread() || self.threads.is_empty() {
            self.teardown("leader thread lost");
        } else if self.active_thread == Some(tid) {
            self.active_thread = self.leader_thread();
        }
    }

    /// Shared body of `resume` and `step`.
    fn continue_active(&mut self, disposition: ResumeDisposition, single_step: bool) -> Result<()>
    {
        if !self.attached || disposition == ResumeDisposition::Stop {
            return Ok(());
        }
        let Some(tid) = self.active_thread else {
            return Ok(());
        };

        let code = match disposition {
            ResumeDisposition::ExceptionNotHandled => resume_signal(self.threads.last_status(tid).unwrap_or(0)),
            _ => 0,
        };
        let signal = if code != 0 {
            Some(
                Signal::try_from(code)
                    .map_err(|_| TetherError::InvalidArgument(format!("cannot forward signal {code}")))?,
            )
        } else {
            None
        };

        debug!(%tid, code, single_step, "continuing tracee");
        if single_step {
            ptrace::step(nix_pid(tid), signal)?;
        } else {
            ptrace::cont(nix_pid(tid), signal)?;
        }
        Ok(())
    }

    /// Kill and reap a half-launched child that never became a session.
    fn discard_child(child: ThreadId)
    {
        let _ = kill(nix_pid(child), Signal::SIGKILL);
        let _ = wait::wait_blocking(child);
    }
}

impl Default for LinuxDebugger
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Debugger for LinuxDebugger
{
    fn launch(&mut self, params: &LaunchParams) -> Result<()>
    {
        self.detach();

        let (child, status) = launch::spawn_traced(params)?;
        let tid = ThreadId(child.as_raw() as u32);

        // The very first event must be the exec trap; anything else means
        // the child died or was signalled before reaching the target
        if !(libc::WIFSTOPPED(status) && libc::WSTOPSIG(status) == libc::SIGTRAP) {
            if libc::WIFSTOPPED(status) {
                Self::discard_child(tid);
            }
            return Err(TetherError::LaunchFailed(format!(
                "unexpected first stop (raw status {status:#x})"
            )));
        }

        let pid = ProcessId(child.as_raw() as u32);
        self.attached = true;
        self.leader = Some(pid);
        self.active_thread = Some(tid);
        self.threads.record_status(tid, status);
        self.pending_event = Some(DebugEvent::new(status, pid, tid));

        info!(%pid, path = %params.path.display(), "launched tracee");
        Ok(())
    }

    fn attach(&mut self, pid: ProcessId) -> Result<()>
    {
        self.detach();

        ptrace::attach(nix_pid(ThreadId::from(pid))).map_err(|errno| match errno {
            nix::errno::Errno::ESRCH => TetherError::ProcessNotFound(pid.raw()),
            nix::errno::Errno::EPERM | nix::errno::Errno::EACCES => {
                TetherError::PermissionDenied(format!("ptrace attach to {pid}: {errno}"))
            }
            other => TetherError::AttachFailed(format!("pid {pid}: {other}")),
        })?;

        let tid = ThreadId::from(pid);
        self.attached = true;
        self.leader = Some(pid);
        self.active_thread = Some(tid);
        self.threads.register(tid);
        // Sibling threads of a multi-threaded target are not attached here;
        // the wait loop registers the ones the kernel reports

        info!(%pid, "attached to tracee");
        Ok(())
    }

    fn detach(&mut self)
    {
        if !self.attached {
            return;
        }

        // Traps must come out before control is released: a stray trap byte
        // in a no-longer-traced process is a crash waiting to happen
        self.clear_breakpoints();

        for tid in self.threads.ids() {
            if let Err(errno) = ptrace::detach(nix_pid(tid), None) {
                warn!(%tid, %errno, "ptrace detach failed");
            }
        }

        info!(pid = ?self.leader, "detached from tracee");
        self.teardown("detach requested");
    }

    fn kill(&mut self)
    {
        if !self.attached {
            return;
        }

        self.clear_breakpoints();

        if let Some(leader) = self.leader_thread() {
            let _ = kill(nix_pid(leader), Signal::SIGKILL);
            match wait::wait_blocking(leader) {
                Ok(status) => debug!(raw_status = status, "tracee reaped"),
                Err(err) => warn!(%err, "reap after kill failed"),
            }
        }

        info!(pid = ?self.leader, "killed tracee");
        self.teardown("kill requested");
    }

    fn pause(&mut self)
    {
        if !self.attached {
            return;
        }

        // Best effort by contract: the stops show up through the wait loop
        for tid in self.threads.ids() {
            let _ = kill(nix_pid(tid), Signal::SIGSTOP);
        }
    }

    fn resume(&mut self, disposition: ResumeDisposition) -> Result<()>
    {
        self.continue_active(disposition, false)
    }

    fn step(&mut self, disposition: ResumeDisposition) -> Result<()>
    {
        self.continue_active(disposition, true)
    }

    fn wait_debug_event(&mut self, timeout: Option<Duration>) -> Result<Option<DebugEvent>>
    {
        if !self.attached {
            return Ok(None);
        }

        // The launch stop was consumed while validating the exec trap;
        // deliver it as the first event of the session
        if let Some(event) = self.pending_event.take() {
            return Ok(Some(event));
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            for tid in self.threads.ids() {
                match wait::poll_status(tid)? {
                    PollOutcome::StatusChange(status) => {
                        let pid = self.leader.unwrap_or(ProcessId(tid.raw()));
                        let event = DebugEvent::new(status, pid, tid);
                        self.absorb_event(&event);
                        debug!(%event, "debug event");
                        return Ok(Some(event));
                    }
                    PollOutcome::NoChange => {}
                    PollOutcome::Gone => self.forget_thread(tid),
                }
            }

            if !self.attached {
                // The sweep lost the leader
                return Ok(None);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Ok(None);
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn get_state(&mut self, state: &mut ThreadState) -> TransferReport
    {
        if !self.attached {
            state.clear();
            return TransferReport::skipped();
        }
        let Some(tid) = self.active_thread else {
            state.clear();
            return TransferReport::skipped();
        };
        registers::capture(tid, state)
    }

    fn set_state(&mut self, state: &ThreadState) -> TransferReport
    {
        if !self.attached {
            return TransferReport::skipped();
        }
        let Some(tid) = self.active_thread else {
            return TransferReport::skipped();
        };
        registers::apply(tid, state)
    }

    fn read_word(&mut self, address: Address) -> Result<u64>
    {
        let Some(tid) = self.active_thread.filter(|_| self.attached) else {
            return Err(TetherError::NotAttached);
        };
        memory::read_word(tid, address)
    }

    fn write_word(&mut self, address: Address, value: u64) -> Result<()>
    {
        let Some(tid) = self.active_thread.filter(|_| self.attached) else {
            return Err(TetherError::NotAttached);
        };
        memory::write_word(tid, address, value)
    }

    fn set_breakpoint(&mut self, address: Address) -> Result<()>
    {
        if !self.attached {
            return Err(TetherError::NotAttached);
        }
        if self.patches.contains(address) {
            return Ok(());
        }

        let original_word = self.read_word(address)?;
        let patched =
            trap_word(original_word).ok_or_else(|| TetherError::InvalidArgument("no trap encoding for this architecture".to_string()))?;
        self.write_word(address, patched)?;
        self.patches.insert(TrapPatch { address, original_word });

        debug!(%address, "breakpoint installed");
        Ok(())
    }

    fn remove_breakpoint(&mut self, address: Address) -> Result<()>
    {
        if !self.attached {
            return Err(TetherError::NotAttached);
        }
        let Some(patch) = self.patches.remove(address) else {
            return Err(TetherError::InvalidArgument(format!("no breakpoint at {address}")));
        };
        self.write_word(patch.address, patch.original_word)?;

        debug!(%address, "breakpoint removed");
        Ok(())
    }

    fn clear_breakpoints(&mut self)
    {
        let Some(tid) = self.active_thread else {
            self.patches.clear();
            return;
        };
        for patch in self.patches.drain() {
            if let Err(err) = memory::write_word(tid, patch.address, patch.original_word) {
                warn!(address = %patch.address, %err, "failed to restore patched word");
            }
        }
    }

    fn memory_regions(&self) -> Result<Vec<Region>>
    {
        match self.leader {
            Some(pid) if self.attached => memory::regions(pid),
            _ => Ok(Vec::new()),
        }
    }

    fn enumerate_processes(&self) -> Result<BTreeMap<ProcessId, ProcessRecord>>
    {
        procfs::enumerate()
    }

    fn set_active_thread(&mut self, tid: ThreadId)
    {
        assert!(self.threads.contains(tid), "thread {tid} is not registered with this session");
        self.active_thread = Some(tid);
    }

    fn active_thread(&self) -> Option<ThreadId>
    {
        self.active_thread.filter(|_| self.attached)
    }

    fn attached(&self) -> bool
    {
        self.attached
    }

    fn pid(&self) -> Option<ProcessId>
    {
        self.leader.filter(|_| self.attached)
    }

    fn page_size(&self) -> u64
    {
        self.page_size
    }
}

impl Drop for LinuxDebugger
{
    fn drop(&mut self)
    {
        self.detach();
    }
}
