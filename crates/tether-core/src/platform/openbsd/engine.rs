//! The OpenBSD process-control engine.
//!
//! Same session model as the Linux backend, expressed in `PT_*` requests:
//! attach/detach/kill over the leader, `(caddr_t)1` continue address for
//! resume and step, stop broadcast via `SIGSTOP`, and a `WNOHANG` polling
//! sweep for the bounded event wait.

use std::collections::BTreeMap;
use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::ptr;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::breakpoints::{trap_word, PatchSet, TrapPatch};
use crate::debugger::Debugger;
use crate::error::{Result, TetherError};
use crate::event::{resume_signal, DebugEvent, ResumeDisposition};
use crate::state::{ThreadState, TransferReport};
use crate::threads::ThreadRegistry;
use crate::types::{Address, LaunchParams, ProcessId, ProcessRecord, Region, ThreadId};

use super::{ffi, registers, sysctl};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// OpenBSD `ptrace` debugger backend
pub struct OpenBsdDebugger
{
    attached: bool,
    leader: Option<ProcessId>,
    active_thread: Option<ThreadId>,
    threads: ThreadRegistry,
    patches: PatchSet,
    pending_event: Option<DebugEvent>,
    page_size: u64,
}

impl OpenBsdDebugger
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

    fn leader_thread(&self) -> Option<ThreadId>
    {
        self.leader.map(ThreadId::from)
    }

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

    fn absorb_event(&mut self, event: &DebugEvent)
    {
        self.threads.record_status(event.thread(), event.raw_status());
        self.active_thread = Some(event.thread());

        if event.is_terminal() {
            if Some(event.thread()) == self.leader_thread() {
                self.teardown("tracee exited");
            } else {
                self.threads.remove(event.thread());
            }
        }
    }

    /// One `WNOHANG` poll of a thread; `Ok(None)` when nothing is pending.
    fn poll_status(tid: ThreadId) -> io::Result<Option<i32>>
    {
        let mut status: libc::c_int = 0;
        let rc = unsafe { libc::waitpid(tid.raw() as libc::pid_t, &mut status, libc::WNOHANG) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok((rc != 0).then_some(status))
    }

    fn wait_blocking(tid: ThreadId) -> io::Result<i32>
    {
        let mut status: libc::c_int = 0;
        loop {
            let rc = unsafe { libc::waitpid(tid.raw() as libc::pid_t, &mut status, 0) };
            if rc == -1 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            return Ok(status);
        }
    }

    fn continue_active(&mut self, disposition: ResumeDisposition, request: libc::c_int) -> Result<()>
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

        ffi::pt(request, tid.raw() as libc::pid_t, ffi::continue_addr(), code)?;
        Ok(())
    }
}

impl Default for OpenBsdDebugger
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl Debugger for OpenBsdDebugger
{
    fn launch(&mut self, params: &LaunchParams) -> Result<()>
    {
        self.detach();

        let path = CString::new(params.path.as_os_str().as_bytes())
            .map_err(|_| TetherError::InvalidArgument("target path contains a NUL byte".to_string()))?;
        let mut argv_owned = vec![path.clone()];
        for arg in &params.args {
            argv_owned.push(
                CString::new(arg.as_bytes())
                    .map_err(|_| TetherError::InvalidArgument(format!("argument contains a NUL byte: {arg:?}")))?,
            );
        }
        let tty = params
            .tty
            .as_ref()
            .map(|tty| CString::new(tty.as_os_str().as_bytes()))
            .transpose()
            .map_err(|_| TetherError::InvalidArgument("tty path contains a NUL byte".to_string()))?;
        let working_dir = params
            .working_dir
            .as_ref()
            .map(|dir| CString::new(dir.as_os_str().as_bytes()))
            .transpose()
            .map_err(|_| TetherError::InvalidArgument("working dir contains a NUL byte".to_string()))?;

        let child = match unsafe { libc::fork() } {
            -1 => {
                return Err(TetherError::LaunchFailed(format!(
                    "fork failed: {}",
                    io::Error::last_os_error()
                )))
            }
            0 => {
                // Child: request tracing, redirect, exec. Exec failure is
                // fatal here; this half of the fork must never return.
                let _ = ffi::pt(ffi::PT_TRACE_ME, 0, ptr::null_mut(), 0);

                if let Some(tty) = &tty {
                    let fd = unsafe { libc::open(tty.as_ptr(), libc::O_RDWR) };
                    if fd != -1 {
                        unsafe {
                            libc::dup2(fd, libc::STDIN_FILENO);
                            libc::dup2(fd, libc::STDOUT_FILENO);
                            libc::dup2(fd, libc::STDERR_FILENO);
                        }
                    }
                }
                if let Some(dir) = &working_dir {
                    unsafe {
                        libc::chdir(dir.as_ptr());
                    }
                }

                let mut argv: Vec<*const libc::c_char> = argv_owned.iter().map(|arg| arg.as_ptr()).collect();
                argv.push(ptr::null());
                unsafe {
                    libc::execv(path.as_ptr(), argv.as_ptr());
                }
                std::process::abort();
            }
            pid => pid,
        };

        let tid = ThreadId(child as u32);
        let status = Self::wait_blocking(tid)
            .map_err(|err| TetherError::LaunchFailed(format!("wait for first stop failed: {err}")))?;

        if !(libc::WIFSTOPPED(status) && libc::WSTOPSIG(status) == libc::SIGTRAP) {
            if libc::WIFSTOPPED(status) {
                unsafe {
                    libc::kill(child, libc::SIGKILL);
                }
                let _ = Self::wait_blocking(tid);
            }
            return Err(TetherError::LaunchFailed(format!(
                "unexpected first stop (raw status {status:#x})"
            )));
        }

        let pid = ProcessId(child as u32);
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

        ffi::pt(ffi::PT_ATTACH, pid.raw() as libc::pid_t, ptr::null_mut(), 0).map_err(|err| {
            match err.raw_os_error() {
                Some(libc::ESRCH) => TetherError::ProcessNotFound(pid.raw()),
                Some(libc::EPERM) | Some(libc::EACCES) => {
                    TetherError::PermissionDenied(format!("ptrace attach to {pid}: {err}"))
                }
                _ => TetherError::AttachFailed(format!("pid {pid}: {err}")),
            }
        })?;

        let tid = ThreadId::from(pid);
        self.attached = true;
        self.leader = Some(pid);
        self.active_thread = Some(tid);
        self.threads.register(tid);
        // Only the initial thread is attached; see the trait contract

        info!(%pid, "attached to tracee");
        Ok(())
    }

    fn detach(&mut self)
    {
        if !self.attached {
            return;
        }

        self.clear_breakpoints();

        for tid in self.threads.ids() {
            if let Err(err) = ffi::pt(ffi::PT_DETACH, tid.raw() as libc::pid_t, ffi::continue_addr(), 0) {
                warn!(%tid, %err, "ptrace detach failed");
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
            let _ = ffi::pt(ffi::PT_KILL, leader.raw() as libc::pid_t, ptr::null_mut(), 0);
            if let Err(err) = Self::wait_blocking(leader) {
                warn!(%err, "reap after kill failed");
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
        for tid in self.threads.ids() {
            unsafe {
                libc::kill(tid.raw() as libc::pid_t, libc::SIGSTOP);
            }
        }
    }

    fn resume(&mut self, disposition: ResumeDisposition) -> Result<()>
    {
        self.continue_active(disposition, ffi::PT_CONTINUE)
    }

    fn step(&mut self, disposition: ResumeDisposition) -> Result<()>
    {
        self.continue_active(disposition, ffi::PT_STEP)
    }

    fn wait_debug_event(&mut self, timeout: Option<Duration>) -> Result<Option<DebugEvent>>
    {
        if !self.attached {
            return Ok(None);
        }
        if let Some(event) = self.pending_event.take() {
            return Ok(Some(event));
        }

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            for tid in self.threads.ids() {
                match Self::poll_status(tid) {
                    Ok(Some(status)) => {
                        let pid = self.leader.unwrap_or(ProcessId(tid.raw()));
                        let event = DebugEvent::new(status, pid, tid);
                        self.absorb_event(&event);
                        debug!(%event, "debug event");
                        return Ok(Some(event));
                    }
                    Ok(None) => {}
                    Err(err) if err.raw_os_error() == Some(libc::ECHILD) => {
                        warn!(%tid, "thread disappeared without a terminal event");
                        self.threads.remove(tid);
                        if Some(tid) == self.leader_thread() || self.threads.is_empty() {
                            self.teardown("leader thread lost");
                        }
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            if !self.attached {
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
        let pid = tid.raw() as libc::pid_t;

        // PT_READ_D moves an int at a time; compose the 64-bit word
        let low = ffi::pt_read(pid, address.value() as usize as *mut libc::c_char)
            .map_err(|err| access_error(err, address))? as u32;
        let high = ffi::pt_read(pid, (address.value() + 4) as usize as *mut libc::c_char)
            .map_err(|err| access_error(err, address))? as u32;
        Ok(u64::from(low) | (u64::from(high) << 32))
    }

    fn write_word(&mut self, address: Address, value: u64) -> Result<()>
    {
        let Some(tid) = self.active_thread.filter(|_| self.attached) else {
            return Err(TetherError::NotAttached);
        };
        let pid = tid.raw() as libc::pid_t;

        ffi::pt(
            ffi::PT_WRITE_D,
            pid,
            address.value() as usize as *mut libc::c_char,
            value as u32 as libc::c_int,
        )
        .map_err(|err| access_error(err, address))?;
        ffi::pt(
            ffi::PT_WRITE_D,
            pid,
            (address.value() + 4) as usize as *mut libc::c_char,
            (value >> 32) as u32 as libc::c_int,
        )
        .map_err(|err| access_error(err, address))?;
        Ok(())
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
        let patched = trap_word(original_word)
            .ok_or_else(|| TetherError::InvalidArgument("no trap encoding for this architecture".to_string()))?;
        self.write_word(address, patched)?;
        self.patches.insert(TrapPatch { address, original_word });
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
        self.write_word(patch.address, patch.original_word)
    }

    fn clear_breakpoints(&mut self)
    {
        let patches = self.patches.drain();
        if patches.is_empty() {
            return;
        }
        for patch in patches {
            if let Err(err) = self.write_word(patch.address, patch.original_word) {
                warn!(address = %patch.address, %err, "failed to restore patched word");
            }
        }
    }

    fn memory_regions(&self) -> Result<Vec<Region>>
    {
        // The vm map sysctl (KERN_PROC_VMMAP) is restricted and its record
        // layout is release-dependent; region enumeration is not supported
        // on this backend
        Ok(Vec::new())
    }

    fn enumerate_processes(&self) -> Result<BTreeMap<ProcessId, ProcessRecord>>
    {
        sysctl::enumerate()
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

impl Drop for OpenBsdDebugger
{
    fn drop(&mut self)
    {
        self.detach();
    }
}

fn access_error(err: io::Error, address: Address) -> TetherError
{
    match err.raw_os_error() {
        Some(libc::EIO) | Some(libc::EFAULT) => TetherError::MemoryFault { address },
        _ => TetherError::Io(err),
    }
}
