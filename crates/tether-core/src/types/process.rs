//! Process and thread identifiers, enumeration records, and launch requests.

use std::fmt;
use std::path::PathBuf;

/// Process identifier (PID)
///
/// Using a newtype instead of a raw `u32` keeps pids from being confused
/// with thread ids, uids, or wait statuses at call sites.
///
/// ## Example
///
/// ```rust
/// use tether_core::types::ProcessId;
///
/// let pid = ProcessId::from(12345);
/// assert_eq!(pid.raw(), 12345);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessId(pub u32);

impl ProcessId
{
    /// Get the raw `u32` representation of the process identifier
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier
///
/// On the ptrace-family backends a thread id is a kernel task id from the
/// same namespace as pids; the initial thread of a process has
/// `tid == pid`. Register and single-step operations always target one
/// specific thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId
{
    /// Get the raw `u32` representation of the thread identifier
    pub const fn raw(self) -> u32
    {
        self.0
    }
}

impl From<u32> for ThreadId
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl From<ProcessId> for ThreadId
{
    /// The initial thread of a process shares the process id.
    fn from(pid: ProcessId) -> Self
    {
        Self(pid.0)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// One row of a process-table snapshot
///
/// Produced by [`Debugger::enumerate_processes`](crate::Debugger::enumerate_processes).
/// A record is a point-in-time observation with no relationship to any
/// attached session: the process may be gone by the time the record is read.
///
/// `name` is best-effort and truncated to the kernel's command-name limit.
/// `parent_pid` is queried separately from the rest of the row, so a process
/// that exits between the two queries yields `0` rather than failing the
/// whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord
{
    /// Process ID.
    pub pid: u32,
    /// Real user id of the process owner.
    pub uid: u32,
    /// Command name, truncated to the OS limit.
    pub name: String,
    /// Parent process id, `0` if it could not be determined.
    pub parent_pid: u32,
}

/// Parameters for launching a tracee
///
/// Collects everything [`Debugger::launch`](crate::Debugger::launch) needs:
/// the executable path, an optional working directory, the argument list
/// (`argv[1..]`; the engine supplies `argv[0]` from the path), and an
/// optional terminal device the child's standard streams are redirected to.
///
/// ## Example
///
/// ```rust
/// use tether_core::types::LaunchParams;
///
/// let params = LaunchParams::new("/bin/cat")
///     .with_args(vec!["/etc/hostname".to_string()])
///     .with_tty("/dev/pts/3");
/// assert_eq!(params.args.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams
{
    /// Path to the executable.
    pub path: PathBuf,
    /// Working directory for the child; inherited from the debugger if `None`.
    pub working_dir: Option<PathBuf>,
    /// Arguments passed to the target (not including `argv[0]`).
    pub args: Vec<String>,
    /// Terminal device the child's stdin/stdout/stderr are reopened on.
    pub tty: Option<PathBuf>,
}

impl LaunchParams
{
    /// Create launch parameters for the given executable with no arguments,
    /// inherited working directory, and inherited standard streams.
    pub fn new(path: impl Into<PathBuf>) -> Self
    {
        Self {
            path: path.into(),
            working_dir: None,
            args: Vec::new(),
            tty: None,
        }
    }

    /// Set the argument list (not including `argv[0]`).
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self
    {
        self.args = args;
        self
    }

    /// Set the working directory of the child.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self
    {
        self.working_dir = Some(dir.into());
        self
    }

    /// Redirect the child's standard streams to the given terminal device.
    #[must_use]
    pub fn with_tty(mut self, tty: impl Into<PathBuf>) -> Self
    {
        self.tty = Some(tty.into());
        self
    }
}
