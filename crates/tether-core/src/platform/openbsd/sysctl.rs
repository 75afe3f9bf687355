//! Process-table snapshot via `sysctl(KERN_PROC)`.
//!
//! The same kernel table kvm(3) reads, fetched with the standard two-call
//! dance: size the buffer, fetch with slack, retry on `ENOMEM` if the table
//! grew in between. The parent pid is queried per-pid in its own call, so a
//! process exiting mid-snapshot degrades that one field to `0` instead of
//! failing the whole enumeration.

use std::collections::BTreeMap;
use std::ffi::CStr;
use std::io;
use std::mem;
use std::ptr;

use libc::{c_int, c_void, kinfo_proc};

use crate::error::{Result, TetherError};
use crate::types::{ProcessId, ProcessRecord};

/// Snapshot the process table.
pub(crate) fn enumerate() -> Result<BTreeMap<ProcessId, ProcessRecord>>
{
    let procs = fetch_procs(libc::KERN_PROC_ALL, 0).map_err(TetherError::Io)?;

    let mut table = BTreeMap::new();
    for kp in &procs {
        let record = ProcessRecord {
            pid: kp.p_pid as u32,
            uid: kp.p_uid,
            name: comm_to_string(&kp.p_comm),
            parent_pid: parent_pid(kp.p_pid as u32),
        };
        table.insert(ProcessId(record.pid), record);
    }
    Ok(table)
}

/// Parent pid of one process through its own `KERN_PROC_PID` query; `0` when
/// the process is already gone.
pub(crate) fn parent_pid(pid: u32) -> u32
{
    match fetch_procs(libc::KERN_PROC_PID, pid as c_int) {
        Ok(procs) => procs.first().map(|kp| kp.p_ppid as u32).unwrap_or(0),
        Err(_) => 0,
    }
}

fn fetch_procs(op: c_int, arg: c_int) -> io::Result<Vec<kinfo_proc>>
{
    let elem_size = mem::size_of::<kinfo_proc>();

    loop {
        let mut mib = [libc::CTL_KERN, libc::KERN_PROC, op, arg, elem_size as c_int, 0];

        // First call sizes the table
        let mut needed: libc::size_t = 0;
        let rc = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                mib.len() as u32,
                ptr::null_mut(),
                &mut needed,
                ptr::null_mut(),
                0,
            )
        };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }

        // Slack for processes spawned between the two calls
        let capacity = needed as usize / elem_size + 8;
        let mut procs: Vec<kinfo_proc> = Vec::with_capacity(capacity);
        mib[5] = capacity as c_int;
        let mut size = capacity * elem_size;

        let rc = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                mib.len() as u32,
                procs.as_mut_ptr() as *mut c_void,
                &mut size,
                ptr::null_mut(),
                0,
            )
        };
        if rc == -1 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOMEM) {
                continue;
            }
            return Err(err);
        }

        unsafe {
            procs.set_len(size / elem_size);
        }
        return Ok(procs);
    }
}

fn comm_to_string(comm: &[libc::c_char]) -> String
{
    let bytes: Vec<u8> = comm.iter().map(|&c| c as u8).collect();
    CStr::from_bytes_until_nul(&bytes)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
