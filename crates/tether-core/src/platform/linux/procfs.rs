//! Process-table snapshot from `/proc`.
//!
//! One-shot scan, no caching: every numeric directory under `/proc` becomes
//! a record. Processes exit while the scan runs, so every per-pid read is
//! allowed to fail quietly: a vanished process drops its row, and a row whose
//! parent query lost the race reports `parent_pid == 0`. Only the inability
//! to read `/proc` itself fails the whole snapshot.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use crate::error::Result;
use crate::types::{ProcessId, ProcessRecord};

/// Snapshot the process table.
pub(crate) fn enumerate() -> Result<BTreeMap<ProcessId, ProcessRecord>>
{
    let mut table = BTreeMap::new();

    for entry in fs::read_dir("/proc")?.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|name| name.parse::<u32>().ok()) else {
            continue;
        };
        let Some(record) = read_record(pid) else {
            continue;
        };
        table.insert(ProcessId(pid), record);
    }

    Ok(table)
}

/// Best-effort read of one process row; `None` when the process vanished.
fn read_record(pid: u32) -> Option<ProcessRecord>
{
    let proc_dir = PathBuf::from("/proc").join(pid.to_string());

    // The kernel truncates comm to its own limit; nothing to do here
    let name = fs::read_to_string(proc_dir.join("comm")).ok()?.trim_end().to_string();
    let uid = fs::metadata(&proc_dir).ok()?.uid();

    Some(ProcessRecord {
        pid,
        uid,
        name,
        parent_pid: parent_pid(pid),
    })
}

/// Parent pid of a process, queried independently of the main row.
///
/// Returns `0` when the process is gone or its stat line is unreadable; the
/// caller treats that as a stale-but-tolerable value, not an error.
pub(crate) fn parent_pid(pid: u32) -> u32
{
    fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| parse_stat_ppid(&stat))
        .unwrap_or(0)
}

/// Extract the ppid field from a `/proc/<pid>/stat` line.
///
/// The comm field is parenthesized and may itself contain spaces and
/// parentheses, so fields are counted from the *last* `)` in the line:
/// state, then ppid.
fn parse_stat_ppid(stat: &str) -> Option<u32>
{
    let (_, rest) = stat.rsplit_once(')')?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_stat_ppid_plain()
    {
        let stat = "1234 (cat) R 77 1234 1234 0 -1 4194304 96 0 0 0";
        assert_eq!(parse_stat_ppid(stat), Some(77));
    }

    #[test]
    fn test_parse_stat_ppid_comm_with_spaces_and_parens()
    {
        // comm is attacker-controlled via prctl and can contain ") R 1"
        let stat = "1234 (ev) R 1(l kworker) S 4321 1 1 0 -1";
        assert_eq!(parse_stat_ppid(stat), Some(4321));
    }

    #[test]
    fn test_parse_stat_ppid_garbage()
    {
        assert_eq!(parse_stat_ppid("no parens here"), None);
        assert_eq!(parse_stat_ppid(""), None);
    }
}
