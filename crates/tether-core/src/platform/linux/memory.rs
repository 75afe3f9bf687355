//! Word-granular tracee memory access and memory-map enumeration.

use std::fs;
use std::io;

use crate::error::{Result, TetherError};
use crate::types::{Address, Permissions, ProcessId, Region, ThreadId};

/// Read one machine word from the tracee.
///
/// `PTRACE_PEEKDATA` reports the word in the syscall return value, so a `-1`
/// word is only an error when errno says so; errno is cleared before the
/// call. A fault (unmapped page, protection) maps to `MemoryFault`.
pub(crate) fn read_word(tid: ThreadId, address: Address) -> Result<u64>
{
    unsafe {
        *libc::__errno_location() = 0;
    }
    let word = unsafe {
        libc::ptrace(
            libc::PTRACE_PEEKDATA,
            tid.raw() as libc::pid_t,
            address.value() as usize as *mut libc::c_void,
            std::ptr::null_mut::<libc::c_void>(),
        )
    };
    let errno = unsafe { *libc::__errno_location() };
    if word == -1 && errno != 0 {
        return Err(access_error(errno, address));
    }
    Ok(word as u64)
}

/// Write one machine word into the tracee.
pub(crate) fn write_word(tid: ThreadId, address: Address, value: u64) -> Result<()>
{
    let rc = unsafe {
        libc::ptrace(
            libc::PTRACE_POKEDATA,
            tid.raw() as libc::pid_t,
            address.value() as usize as *mut libc::c_void,
            value as libc::c_long,
        )
    };
    if rc == -1 {
        let errno = io::Error::last_os_error().raw_os_error().unwrap_or(0);
        return Err(access_error(errno, address));
    }
    Ok(())
}

fn access_error(errno: i32, address: Address) -> TetherError
{
    match errno {
        libc::EIO | libc::EFAULT => TetherError::MemoryFault { address },
        _ => TetherError::Io(io::Error::from_raw_os_error(errno)),
    }
}

/// Enumerate the tracee's mapped regions from `/proc/<pid>/maps`.
pub(crate) fn regions(pid: ProcessId) -> Result<Vec<Region>>
{
    let maps = fs::read_to_string(format!("/proc/{}/maps", pid.raw()))?;
    Ok(maps.lines().filter_map(parse_maps_line).collect())
}

/// Parse one `/proc/<pid>/maps` line into a region.
///
/// Format: `start-end perms offset dev inode [pathname]`. The base address
/// is where byte 0 of the mapped object would land (`start - offset`), which
/// is what downstream consumers use to rebase file offsets.
fn parse_maps_line(line: &str) -> Option<Region>
{
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let perms = fields.next()?;
    let offset = u64::from_str_radix(fields.next()?, 16).ok()?;
    let _dev = fields.next()?;
    let _inode = fields.next()?;
    let name = fields.collect::<Vec<_>>().join(" ");

    let (start, end) = range.split_once('-')?;
    let start = Address::new(u64::from_str_radix(start, 16).ok()?);
    let end = Address::new(u64::from_str_radix(end, 16).ok()?);
    let base = start.saturating_sub(offset);

    Some(Region::new(start, end, base, name, Permissions::parse(perms)))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_maps_line_file_mapping()
    {
        let line = "7f1c00002000-7f1c00024000 r-xp 00002000 103:02 393240 /usr/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2";
        let region = parse_maps_line(line).unwrap();

        assert_eq!(region.start, Address::new(0x7f1c_0000_2000));
        assert_eq!(region.end, Address::new(0x7f1c_0002_4000));
        assert_eq!(region.base, Address::new(0x7f1c_0000_0000));
        assert_eq!(region.name, "/usr/lib/x86_64-linux-gnu/ld-linux-x86-64.so.2");
        assert!(region.is_readable());
        assert!(!region.is_writable());
        assert!(region.is_executable());
    }

    #[test]
    fn test_parse_maps_line_anonymous()
    {
        let line = "7ffd1a2b3000-7ffd1a2d4000 rw-p 00000000 00:00 0 [stack]";
        let region = parse_maps_line(line).unwrap();

        assert_eq!(region.name, "[stack]");
        assert_eq!(region.base, region.start);
        assert!(region.is_writable());
        assert!(!region.is_executable());
    }

    #[test]
    fn test_parse_maps_line_no_name()
    {
        let line = "7ffd1a2f6000-7ffd1a2fa000 r--p 00000000 00:00 0";
        let region = parse_maps_line(line).unwrap();
        assert!(region.name.is_empty());
    }

    #[test]
    fn test_parse_maps_line_garbage()
    {
        assert!(parse_maps_line("not a maps line").is_none());
        assert!(parse_maps_line("").is_none());
    }
}
