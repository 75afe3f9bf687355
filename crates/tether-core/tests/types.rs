//! Tests for platform-agnostic types

use tether_core::state::{ClassOutcome, ThreadState, TransferReport, X86_64Gp, X86_64State};
use tether_core::threads::ThreadRegistry;
use tether_core::types::{Address, LaunchParams, Permissions, ProcessId, Region, ThreadId};

#[test]
fn test_address_arithmetic()
{
    let addr = Address::from(0x1000);
    assert_eq!((addr + 0x100).value(), 0x1100);
    assert_eq!((addr - 0x100).value(), 0xf00);
    assert_eq!(addr.checked_add(u64::MAX), None);
    assert_eq!(addr.checked_sub(0x2000), None);
    assert_eq!(addr.saturating_sub(0x2000), Address::ZERO);
    assert_eq!(addr.to_string(), "0x0000000000001000");
}

#[test]
fn test_process_and_thread_id_conversions()
{
    let pid = ProcessId::from(12345);
    assert_eq!(pid.raw(), 12345);
    assert_eq!(u32::from(pid), 12345);

    // The initial thread shares the process id
    let tid = ThreadId::from(pid);
    assert_eq!(tid, ThreadId(12345));
}

#[test]
fn test_permissions_parse_and_display()
{
    let perms = Permissions::parse("r-xp");
    assert!(perms.read);
    assert!(!perms.write);
    assert!(perms.execute);
    assert_eq!(perms.to_string(), "r-x");

    assert_eq!(Permissions::parse("rw-p"), Permissions::READ_WRITE);
    assert_eq!(Permissions::parse("---p"), Permissions::NONE);
    assert_eq!(Permissions::parse(""), Permissions::NONE);
}

#[test]
fn test_region_bounds_end_exclusive()
{
    let region = Region::new(
        Address::from(0x1000),
        Address::from(0x2000),
        Address::from(0x1000),
        "[heap]".to_string(),
        Permissions::READ_WRITE,
    );

    assert_eq!(region.size(), 0x1000);
    assert!(region.contains(Address::from(0x1000)));
    assert!(region.contains(Address::from(0x1fff)));
    assert!(!region.contains(Address::from(0x2000)));
    assert!(!region.contains(Address::from(0x500)));
}

#[test]
fn test_region_degenerate_bounds()
{
    let region = Region::new(
        Address::from(0x2000),
        Address::from(0x1000),
        Address::ZERO,
        String::new(),
        Permissions::NONE,
    );
    assert_eq!(region.size(), 0);
    assert!(!region.contains(Address::from(0x1800)));
}

#[test]
fn test_region_permission_helpers()
{
    let code = Region::new(
        Address::from(0x1000),
        Address::from(0x2000),
        Address::from(0x1000),
        "/usr/bin/example".to_string(),
        Permissions::READ_EXECUTE,
    );
    assert!(code.is_readable());
    assert!(!code.is_writable());
    assert!(code.is_executable());
}

#[test]
fn test_launch_params_builder()
{
    let params = LaunchParams::new("/bin/cat")
        .with_args(vec!["/etc/hostname".to_string()])
        .with_working_dir("/tmp")
        .with_tty("/dev/null");

    assert_eq!(params.path.to_str(), Some("/bin/cat"));
    assert_eq!(params.args, vec!["/etc/hostname".to_string()]);
    assert_eq!(params.working_dir.as_deref(), Some(std::path::Path::new("/tmp")));
    assert_eq!(params.tty.as_deref(), Some(std::path::Path::new("/dev/null")));

    let bare = LaunchParams::new("/bin/true");
    assert!(bare.args.is_empty());
    assert!(bare.working_dir.is_none());
    assert!(bare.tty.is_none());
}

#[test]
fn test_thread_state_empty()
{
    let mut state = ThreadState::default();
    assert!(state.is_empty());
    assert_eq!(state.program_counter(), None);
    assert_eq!(state.stack_pointer(), None);

    state.clear();
    assert!(state.is_empty());
}

#[test]
fn test_thread_state_accessors()
{
    let gp = X86_64Gp {
        rip: 0x401000,
        rsp: 0x7ffd_0000_1000,
        ..X86_64Gp::default()
    };
    let state = ThreadState::X86_64(X86_64State {
        gp: Some(gp),
        fpu: None,
        debug: None,
    });

    assert!(!state.is_empty());
    assert_eq!(state.program_counter(), Some(Address::new(0x401000)));
    assert_eq!(state.stack_pointer(), Some(Address::new(0x7ffd_0000_1000)));
}

#[test]
fn test_transfer_report_defaults()
{
    let report = TransferReport::skipped();
    assert_eq!(report.gp, ClassOutcome::Skipped);
    assert_eq!(report.fpu, ClassOutcome::Skipped);
    assert_eq!(report.debug, ClassOutcome::Skipped);
    assert!(!report.gp_transferred());

    assert_eq!(TransferReport::default(), TransferReport::skipped());

    let report = TransferReport::unsupported();
    assert_eq!(report.gp, ClassOutcome::Unsupported);
}

#[test]
fn test_thread_registry_lifecycle()
{
    let mut registry = ThreadRegistry::new();
    assert!(registry.is_empty());

    let tid = ThreadId(42);
    registry.register(tid);
    assert_eq!(registry.len(), 1);
    assert!(registry.contains(tid));
    assert_eq!(registry.last_status(tid), Some(0));

    registry.record_status(tid, 0x57f);
    assert_eq!(registry.last_status(tid), Some(0x57f));

    // Re-registering must not wipe the recorded status
    registry.register(tid);
    assert_eq!(registry.last_status(tid), Some(0x57f));

    // Unknown threads are registered on their first recorded status
    registry.record_status(ThreadId(43), 0x137f);
    assert_eq!(registry.len(), 2);

    assert!(registry.remove(ThreadId(43)));
    assert!(!registry.remove(ThreadId(43)));

    registry.clear();
    assert!(registry.is_empty());
    assert_eq!(registry.last_status(tid), None);
}

#[test]
fn test_thread_registry_ids_snapshot()
{
    let mut registry = ThreadRegistry::new();
    registry.register(ThreadId(1));
    registry.register(ThreadId(2));

    let mut ids = registry.ids();
    ids.sort();
    assert_eq!(ids, vec![ThreadId(1), ThreadId(2)]);
}
