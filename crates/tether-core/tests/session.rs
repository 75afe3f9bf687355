//! Live-tracee session tests for the Linux backend
//!
//! Each test owns its own engine instance and its own tracee. The event
//! waits poll per-registered-thread, so parallel tests never steal each
//! other's wait statuses.

#![cfg(target_os = "linux")]

use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use tether_core::debugger::create_debugger;
use tether_core::event::{DebugEvent, EventCause, ResumeDisposition};
use tether_core::platform::linux::LinuxDebugger;
use tether_core::state::ThreadState;
use tether_core::types::{Address, LaunchParams, ProcessId, ThreadId};
use tether_core::{Debugger, TetherError};

const WAIT: Option<Duration> = Some(Duration::from_secs(5));

fn bin(name: &str) -> PathBuf
{
    for dir in ["/usr/bin", "/bin"] {
        let path = PathBuf::from(dir).join(name);
        if path.exists() {
            return path;
        }
    }
    panic!("{name} not found in /usr/bin or /bin");
}

/// Launch a long-running tracee and consume its entry trap event.
fn launch_stopped(debugger: &mut LinuxDebugger) -> DebugEvent
{
    let params = LaunchParams::new(bin("sleep")).with_args(vec!["30".to_string()]);
    debugger.launch(&params).expect("launch failed");
    let event = debugger
        .wait_debug_event(WAIT)
        .expect("wait failed")
        .expect("no entry stop");
    assert_eq!(event.cause(), EventCause::Stopped(libc::SIGTRAP));
    event
}

/// Capture the active thread's state, asserting the GP class transferred.
fn capture(debugger: &mut LinuxDebugger) -> ThreadState
{
    let mut state = ThreadState::default();
    let report = debugger.get_state(&mut state);
    assert!(report.gp_transferred(), "GP capture failed: {report:?}");
    state
}

#[test]
fn test_launch_reports_entry_trap_then_exit()
{
    let mut debugger = LinuxDebugger::new();
    debugger.launch(&LaunchParams::new(bin("true"))).expect("launch failed");
    assert!(debugger.attached());
    assert!(debugger.pid().is_some());

    let event = debugger
        .wait_debug_event(WAIT)
        .expect("wait failed")
        .expect("no entry stop");
    assert_eq!(event.cause(), EventCause::Stopped(libc::SIGTRAP));
    assert_eq!(Some(event.thread()), debugger.active_thread());

    debugger.resume(ResumeDisposition::Continue).expect("resume failed");

    let mut exited = false;
    for _ in 0..50 {
        let Some(event) = debugger.wait_debug_event(WAIT).expect("wait failed") else {
            continue;
        };
        match event.cause() {
            EventCause::Exited(code) => {
                assert_eq!(code, 0);
                exited = true;
                break;
            }
            EventCause::Stopped(_) => debugger.resume(ResumeDisposition::Continue).expect("resume failed"),
            other => panic!("unexpected event: {other}"),
        }
    }
    assert!(exited, "tracee never reported its exit");

    // Leader exit ends the session
    assert!(!debugger.attached());
    assert_eq!(debugger.wait_debug_event(Some(Duration::ZERO)).unwrap(), None);
}

#[test]
fn test_launch_nonexistent_path_fails_detached()
{
    let mut debugger = LinuxDebugger::new();
    let result = debugger.launch(&LaunchParams::new("/definitely/not/a/real/binary"));

    assert!(matches!(result, Err(TetherError::LaunchFailed(_))), "got {result:?}");
    assert!(!debugger.attached());
    assert_eq!(debugger.active_thread(), None);
    assert_eq!(debugger.wait_debug_event(WAIT).unwrap(), None);
}

#[test]
fn test_wait_on_detached_session_returns_no_event()
{
    let mut debugger = LinuxDebugger::new();

    let start = Instant::now();
    assert_eq!(debugger.wait_debug_event(Some(Duration::from_secs(10))).unwrap(), None);
    assert_eq!(debugger.wait_debug_event(None).unwrap(), None);
    assert_eq!(debugger.wait_debug_event(Some(Duration::ZERO)).unwrap(), None);
    assert!(start.elapsed() < Duration::from_secs(1), "detached wait must not block");
}

#[test]
fn test_attach_detach_idempotent()
{
    let mut child = Command::new(bin("sleep")).arg("30").spawn().expect("spawn failed");
    let pid = ProcessId(child.id());

    let mut debugger = LinuxDebugger::new();
    debugger.attach(pid).expect("attach failed");
    assert!(debugger.attached());
    assert_eq!(debugger.pid(), Some(pid));
    assert_eq!(debugger.active_thread(), Some(ThreadId::from(pid)));

    // The attach stop arrives through the ordinary wait loop
    let event = debugger
        .wait_debug_event(WAIT)
        .expect("wait failed")
        .expect("no attach stop");
    assert!(matches!(event.cause(), EventCause::Stopped(_)));
    assert_eq!(event.thread(), ThreadId::from(pid));

    debugger.detach();
    assert!(!debugger.attached());
    assert_eq!(debugger.active_thread(), None);

    // Second detach is a no-op
    debugger.detach();
    assert!(!debugger.attached());
    assert_eq!(debugger.wait_debug_event(Some(Duration::ZERO)).unwrap(), None);

    child.kill().ok();
    child.wait().ok();
}

#[test]
fn test_attach_nonexistent_pid_fails()
{
    let mut debugger = LinuxDebugger::new();
    let result = debugger.attach(ProcessId(0x7fff_fffe));

    assert!(matches!(result, Err(TetherError::ProcessNotFound(_))), "got {result:?}");
    assert!(!debugger.attached());
    assert_eq!(debugger.active_thread(), None);
}

#[test]
fn test_state_capture_apply_round_trip()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    let original = capture(&mut debugger);

    let report = debugger.set_state(&original);
    assert!(report.gp_transferred(), "GP apply failed: {report:?}");

    // Applying an untouched capture must change nothing
    let roundtripped = capture(&mut debugger);
    assert_eq!(original, roundtripped);

    debugger.kill();
}

#[test]
fn test_get_state_on_detached_clears_destination()
{
    let mut debugger = LinuxDebugger::new();
    let stale_gp = tether_core::state::X86_64Gp::default();
    let mut state = ThreadState::X86_64(tether_core::state::X86_64State {
        gp: Some(stale_gp),
        fpu: None,
        debug: None,
    });

    let report = debugger.get_state(&mut state);
    assert!(state.is_empty());
    assert!(!report.gp_transferred());
}

#[test]
fn test_word_read_write_round_trip()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    let state = capture(&mut debugger);
    let sp = state.stack_pointer().expect("no stack pointer in capture");

    let original = debugger.read_word(sp).expect("read failed");
    debugger.write_word(sp, 0x1122_3344_5566_7788).expect("write failed");
    assert_eq!(debugger.read_word(sp).unwrap(), 0x1122_3344_5566_7788);
    debugger.write_word(sp, original).expect("restore failed");
    assert_eq!(debugger.read_word(sp).unwrap(), original);

    debugger.kill();
}

#[test]
fn test_read_word_unmapped_faults()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    // Page zero is never mapped
    let result = debugger.read_word(Address::new(0x10));
    assert!(
        matches!(result, Err(TetherError::MemoryFault { .. })),
        "got {result:?}"
    );

    debugger.kill();
}

#[test]
fn test_read_word_detached_is_rejected()
{
    let mut debugger = LinuxDebugger::new();
    let result = debugger.read_word(Address::new(0x1000));
    assert!(matches!(result, Err(TetherError::NotAttached)), "got {result:?}");
}

#[test]
fn test_breakpoint_install_and_restore()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    let state = capture(&mut debugger);
    let pc = state.program_counter().expect("no program counter in capture");

    let original = debugger.read_word(pc).expect("read failed");
    debugger.set_breakpoint(pc).expect("set_breakpoint failed");
    let patched = debugger.read_word(pc).unwrap();
    assert_ne!(patched, original, "trap byte not installed");

    // Double-install is a no-op, not a corruption of the saved word
    debugger.set_breakpoint(pc).expect("re-set_breakpoint failed");

    debugger.remove_breakpoint(pc).expect("remove_breakpoint failed");
    assert_eq!(debugger.read_word(pc).unwrap(), original);

    // Removing twice is a caller error
    assert!(debugger.remove_breakpoint(pc).is_err());

    debugger.kill();
}

#[test]
fn test_pause_stops_running_tracee()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    debugger.resume(ResumeDisposition::Continue).expect("resume failed");
    debugger.pause();

    let event = debugger
        .wait_debug_event(WAIT)
        .expect("wait failed")
        .expect("no stop after pause");
    assert_eq!(event.cause(), EventCause::Stopped(libc::SIGSTOP));

    debugger.kill();
}

#[test]
fn test_exception_forwarding_preserves_default_disposition()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    // Re-delivering the recorded SIGTRAP lets the default disposition run,
    // which kills the tracee
    debugger
        .resume(ResumeDisposition::ExceptionNotHandled)
        .expect("resume failed");

    let event = debugger
        .wait_debug_event(WAIT)
        .expect("wait failed")
        .expect("no termination event");
    assert_eq!(event.cause(), EventCause::Terminated(libc::SIGTRAP));
    assert!(!debugger.attached());
}

#[test]
fn test_resume_stop_disposition_is_a_no_op()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    debugger.resume(ResumeDisposition::Stop).expect("resume failed");

    // The tracee stayed stopped: no event is pending
    assert_eq!(debugger.wait_debug_event(Some(Duration::ZERO)).unwrap(), None);
    assert!(debugger.attached());

    debugger.kill();
}

#[test]
fn test_single_step_reports_trap()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    debugger.step(ResumeDisposition::Continue).expect("step failed");

    let event = debugger
        .wait_debug_event(WAIT)
        .expect("wait failed")
        .expect("no step stop");
    assert_eq!(event.cause(), EventCause::Stopped(libc::SIGTRAP));

    debugger.kill();
}

#[test]
fn test_kill_renders_tracee_nonexistent()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);
    let pid = debugger.pid().unwrap();

    debugger.kill();
    assert!(!debugger.attached());
    assert_eq!(debugger.pid(), None);

    // The pid is reaped and gone, not a zombie
    let rc = unsafe { libc::kill(pid.raw() as libc::pid_t, 0) };
    assert_eq!(rc, -1);
    assert_eq!(std::io::Error::last_os_error().raw_os_error(), Some(libc::ESRCH));

    // kill on a dead session is a no-op
    debugger.kill();
}

#[test]
fn test_bounded_wait_times_out_on_running_tracee()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);
    debugger.resume(ResumeDisposition::Continue).expect("resume failed");

    let start = Instant::now();
    let event = debugger.wait_debug_event(Some(Duration::from_millis(200))).unwrap();
    let elapsed = start.elapsed();

    assert_eq!(event, None);
    assert!(elapsed >= Duration::from_millis(150), "returned too early: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "timeout not honored: {elapsed:?}");

    debugger.kill();
}

#[test]
fn test_memory_regions_cover_entry_point()
{
    let mut debugger = LinuxDebugger::new();
    launch_stopped(&mut debugger);

    let state = capture(&mut debugger);
    let pc = state.program_counter().unwrap();

    let regions = debugger.memory_regions().expect("memory_regions failed");
    assert!(!regions.is_empty());
    let covering = regions.iter().find(|region| region.contains(pc));
    assert!(covering.is_some(), "no region covers the entry point {pc}");
    assert!(covering.unwrap().is_executable());

    debugger.kill();
}

#[test]
fn test_page_size_is_sane()
{
    let debugger = LinuxDebugger::new();
    let page_size = debugger.page_size();
    assert!(page_size >= 4096);
    assert!(page_size.is_power_of_two());
}

#[test]
fn test_factory_backend_enumerates_processes()
{
    let debugger = create_debugger().expect("no backend for this platform");
    let table = debugger.enumerate_processes().expect("enumeration failed");

    let own_pid = std::process::id();
    let record = table.get(&ProcessId(own_pid)).expect("own process missing from table");
    assert_eq!(record.pid, own_pid);
    assert!(!record.name.is_empty());

    let own_ppid = unsafe { libc::getppid() } as u32;
    assert_eq!(record.parent_pid, own_ppid);
}
