//! Tests for debug-event decoding and signal re-delivery
//!
//! Wait statuses are crafted by hand; the decode contract is pure, so none
//! of this needs a live tracee. The encodings are the classic ones shared by
//! Linux and the BSDs: stop = `(sig << 8) | 0x7f`, exit = `code << 8`,
//! signal termination = `sig` in the low seven bits.

use tether_core::event::{resume_signal, DebugEvent, EventCause};
use tether_core::types::{ProcessId, ThreadId};

fn stopped(sig: i32) -> i32
{
    (sig << 8) | 0x7f
}

fn exited(code: i32) -> i32
{
    code << 8
}

fn terminated(sig: i32) -> i32
{
    sig
}

#[test]
fn test_decode_stop_carries_signal()
{
    let event = DebugEvent::new(stopped(libc::SIGTRAP), ProcessId(100), ThreadId(100));
    assert_eq!(event.cause(), EventCause::Stopped(libc::SIGTRAP));
    assert!(!event.is_terminal());
}

#[test]
fn test_decode_stop_other_signals()
{
    for sig in [libc::SIGSTOP, libc::SIGSEGV, libc::SIGINT, libc::SIGUSR1] {
        let event = DebugEvent::new(stopped(sig), ProcessId(1), ThreadId(1));
        assert_eq!(event.cause(), EventCause::Stopped(sig));
    }
}

#[test]
fn test_decode_normal_exit_carries_code()
{
    let event = DebugEvent::new(exited(0), ProcessId(7), ThreadId(7));
    assert_eq!(event.cause(), EventCause::Exited(0));
    assert!(event.is_terminal());

    let event = DebugEvent::new(exited(42), ProcessId(7), ThreadId(7));
    assert_eq!(event.cause(), EventCause::Exited(42));
}

#[test]
fn test_decode_signal_termination()
{
    let event = DebugEvent::new(terminated(libc::SIGKILL), ProcessId(7), ThreadId(7));
    assert_eq!(event.cause(), EventCause::Terminated(libc::SIGKILL));
    assert!(event.is_terminal());

    // The core-dumped bit does not change the terminating signal
    let event = DebugEvent::new(terminated(libc::SIGSEGV) | 0x80, ProcessId(7), ThreadId(7));
    assert_eq!(event.cause(), EventCause::Terminated(libc::SIGSEGV));
}

#[test]
fn test_event_records_origin()
{
    let event = DebugEvent::new(stopped(libc::SIGTRAP), ProcessId(123), ThreadId(456));
    assert_eq!(event.process(), ProcessId(123));
    assert_eq!(event.thread(), ThreadId(456));
    assert_eq!(event.raw_status(), stopped(libc::SIGTRAP));
}

#[test]
fn test_resume_signal_redelivers_stop_signal()
{
    assert_eq!(resume_signal(stopped(libc::SIGSEGV)), libc::SIGSEGV);
    assert_eq!(resume_signal(stopped(libc::SIGTRAP)), libc::SIGTRAP);
}

#[test]
fn test_resume_signal_redelivers_termination_signal()
{
    assert_eq!(resume_signal(terminated(libc::SIGBUS)), libc::SIGBUS);
}

#[test]
fn test_resume_signal_zero_for_exit_and_unobserved()
{
    assert_eq!(resume_signal(exited(0)), 0);
    assert_eq!(resume_signal(exited(3)), 0);
    // A thread that never reported a status has status 0 on record
    assert_eq!(resume_signal(0), 0);
}

#[test]
fn test_display_is_readable()
{
    let event = DebugEvent::new(exited(0), ProcessId(12), ThreadId(12));
    let text = event.to_string();
    assert!(text.contains("12"));
    assert!(text.contains("exited with code 0"));
}
