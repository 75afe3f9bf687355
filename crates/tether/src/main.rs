use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tether_core::debugger::create_debugger;
use tether_core::event::{DebugEvent, EventCause, EventHandler, ResumeDisposition};
use tether_core::state::ThreadState;
use tether_core::types::{LaunchParams, ProcessId};
use tether_core::{Debugger, Result as TetherResult};
use tether_utils::{info, init_logging};

/// Headless driver for the Tether process-control engine.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version)]
#[command(about = "Drive a traced process: launch, attach, observe debug events", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Launch a program under trace control and run it to completion
    Run
    {
        /// Path to the executable to launch
        program: String,
        /// Arguments to pass to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Working directory for the tracee
        #[arg(long)]
        cwd: Option<String>,
        /// Terminal device to redirect the tracee's standard streams to
        #[arg(long)]
        tty: Option<String>,
        /// Forward stop signals back to the tracee instead of swallowing them
        #[arg(long, default_value_t = false)]
        forward_signals: bool,
    },
    /// Attach to a running process, print its state, and detach
    Attach
    {
        /// Process ID (PID) to attach to
        pid: u32,
    },
    /// List running processes from the OS process table
    Ps,
}

/// Event consumer for `run`: prints every event, decides how to resume.
struct RunHandler
{
    forward_signals: bool,
}

impl EventHandler for RunHandler
{
    fn handle_event(&mut self, event: &DebugEvent) -> ResumeDisposition
    {
        println!("[event] {event}");
        match event.cause() {
            // Entry and step traps are the engine's own doing; forwarding
            // SIGTRAP would kill the tracee
            EventCause::Stopped(libc::SIGTRAP) => ResumeDisposition::Continue,
            EventCause::Stopped(_) if self.forward_signals => ResumeDisposition::ExceptionNotHandled,
            EventCause::Stopped(_) => ResumeDisposition::Continue,
            // Terminal events carry no resume decision
            _ => ResumeDisposition::Stop,
        }
    }
}

fn main()
{
    // Initialize logging (reads from RUST_LOG env var)
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    let cli = Cli::parse();
    if let Err(e) = run_command(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> TetherResult<()>
{
    match cli.command {
        Commands::Run {
            program,
            args,
            cwd,
            tty,
            forward_signals,
        } => {
            let mut params = LaunchParams::new(&program).with_args(args);
            if let Some(cwd) = cwd {
                params = params.with_working_dir(cwd);
            }
            if let Some(tty) = tty {
                params = params.with_tty(tty);
            }
            run_to_completion(&params, forward_signals)
        }
        Commands::Attach { pid } => inspect_process(ProcessId::from(pid)),
        Commands::Ps => list_processes(),
    }
}

/// Launch the tracee and pump debug events until it goes away.
fn run_to_completion(params: &LaunchParams, forward_signals: bool) -> TetherResult<()>
{
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        let _ = ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst));
    }

    let mut debugger = create_debugger()?;
    let mut handler = RunHandler { forward_signals };

    info!("Launching {}", params.path.display());
    debugger.launch(params)?;
    println!("Launched {} (PID {})", params.path.display(), debugger.pid().expect("attached").raw());

    while debugger.attached() {
        if interrupted.swap(false, Ordering::SeqCst) {
            println!("Interrupted; killing tracee");
            debugger.kill();
            break;
        }

        let Some(event) = debugger.wait_debug_event(Some(Duration::from_millis(200)))? else {
            continue;
        };

        match event.cause() {
            EventCause::Exited(code) => {
                println!("Tracee exited with code {code}");
                break;
            }
            EventCause::Terminated(sig) => {
                println!("Tracee terminated by signal {sig}");
                break;
            }
            EventCause::Stopped(_) => {
                let disposition = handler.handle_event(&event);
                debugger.resume(disposition)?;
            }
        }
    }

    Ok(())
}

/// Attach, report what the session sees, detach again.
fn inspect_process(pid: ProcessId) -> TetherResult<()>
{
    let mut debugger = create_debugger()?;

    info!("Attaching to process {}", pid);
    debugger.attach(pid)?;
    println!("Attached to process {pid}");

    // The attach stop must be observed before registers are readable
    match debugger.wait_debug_event(Some(Duration::from_secs(3)))? {
        Some(event) => println!("First event: {event}"),
        None => println!("No stop observed within 3s"),
    }

    let mut state = ThreadState::default();
    let report = debugger.get_state(&mut state);
    println!("Register transfer: {report:?}");
    if let Some(pc) = state.program_counter() {
        println!("  pc = {pc}");
    }
    if let Some(sp) = state.stack_pointer() {
        println!("  sp = {sp}");
    }

    let regions = debugger.memory_regions()?;
    println!("Mapped regions: {}", regions.len());
    println!("Page size: {}", debugger.page_size());

    debugger.detach();
    println!("Detached");
    Ok(())
}

/// Print the process table snapshot.
fn list_processes() -> TetherResult<()>
{
    let debugger = create_debugger()?;
    let table = debugger.enumerate_processes()?;

    println!("{:>8} {:>8} {:>8}  {}", "PID", "PPID", "UID", "NAME");
    for record in table.values() {
        println!(
            "{:>8} {:>8} {:>8}  {}",
            record.pid, record.parent_pid, record.uid, record.name
        );
    }
    println!("{} processes", table.len());
    Ok(())
}
