//! Common module for library exports

pub use crate::breakpoints::{PatchSet, TrapPatch};
pub use crate::debugger::{create_debugger, Debugger};
pub use crate::error::{Result, TetherError};
pub use crate::event::{DebugEvent, EventCause, EventHandler, ResumeDisposition};
pub use crate::state::{ClassOutcome, ThreadState, TransferReport};
pub use crate::types::address::Address;
pub use crate::types::process::{LaunchParams, ProcessId, ProcessRecord, ThreadId};
pub use crate::types::region::{Permissions, Region};
