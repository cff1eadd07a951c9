// src/engine/mod.rs

//! Command execution engine.
//!
//! This module ties together:
//! - request intake (authentication + executable resolution)
//! - the scheduler (concurrency slots + FIFO backlog)
//! - the per-task state (captured output, lifecycle)
//! - the main runtime event loop that reacts to:
//!   - inbound requests from the transport
//!   - output chunks and exit/timeout outcomes from running processes
//!   - end of input and shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use serde_json::Value;

use crate::errors::CmdError;
use crate::types::{OutputStream, TaskId};

/// Options shared by the core handlers.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Wall-clock budget handed to every launched process.
    pub timeout: Duration,
    /// Ceiling for one encoded completion reply.
    pub max_reply_bytes: usize,
    /// Send an explicit error reply when a task times out.
    pub reply_on_timeout: bool,
}

/// Lifecycle notifications for a launched task, produced by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Bytes read from one of the task's pipes.
    Output {
        task: TaskId,
        stream: OutputStream,
        chunk: Vec<u8>,
    },
    /// The process exited; all of its output has already been delivered.
    Exited { task: TaskId, code: i32 },
    /// The deadline passed; the process has been killed and reaped.
    TimedOut { task: TaskId },
    /// The process could not be started.
    LaunchFailed { task: TaskId, error: CmdError },
}

/// Events flowing into the runtime from the transport, executor, etc.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A decoded inbound message from the transport.
    RequestReceived(Value),
    /// Something happened to a launched task.
    Task(TaskEvent),
    /// The inbound side of the transport is gone. No more requests will
    /// arrive; the runtime stops once every admitted task has replied.
    InputClosed,
    /// Immediate shutdown requested (Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod intake;
pub mod runtime;
pub mod scheduler;
pub mod task;

pub use self::core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use intake::{Intake, Rejection};
pub use runtime::Runtime;
pub use scheduler::{Admission, Scheduler};
pub use task::{LaunchRequest, Task, TaskOutcome, TaskRegistry, TaskSpec, TaskState};
