// src/engine/task.rs

//! Task records and the registry that owns them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::CmdError;
use crate::types::{OutputStream, TaskId};

/// A validated, resolved request ready for scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Caller's correlation token, echoed in every reply.
    pub token: String,
    /// Resolved executable.
    pub program: PathBuf,
    /// Arguments after `argv[0]`.
    pub args: Vec<String>,
    /// Variables to set in the child's environment.
    pub env: Vec<(String, String)>,
}

/// Everything the executor needs to start one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub id: TaskId,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in the backlog for a free slot.
    Queued,
    /// Holds a slot; a launch has been issued.
    Running,
}

/// How a running task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(i32),
    TimedOut,
    LaunchFailed(CmdError),
}

#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub spec: TaskSpec,
    pub state: TaskState,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Task {
    pub fn new(id: TaskId, spec: TaskSpec, state: TaskState) -> Self {
        Self {
            id,
            spec,
            state,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    pub fn token(&self) -> &str {
        &self.spec.token
    }

    /// Append captured bytes to the matching buffer.
    pub fn append_output(&mut self, stream: OutputStream, chunk: &[u8]) {
        match stream {
            OutputStream::Stdout => self.stdout.extend_from_slice(chunk),
            OutputStream::Stderr => self.stderr.extend_from_slice(chunk),
        }
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn launch_request(&self, timeout: Duration) -> LaunchRequest {
        LaunchRequest {
            id: self.id,
            program: self.spec.program.clone(),
            args: self.spec.args.clone(),
            env: self.spec.env.clone(),
            timeout,
        }
    }
}

/// Owner of every live task, keyed by [`TaskId`].
///
/// Removing a task from the registry is its teardown: once removed it can
/// never be found again, so a second teardown for the same id is a no-op.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, Task>,
    next_id: u64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id. Ids are never reused.
    pub fn allocate_id(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(&id)
    }

    pub fn remove(&mut self, id: TaskId) -> Option<Task> {
        self.tasks.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
