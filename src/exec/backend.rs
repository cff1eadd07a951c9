// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning processes
//! itself. This makes it easy to swap in a fake executor in tests while
//! keeping the production implementation here.
//!
//! - `RealExecutorBackend` is the implementation used by `rcmd`. It spawns
//!   the child, hands it to a supervisor task and remembers the supervisor
//!   under the task's id until the runtime releases it.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were launched and emits `TaskEvent`s directly.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::{LaunchRequest, RuntimeEvent};
use crate::errors::CmdError;
use crate::types::TaskId;

use super::task_runner::{spawn_child, supervise};

/// Trait abstracting how launched tasks are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Start the process described by `request`.
    ///
    /// On success the implementation must eventually deliver exactly one
    /// terminal `TaskEvent` (`Exited` or `TimedOut`) for `request.id`.
    /// On failure nothing was started and no event will follow.
    fn launch(&mut self, request: LaunchRequest) -> Result<(), CmdError>;

    /// Forget everything held for `task`. Called once per launched task,
    /// after its terminal event has been handled.
    fn release(&mut self, task: TaskId);
}

struct ActiveProcess {
    pid: Option<u32>,
    supervisor: JoinHandle<()>,
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    events: mpsc::Sender<RuntimeEvent>,
    active: HashMap<TaskId, ActiveProcess>,
}

impl fmt::Debug for RealExecutorBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealExecutorBackend")
            .field("active", &self.active.len())
            .finish_non_exhaustive()
    }
}

impl RealExecutorBackend {
    /// Create a new real executor backend, wiring it to the given runtime
    /// event sender.
    pub fn new(events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            events,
            active: HashMap::new(),
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn launch(&mut self, request: LaunchRequest) -> Result<(), CmdError> {
        let child = spawn_child(&request)?;
        let pid = child.id();

        info!(
            task = %request.id,
            pid = ?pid,
            program = %request.program.display(),
            "process started"
        );

        let supervisor = tokio::spawn(supervise(
            request.id,
            child,
            request.timeout,
            self.events.clone(),
        ));

        self.active
            .insert(request.id, ActiveProcess { pid, supervisor });
        Ok(())
    }

    fn release(&mut self, task: TaskId) {
        let Some(process) = self.active.remove(&task) else {
            debug!(%task, "release for unknown task");
            return;
        };

        if !process.supervisor.is_finished() {
            // Dropping the child inside the aborted supervisor kills it.
            debug!(%task, pid = ?process.pid, "aborting supervisor on release");
            process.supervisor.abort();
        }
    }
}

impl Drop for RealExecutorBackend {
    fn drop(&mut self) {
        for (task, process) in self.active.drain() {
            debug!(%task, pid = ?process.pid, "stopping live process on shutdown");
            process.supervisor.abort();
        }
    }
}
