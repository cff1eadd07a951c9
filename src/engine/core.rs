// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes validated tasks and [`TaskEvent`]s and produces:
//! - an updated core state
//! - a list of commands describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - authenticating and resolving inbound requests
//! - launching processes and sending replies
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use crate::config::ConfigFile;
use crate::engine::event_handlers::{handle_output, handle_submit, handle_termination, CoreStep};
use crate::engine::scheduler::Scheduler;
use crate::engine::task::{TaskOutcome, TaskRegistry, TaskSpec, TaskState};
use crate::engine::{RuntimeOptions, TaskEvent};
use crate::types::TaskId;

/// Pure core runtime state.
///
/// This owns:
/// - the scheduler (slots + backlog)
/// - the registry of live tasks
/// - runtime options
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    tasks: TaskRegistry,
    options: RuntimeOptions,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler, options: RuntimeOptions) -> Self {
        Self {
            scheduler,
            tasks: TaskRegistry::new(),
            options,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        let scheduler = Scheduler::new(cfg.exec.max_concurrent, cfg.exec.backlog_limit);
        let options = RuntimeOptions {
            timeout: cfg.exec.timeout,
            max_reply_bytes: cfg.exec.max_reply_bytes,
            reply_on_timeout: cfg.exec.reply_on_timeout,
        };
        Self::new(scheduler, options)
    }

    /// Tasks currently holding a concurrency slot.
    pub fn running_count(&self) -> usize {
        self.scheduler.running()
    }

    pub fn backlog_len(&self) -> usize {
        self.scheduler.backlog_len()
    }

    /// Live tasks (running or queued).
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(id).map(|t| t.state)
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle() && self.tasks.is_empty()
    }

    /// Admit a validated task.
    pub fn submit(&mut self, spec: TaskSpec) -> CoreStep {
        handle_submit(&mut self.scheduler, &mut self.tasks, &self.options, spec)
    }

    /// Handle a single task event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: TaskEvent) -> CoreStep {
        match event {
            TaskEvent::Output {
                task,
                stream,
                chunk,
            } => {
                handle_output(&mut self.tasks, task, stream, &chunk);
                CoreStep::default()
            }
            TaskEvent::Exited { task, code } => self.terminate(task, TaskOutcome::Completed(code)),
            TaskEvent::TimedOut { task } => self.terminate(task, TaskOutcome::TimedOut),
            TaskEvent::LaunchFailed { task, error } => {
                self.terminate(task, TaskOutcome::LaunchFailed(error))
            }
        }
    }

    fn terminate(&mut self, task: TaskId, outcome: TaskOutcome) -> CoreStep {
        handle_termination(
            &mut self.scheduler,
            &mut self.tasks,
            &self.options,
            task,
            outcome,
        )
    }
}
