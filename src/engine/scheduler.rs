// src/engine/scheduler.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::types::TaskId;

/// Admission decision for a newly submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was reserved; launch now.
    Launch,
    /// No slot free; the task joined the back of the backlog.
    Queued,
    /// No slot free and the backlog is at its limit.
    Rejected,
}

/// Concurrency slots plus a FIFO backlog.
///
/// Semantics:
/// - At most `max_concurrent` tasks hold a slot at any time.
/// - Tasks that arrive while every slot is taken wait in arrival order.
/// - Releasing a slot hands it straight to the oldest waiting task, so the
///   slot count never dips while work is queued.
/// - `backlog_limit` bounds the queue; `None` leaves it unbounded.
#[derive(Debug)]
pub struct Scheduler {
    max_concurrent: usize,
    backlog_limit: Option<usize>,
    running: usize,
    backlog: VecDeque<TaskId>,
}

impl Scheduler {
    /// `max_concurrent` is clamped to at least 1; a scheduler that can never
    /// run anything would queue forever.
    pub fn new(max_concurrent: usize, backlog_limit: Option<usize>) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            backlog_limit,
            running: 0,
            backlog: VecDeque::new(),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of tasks currently holding a slot.
    pub fn running(&self) -> usize {
        self.running
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Ids waiting for a slot, oldest first.
    pub fn backlog(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.backlog.iter().copied()
    }

    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.backlog.is_empty()
    }

    /// Decide whether `task` runs now, waits, or is turned away.
    pub fn admit(&mut self, task: TaskId) -> Admission {
        if self.running < self.max_concurrent {
            self.running += 1;
            debug!(%task, running = self.running, "slot reserved");
            return Admission::Launch;
        }

        if let Some(limit) = self.backlog_limit {
            if self.backlog.len() >= limit {
                warn!(
                    %task,
                    backlog = self.backlog.len(),
                    limit,
                    "backlog full; rejecting task"
                );
                return Admission::Rejected;
            }
        }

        self.backlog.push_back(task);
        debug!(%task, backlog = self.backlog.len(), "all slots busy; task queued");
        Admission::Queued
    }

    /// Give back one slot. If anything is waiting, the slot is immediately
    /// re-reserved for the oldest waiting task and its id is returned.
    pub fn release(&mut self) -> Option<TaskId> {
        self.running = self.running.saturating_sub(1);

        let next = self.backlog.pop_front()?;
        self.running += 1;
        debug!(task = %next, running = self.running, "promoted task from backlog");
        Some(next)
    }
}
