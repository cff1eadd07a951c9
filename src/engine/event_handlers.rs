// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.
//!
//! Every terminal path (exit, timeout, launch failure) goes through
//! [`reclaim`], which removes the task from the registry. Removal happens at
//! most once per id, so teardown is exactly-once no matter how many events
//! arrive for a task.

use tracing::{debug, error, info, warn};

use crate::engine::scheduler::{Admission, Scheduler};
use crate::engine::task::{LaunchRequest, Task, TaskOutcome, TaskRegistry, TaskSpec, TaskState};
use crate::engine::RuntimeOptions;
use crate::errors::CmdError;
use crate::protocol::{encode_completion, encode_error};
use crate::types::{OutputStream, TaskId};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Start this process.
    Launch(LaunchRequest),
    /// Send this encoded frame over the transport.
    Send(String),
    /// Drop whatever the executor still holds for this task.
    Release(TaskId),
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
}

impl CoreStep {
    fn new(commands: Vec<CoreCommand>) -> Self {
        Self { commands }
    }
}

/// Handle a validated task: launch now, queue, or reject as overloaded.
pub fn handle_submit(
    scheduler: &mut Scheduler,
    tasks: &mut TaskRegistry,
    options: &RuntimeOptions,
    spec: TaskSpec,
) -> CoreStep {
    let id = tasks.allocate_id();

    match scheduler.admit(id) {
        Admission::Launch => {
            let task = Task::new(id, spec, TaskState::Running);
            let launch = task.launch_request(options.timeout);
            info!(
                task = %id,
                token = %task.token(),
                program = %task.spec.program.display(),
                "launching command"
            );
            tasks.insert(task);
            CoreStep::new(vec![CoreCommand::Launch(launch)])
        }
        Admission::Queued => {
            debug!(task = %id, token = %spec.token, "command queued");
            tasks.insert(Task::new(id, spec, TaskState::Queued));
            CoreStep::default()
        }
        Admission::Rejected => {
            CoreStep::new(vec![CoreCommand::Send(encode_error(
                &spec.token,
                CmdError::Overloaded,
            ))])
        }
    }
}

/// Append captured output to the task's buffer.
pub fn handle_output(tasks: &mut TaskRegistry, id: TaskId, stream: OutputStream, chunk: &[u8]) {
    match tasks.get_mut(id) {
        Some(task) => task.append_output(stream, chunk),
        None => debug!(
            task = %id,
            stream = stream.as_str(),
            bytes = chunk.len(),
            "dropping output for task that is no longer registered"
        ),
    }
}

/// Handle a terminal outcome for a running task.
pub fn handle_termination(
    scheduler: &mut Scheduler,
    tasks: &mut TaskRegistry,
    options: &RuntimeOptions,
    id: TaskId,
    outcome: TaskOutcome,
) -> CoreStep {
    match tasks.get(id).map(|t| t.state) {
        None => {
            debug!(task = %id, ?outcome, "ignoring outcome for task that is no longer registered");
            return CoreStep::default();
        }
        Some(TaskState::Queued) => {
            // A queued task holds no slot and has no process.
            warn!(task = %id, ?outcome, "outcome for task that never launched");
            return CoreStep::default();
        }
        Some(TaskState::Running) => {}
    }

    let Some(task) = reclaim(tasks, id) else {
        return CoreStep::default();
    };

    let mut commands = Vec::new();

    match outcome {
        TaskOutcome::Completed(code) => {
            info!(task = %id, token = %task.token(), code, "command finished");
            commands.push(CoreCommand::Send(completion_reply(&task, code, options)));
        }
        TaskOutcome::TimedOut => {
            error!(
                task = %id,
                token = %task.token(),
                program = %task.spec.program.display(),
                timeout = ?options.timeout,
                "command timed out; process killed"
            );
            if options.reply_on_timeout {
                commands.push(CoreCommand::Send(encode_error(task.token(), CmdError::TimedOut)));
            }
        }
        TaskOutcome::LaunchFailed(err) => {
            error!(task = %id, token = %task.token(), error = %err, "failed to launch command");
            commands.push(CoreCommand::Send(encode_error(task.token(), err)));
        }
    }

    commands.push(CoreCommand::Release(id));
    drop(task);

    commands.extend(release_slot_and_promote(scheduler, tasks, options));
    CoreStep::new(commands)
}

/// Take a task out of the registry. Its buffers and request go with it.
fn reclaim(tasks: &mut TaskRegistry, id: TaskId) -> Option<Task> {
    let task = tasks.remove(id)?;
    debug!(
        task = %id,
        stdout = task.stdout().len(),
        stderr = task.stderr().len(),
        "task reclaimed"
    );
    Some(task)
}

fn completion_reply(task: &Task, code: i32, options: &RuntimeOptions) -> String {
    encode_completion(
        task.token(),
        code,
        task.stdout(),
        task.stderr(),
        options.max_reply_bytes,
    )
    .unwrap_or_else(|err| {
        warn!(
            task = %task.id,
            token = %task.token(),
            stdout = task.stdout().len(),
            stderr = task.stderr().len(),
            error = %err,
            "cannot encode completion reply"
        );
        encode_error(task.token(), err)
    })
}

/// Free one slot and, if anything is waiting, launch the oldest queued task.
fn release_slot_and_promote(
    scheduler: &mut Scheduler,
    tasks: &mut TaskRegistry,
    options: &RuntimeOptions,
) -> Vec<CoreCommand> {
    let mut next = scheduler.release();

    while let Some(id) = next {
        match tasks.get_mut(id) {
            Some(task) => {
                task.state = TaskState::Running;
                info!(
                    task = %id,
                    token = %task.token(),
                    program = %task.spec.program.display(),
                    "launching queued command"
                );
                return vec![CoreCommand::Launch(task.launch_request(options.timeout))];
            }
            None => {
                warn!(task = %id, "queued task vanished; releasing its slot");
                next = scheduler.release();
            }
        }
    }

    Vec::new()
}
