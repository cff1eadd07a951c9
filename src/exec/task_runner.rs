// src/exec/task_runner.rs

//! Individual task process runner.

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use crate::engine::{LaunchRequest, RuntimeEvent, TaskEvent};
use crate::errors::CmdError;
use crate::types::{OutputStream, TaskId};

const READ_CHUNK: usize = 8 * 1024;

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Spawn the child for `request`.
///
/// `argv[0]` is the resolved path, stdin is `/dev/null`, stdout and stderr are
/// piped, and the child leads its own process group so a timeout can take
/// down everything it forked.
pub fn spawn_child(request: &LaunchRequest) -> Result<Child, CmdError> {
    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args)
        .envs(request.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);

    cmd.spawn().map_err(|err| {
        error!(
            task = %request.id,
            program = %request.program.display(),
            error = %err,
            "spawning process failed"
        );
        CmdError::SystemError
    })
}

/// Drive a spawned child to completion and report the terminal event.
///
/// - Normal exit: wait (bounded by the same deadline) for both pumps to hit
///   EOF, then send `Exited`. All `Output` events are therefore queued ahead
///   of the exit.
/// - Deadline: kill the process group, reap the child, abort the pumps, then
///   send `TimedOut`.
pub async fn supervise(
    task: TaskId,
    mut child: Child,
    timeout: Duration,
    events: mpsc::Sender<RuntimeEvent>,
) {
    let deadline = deadline_after(timeout);
    let pid = child.id();

    let mut pumps = JoinSet::new();
    if let Some(stdout) = child.stdout.take() {
        pumps.spawn(pump(task, OutputStream::Stdout, stdout, events.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        pumps.spawn(pump(task, OutputStream::Stderr, stderr, events.clone()));
    }

    let event = tokio::select! {
        status = child.wait() => {
            let code = match status {
                Ok(status) => exit_code(status),
                Err(err) => {
                    warn!(%task, pid = ?pid, error = %err, "waiting for process failed");
                    -1
                }
            };
            drain_pumps(task, &mut pumps, deadline).await;
            info!(%task, pid = ?pid, exit_code = code, "process exited");
            TaskEvent::Exited { task, code }
        }

        _ = time::sleep_until(deadline) => {
            warn!(%task, pid = ?pid, ?timeout, "deadline reached; killing process group");
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            if let Err(err) = child.kill().await {
                warn!(%task, pid = ?pid, error = %err, "failed to reap killed process");
            }
            pumps.abort_all();
            TaskEvent::TimedOut { task }
        }
    };

    if events.send(RuntimeEvent::Task(event)).await.is_err() {
        debug!(%task, "runtime gone; dropping terminal event");
    }
}

/// Forward everything read from `reader` to the runtime, chunk by chunk.
async fn pump<R>(task: TaskId, stream: OutputStream, mut reader: R, events: mpsc::Sender<RuntimeEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let event = RuntimeEvent::Task(TaskEvent::Output {
                    task,
                    stream,
                    chunk: buf[..n].to_vec(),
                });
                if events.send(event).await.is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(%task, stream = stream.as_str(), error = %err, "reading process output failed");
                break;
            }
        }
    }

    debug!(%task, stream = stream.as_str(), "output stream closed");
}

async fn drain_pumps(task: TaskId, pumps: &mut JoinSet<()>, deadline: Instant) {
    let drained = time::timeout_at(deadline, async {
        while pumps.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        // A forked grandchild can hold the pipes open after the child exits.
        warn!(%task, "output still open at deadline; abandoning remaining output");
        pumps.abort_all();
    }
}

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };

    // SAFETY: kill(2) with a negative pid and a valid signal has no memory
    // safety requirements.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pid, error = %err, "SIGKILL to process group failed");
        }
    }
}

/// Exit status as a shell would report it: the code, or `128 + N` for a
/// process killed by signal N.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}
