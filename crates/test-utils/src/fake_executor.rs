use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rcmd::engine::LaunchRequest;
use rcmd::errors::CmdError;
use rcmd::exec::ExecutorBackend;
use rcmd::types::TaskId;
use tokio::sync::mpsc;

/// A fake executor that never spawns processes.
///
/// - every successful launch is forwarded to the [`FakeExecutorHandle`], so a
///   test can wait for it and then drive the task with `TaskEvent`s
/// - launches of a configured program fail with a configured error
/// - releases are recorded
pub struct FakeExecutor {
    launches: mpsc::UnboundedSender<LaunchRequest>,
    released: Arc<Mutex<Vec<TaskId>>>,
    fail: Option<(PathBuf, CmdError)>,
}

/// Test-side view of a [`FakeExecutor`].
pub struct FakeExecutorHandle {
    launches: mpsc::UnboundedReceiver<LaunchRequest>,
    released: Arc<Mutex<Vec<TaskId>>>,
}

impl FakeExecutor {
    pub fn new() -> (Self, FakeExecutorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let released = Arc::new(Mutex::new(Vec::new()));
        let executor = Self {
            launches: tx,
            released: Arc::clone(&released),
            fail: None,
        };
        let handle = FakeExecutorHandle {
            launches: rx,
            released,
        };
        (executor, handle)
    }

    /// Make every launch of `program` fail with `error`.
    pub fn failing(mut self, program: impl Into<PathBuf>, error: CmdError) -> Self {
        self.fail = Some((program.into(), error));
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn launch(&mut self, request: LaunchRequest) -> Result<(), CmdError> {
        if let Some((program, error)) = &self.fail {
            if *program == request.program {
                return Err(*error);
            }
        }
        let _ = self.launches.send(request);
        Ok(())
    }

    fn release(&mut self, task: TaskId) {
        self.released.lock().unwrap().push(task);
    }
}

impl FakeExecutorHandle {
    /// Wait for the next successful launch.
    pub async fn next_launch(&mut self) -> LaunchRequest {
        crate::with_timeout(self.launches.recv())
            .await
            .expect("executor dropped before launching")
    }

    /// Assert that no launch happens within `ms` milliseconds.
    pub async fn assert_no_launch(&mut self, ms: u64) {
        let got = tokio::time::timeout(Duration::from_millis(ms), self.launches.recv()).await;
        if let Ok(Some(req)) = got {
            panic!("unexpected launch of {}", req.id);
        }
    }

    pub fn released(&self) -> Vec<TaskId> {
        self.released.lock().unwrap().clone()
    }
}
