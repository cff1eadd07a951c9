#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use rcmd::config::ConfigFile;
use rcmd::engine::{CoreRuntime, Intake, Runtime, RuntimeEvent};
use rcmd::errors::Result;
use rcmd::exec::{ExecutorBackend, RealExecutorBackend};
use rcmd::fs::RealFileSystem;
use rcmd::transport::{spawn_line_reader, ChannelTransport};
use serde_json::Value;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const USER: &str = "operator";
pub const PASSWORD: &str = "s3cret";

/// Search path used by tests that resolve real binaries.
pub const TEST_PATH: &str = "/bin:/usr/bin";

/// A running runtime with its event sender and the transport's reply stream.
pub struct Agent {
    pub events: mpsc::Sender<RuntimeEvent>,
    pub replies: mpsc::UnboundedReceiver<String>,
    handle: JoinHandle<Result<CoreRuntime>>,
}

impl Agent {
    /// Start a runtime over `executor`. The executor gets a clone of the event
    /// sender through `make_executor`.
    pub fn start<E, F>(cfg: &ConfigFile, make_executor: F) -> Self
    where
        E: ExecutorBackend + 'static,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
    {
        let (events, rx) = mpsc::channel(256);
        let (transport, replies) = ChannelTransport::pair();

        let core = CoreRuntime::from_config(cfg);
        let intake = Intake::from_config(cfg, Arc::new(RealFileSystem));
        let executor = make_executor(events.clone());

        let runtime = Runtime::new(core, intake, rx, executor, transport);
        let handle = tokio::spawn(runtime.run());

        Self {
            events,
            replies,
            handle,
        }
    }

    /// Start a runtime that spawns real processes.
    pub fn start_real(cfg: &ConfigFile) -> Self {
        Self::start(cfg, RealExecutorBackend::new)
    }

    pub async fn send(&self, message: Value) {
        self.events
            .send(RuntimeEvent::RequestReceived(message))
            .await
            .expect("runtime stopped");
    }

    pub async fn reply(&mut self) -> Value {
        rcmd_test_utils::next_reply(&mut self.replies).await
    }

    /// Request shutdown and return the final core state.
    pub async fn shutdown(self) -> CoreRuntime {
        self.events
            .send(RuntimeEvent::ShutdownRequested)
            .await
            .expect("runtime stopped early");
        self.join().await
    }

    /// Report end of input, as the stdin reader does on EOF.
    pub async fn close_input(&self) {
        self.events
            .send(RuntimeEvent::InputClosed)
            .await
            .expect("runtime stopped early");
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Wait for the runtime to stop on its own.
    pub async fn join(self) -> CoreRuntime {
        rcmd_test_utils::with_timeout(self.handle)
            .await
            .expect("runtime panicked")
            .expect("runtime failed")
    }
}

/// Run a real-process runtime over a line-oriented `input`, the way the binary
/// does over stdin, until it stops by itself. Returns every reply written.
pub async fn run_over_input(cfg: &ConfigFile, input: Vec<u8>) -> (Vec<Value>, CoreRuntime) {
    let (events, rx) = mpsc::channel(256);
    let (transport, mut replies) = ChannelTransport::pair();

    let core = CoreRuntime::from_config(cfg);
    let intake = Intake::from_config(cfg, Arc::new(RealFileSystem));
    let executor = RealExecutorBackend::new(events.clone());

    spawn_line_reader(BufReader::new(Cursor::new(input)), events);
    let runtime = Runtime::new(core, intake, rx, executor, transport);

    let core = rcmd_test_utils::with_timeout(runtime.run())
        .await
        .expect("runtime failed");

    let mut frames = Vec::new();
    while let Ok(frame) = replies.try_recv() {
        frames.push(serde_json::from_str(&frame).expect("reply is not JSON"));
    }
    (frames, core)
}

/// Decode a base64 reply field.
pub fn decode(reply: &Value, field: &str) -> Vec<u8> {
    use base64::Engine;
    let text = reply["attrs"][field]
        .as_str()
        .unwrap_or_else(|| panic!("reply has no {field}: {reply}"));
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .expect("field is not valid base64")
}
