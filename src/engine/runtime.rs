// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::protocol::{self, CommandRequest, encode_error};
use crate::transport::TransportSender;

use super::core::CoreRuntime;
use super::intake::{Intake, Rejection};
use super::{CoreCommand, CoreStep, RuntimeEvent, TaskEvent};

/// Drives the command engine in response to `RuntimeEvent`s, delegating
/// process work to an `ExecutorBackend` and replies to a `TransportSender`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, launching processes and writing replies.
pub struct Runtime<E: ExecutorBackend, T: TransportSender> {
    core: CoreRuntime,
    intake: Intake,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    transport: T,
}

impl<E: ExecutorBackend, T: TransportSender> fmt::Debug for Runtime<E, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("intake", &self.intake)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend, T: TransportSender> Runtime<E, T> {
    pub fn new(
        core: CoreRuntime,
        intake: Intake,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        transport: T,
    ) -> Self {
        Self {
            core,
            intake,
            event_rx,
            executor,
            transport,
        }
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Validates inbound requests and submits them to the core.
    /// - Feeds task events into the core.
    /// - Executes commands returned by the core (launch, send, release).
    /// - After `InputClosed`, keeps running until the core is idle so every
    ///   admitted request still gets its reply.
    ///
    /// Returns the core so callers can inspect the final state.
    pub async fn run(mut self) -> Result<CoreRuntime> {
        info!("rcmd runtime started");

        let mut input_closed = false;

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            match event {
                RuntimeEvent::RequestReceived(message) => {
                    if input_closed {
                        debug!("ignoring request received after input closed");
                        continue;
                    }
                    self.handle_request(&message).await?;
                }
                RuntimeEvent::Task(task_event) => {
                    if !matches!(task_event, TaskEvent::Output { .. }) {
                        debug!(?task_event, "runtime received task event");
                    }
                    let step = self.core.step(task_event);
                    self.execute(step).await?;
                }
                RuntimeEvent::InputClosed => {
                    input_closed = true;
                    if !self.core.is_idle() {
                        info!(
                            running = self.core.running_count(),
                            queued = self.core.backlog_len(),
                            "input closed; waiting for admitted tasks to finish"
                        );
                    }
                }
                RuntimeEvent::ShutdownRequested => {
                    info!(
                        running = self.core.running_count(),
                        queued = self.core.backlog_len(),
                        "shutdown requested; stopping runtime"
                    );
                    break;
                }
            }

            if input_closed && self.core.is_idle() {
                info!("input closed and no tasks left; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
        Ok(self.core)
    }

    async fn handle_request(&mut self, message: &serde_json::Value) -> Result<()> {
        if !protocol::is_command_message(message) {
            debug!(msg_type = ?message.get("type"), "ignoring non-command message");
            return Ok(());
        }

        let request = CommandRequest::from_value(message);
        debug!(token = %request.token, cmd = ?request.cmd, "command request received");

        match self.intake.accept(request) {
            Ok(spec) => {
                let step = self.core.submit(spec);
                self.execute(step).await
            }
            Err(Rejection { token, error }) => {
                info!(token = %token, code = error.code(), error = %error, "request rejected");
                self.transport.send_text(encode_error(&token, error)).await
            }
        }
    }

    /// Execute the commands of one core step, plus whatever follows from
    /// them (a failed launch feeds back into the core).
    async fn execute(&mut self, step: CoreStep) -> Result<()> {
        let mut pending: VecDeque<CoreCommand> = step.commands.into();

        while let Some(command) = pending.pop_front() {
            match command {
                CoreCommand::Launch(request) => {
                    let task = request.id;
                    if let Err(error) = self.executor.launch(request) {
                        warn!(%task, %error, "launch failed");
                        let step = self.core.step(TaskEvent::LaunchFailed { task, error });
                        pending.extend(step.commands);
                    }
                }
                CoreCommand::Send(payload) => {
                    self.transport.send_text(payload).await?;
                }
                CoreCommand::Release(task) => {
                    self.executor.release(task);
                }
            }
        }

        Ok(())
    }
}
