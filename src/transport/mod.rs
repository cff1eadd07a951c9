// src/transport/mod.rs

//! Transport seam between the runtime and whatever carries the frames.
//!
//! The session layer is external. The runtime only needs a way to send one
//! text frame, which is what [`TransportSender`] abstracts. Inbound frames
//! reach the runtime as `RuntimeEvent::RequestReceived`.
//!
//! - [`LineTransport`] writes one frame per line (stdout in production).
//! - [`spawn_line_reader`] turns a line-oriented reader (stdin) into events.
//! - [`ChannelTransport`] forwards frames into a channel for tests.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::errors::{RcmdError, Result};

/// Sends one text frame to the peer.
pub trait TransportSender: Send {
    fn send_text(&mut self, payload: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Newline-delimited frames over any async writer.
#[derive(Debug)]
pub struct LineTransport<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> LineTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin + Send> TransportSender for LineTransport<W> {
    fn send_text(&mut self, payload: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.writer.write_all(payload.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
            self.writer.flush().await?;
            Ok(())
        })
    }
}

/// Frames pushed into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// A transport plus the receiving end of its frames.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl TransportSender for ChannelTransport {
    fn send_text(&mut self, payload: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let res = self
            .tx
            .send(payload)
            .map_err(|_| RcmdError::TransportError("reply channel closed".into()));
        Box::pin(async move { res })
    }
}

/// Read JSON messages, one per line, and forward them to the runtime.
///
/// Blank lines are skipped, unparseable lines are logged and skipped. EOF
/// (or a read error) is reported as `InputClosed`.
pub fn spawn_line_reader<R>(reader: R, events: mpsc::Sender<RuntimeEvent>) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    info!("input closed");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "reading input failed; treating as closed");
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(err) => {
                    warn!(error = %err, "skipping malformed message");
                    continue;
                }
            };

            if events.send(RuntimeEvent::RequestReceived(value)).await.is_err() {
                debug!("runtime gone; stopping input reader");
                return;
            }
        }

        let _ = events.send(RuntimeEvent::InputClosed).await;
    })
}
