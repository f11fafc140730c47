//! Debug Protocol Client
//!
//! Connects to a remote-debugging endpoint over a WebSocket, pauses the
//! remote runtime on request and converts the paused call stack into
//! [`StackFrame`]s. The connection is driven by a background task so that
//! callers never block on the remote side.

use std::fmt;

use futures::{Sink, SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use super::frames::StackFrame;
use super::protocol::{ProtocolSession, DEBUGGER_ENABLE, DEBUGGER_PAUSE, DEBUGGER_RESUME};

/// Debugger client errors
#[derive(Error, Debug)]
pub enum InspectorError {
    #[error("Failed to connect to debugger at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    #[error("Debugger transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("Failed to encode debugger command: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Debugger connection closed")]
    Closed,
}

type FramesCallback = Box<dyn FnOnce(Vec<StackFrame>) + Send>;

enum Request {
    PauseAndCapture(FramesCallback),
    Close,
}

/// Handle to one remote-debugging connection
#[derive(Clone)]
pub struct DebugProtocolClient {
    url: String,
    requests: mpsc::UnboundedSender<Request>,
}

impl DebugProtocolClient {
    /// Start connecting to `url`.
    ///
    /// Returns immediately; the connection is established by a task spawned
    /// on the current tokio runtime. Requests made before the connection is
    /// up are queued. If the connection cannot be established, queued
    /// requests are dropped without calling their callbacks.
    pub fn connect(url: impl Into<String>) -> Self {
        let url = url.into();
        let (requests, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_connection(url.clone(), receiver));

        Self { url, requests }
    }

    /// Pause the remote runtime and call `on_frames` with its stack.
    ///
    /// The remote side is resumed before `on_frames` runs. A capture still
    /// waiting for its pause is dropped when a new one is requested, so a
    /// late `Debugger.paused` is never credited to the wrong request.
    pub fn pause_and_capture<F>(&self, on_frames: F) -> Result<(), InspectorError>
    where
        F: FnOnce(Vec<StackFrame>) + Send + 'static,
    {
        self.requests
            .send(Request::PauseAndCapture(Box::new(on_frames)))
            .map_err(|_| InspectorError::Closed)
    }

    /// Close the connection. Pending captures are dropped.
    pub fn close(&self) {
        let _ = self.requests.send(Request::Close);
    }

    /// Whether the connection task has finished
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for DebugProtocolClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugProtocolClient")
            .field("url", &self.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn send_command<S>(
    sink: &mut S,
    session: &mut ProtocolSession,
    method: &str,
) -> Result<(), InspectorError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = session.command(method)?;
    sink.send(Message::text(text)).await?;
    Ok(())
}

async fn run_connection(url: String, mut requests: mpsc::UnboundedReceiver<Request>) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(source) => {
            let error = InspectorError::Connect { url, source };
            tracing::warn!("{}", error);
            return;
        }
    };
    tracing::info!("Connected to debugger at {}", url);

    let (mut sink, mut incoming) = stream.split();
    let mut session = ProtocolSession::new();
    let mut pending: Option<FramesCallback> = None;

    loop {
        tokio::select! {
            request = requests.recv() => match request {
                Some(Request::PauseAndCapture(on_frames)) => {
                    if pending.replace(on_frames).is_some() {
                        tracing::debug!("Dropping a capture whose pause was never answered");
                    }
                    let sent = async {
                        send_command(&mut sink, &mut session, DEBUGGER_ENABLE).await?;
                        send_command(&mut sink, &mut session, DEBUGGER_PAUSE).await
                    }
                    .await;
                    if let Err(e) = sent {
                        tracing::warn!("Failed to request debugger pause: {}", e);
                        break;
                    }
                }
                Some(Request::Close) | None => {
                    let _ = sink.close().await;
                    break;
                }
            },
            message = incoming.next() => match message {
                Some(Ok(Message::Close(_))) | None => {
                    tracing::debug!("Debugger closed the connection");
                    break;
                }
                Some(Ok(message)) => {
                    if !message.is_text() {
                        continue;
                    }
                    let Ok(text) = message.to_text() else {
                        continue;
                    };
                    let Some(call_frames) = session.handle(text) else {
                        continue;
                    };

                    // Resume first: the remote runtime stays suspended until this is sent
                    if let Err(e) = send_command(&mut sink, &mut session, DEBUGGER_RESUME).await {
                        tracing::warn!("Failed to resume debugger: {}", e);
                    }

                    let frames = session.stack_frames(&call_frames);
                    match pending.take() {
                        Some(on_frames) => on_frames(frames),
                        None => tracing::debug!("Resumed a pause that no capture asked for"),
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!("Debugger connection error: {}", e);
                    break;
                }
            },
        }
    }

    tracing::debug!(
        "Debugger connection to {} finished (capture pending: {})",
        url,
        pending.is_some()
    );
}
