//! Stack Capture Strategies
//!
//! What the sentinel does when the monitored context is hung. The process
//! binding pauses the host through its debugger endpoint; the thread binding
//! already observes the stall from outside and has nothing to pause.

use tokio::sync::{mpsc, oneshot};

use crate::inspector::{DebugProtocolClient, StackFrame};

/// Result of one capture attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOutcome {
    pub blocked_ms: u64,
    /// `None` when no stack could be captured
    pub frames: Option<Vec<StackFrame>>,
}

/// A pending capture. Completing it delivers the outcome to the sentinel.
#[derive(Debug)]
pub struct CaptureRequest {
    blocked_ms: u64,
    outcomes: mpsc::UnboundedSender<CaptureOutcome>,
}

impl CaptureRequest {
    pub fn new(blocked_ms: u64, outcomes: mpsc::UnboundedSender<CaptureOutcome>) -> Self {
        Self {
            blocked_ms,
            outcomes,
        }
    }

    pub fn blocked_ms(&self) -> u64 {
        self.blocked_ms
    }

    pub fn complete(self, frames: Option<Vec<StackFrame>>) {
        let _ = self.outcomes.send(CaptureOutcome {
            blocked_ms: self.blocked_ms,
            frames,
        });
    }
}

/// Strategy for capturing the stack of a hung context
pub trait StackCapture: Send {
    /// Start a capture. `endpoint` is the debugger address, if one arrived.
    /// The request must be completed at most once; it may never complete if
    /// the remote side never pauses.
    fn begin(&mut self, endpoint: Option<&str>, request: CaptureRequest);
}

/// Pause-and-capture through the remote debugger.
///
/// The client is created on the first capture that has an endpoint and is
/// reused afterwards. Once it has failed, later captures report no frames.
#[derive(Debug, Default)]
pub struct InspectorCapture {
    client: Option<DebugProtocolClient>,
}

impl InspectorCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> Option<&DebugProtocolClient> {
        self.client.as_ref()
    }
}

impl StackCapture for InspectorCapture {
    fn begin(&mut self, endpoint: Option<&str>, request: CaptureRequest) {
        if self.client.is_none() {
            if let Some(url) = endpoint {
                tracing::info!("Connecting to debugger at {}", url);
                self.client = Some(DebugProtocolClient::connect(url));
            }
        }

        let Some(client) = self.client.as_ref().filter(|client| !client.is_closed()) else {
            request.complete(None);
            return;
        };

        let (tx, rx) = oneshot::channel();
        // A closed connection drops the callback, which resolves `rx` with an error
        let _ = client.pause_and_capture(move |frames| {
            let _ = tx.send(frames);
        });

        tokio::spawn(async move {
            let frames = rx.await.ok();
            if frames.is_none() {
                tracing::warn!("Debugger connection lost before the stack was captured");
            }
            request.complete(frames);
        });
    }
}

/// Capture for the thread binding: reports the stall without a stack
#[derive(Debug, Default, Clone, Copy)]
pub struct ExternalCapture;

impl StackCapture for ExternalCapture {
    fn begin(&mut self, _endpoint: Option<&str>, request: CaptureRequest) {
        request.complete(None);
    }
}
