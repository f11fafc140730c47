//! Thread Binding
//!
//! Heartbeat channel to a sentinel running on a detached background thread
//! inside the host process. The thread hosts its own single-threaded
//! runtime, so it keeps running while the host's runtime is stalled.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::heartbeat::{ChannelError, HeartbeatMessage, HeartbeatReceiver, HeartbeatSender};
use super::sentinel::Sentinel;
use super::supervisor::{capture_for, Binding, WatchdogError};
use crate::core::config::AnrOptions;
use crate::telemetry::TelemetryReporter;

/// Name of the sentinel thread
pub const SENTINEL_THREAD_NAME: &str = "anr-sentinel";

/// Sending half held by the host
#[derive(Debug, Clone)]
pub struct ThreadSender {
    tx: mpsc::UnboundedSender<HeartbeatMessage>,
}

/// Receiving half held by the sentinel thread
#[derive(Debug)]
pub struct ThreadReceiver {
    rx: mpsc::UnboundedReceiver<HeartbeatMessage>,
}

/// Create an in-process heartbeat channel
pub fn channel() -> (ThreadSender, ThreadReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ThreadSender { tx }, ThreadReceiver { rx })
}

#[async_trait]
impl HeartbeatSender for ThreadSender {
    async fn send(&mut self, message: &HeartbeatMessage) -> Result<(), ChannelError> {
        self.tx.send(message.clone()).map_err(|_| ChannelError::Closed)
    }
}

#[async_trait]
impl HeartbeatReceiver for ThreadReceiver {
    async fn recv(&mut self) -> Option<HeartbeatMessage> {
        self.rx.recv().await
    }
}

/// Start a sentinel on a detached background thread.
///
/// The thread is never joined and does not keep the process alive. It stops
/// on its own once every [`ThreadSender`] is dropped.
pub fn spawn_sentinel_thread<R>(options: AnrOptions, reporter: R) -> Result<ThreadSender, WatchdogError>
where
    R: TelemetryReporter + 'static,
{
    let (sender, receiver) = channel();

    std::thread::Builder::new()
        .name(SENTINEL_THREAD_NAME.to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!("Failed to build sentinel runtime: {}", e);
                    return;
                }
            };

            let sentinel = Sentinel::new(options, capture_for(Binding::Thread), reporter);
            runtime.block_on(sentinel.run(receiver));
        })
        .map_err(|e| WatchdogError::ThreadStartFailed(e.to_string()))?;

    tracing::info!("Sentinel thread started");
    Ok(sender)
}
