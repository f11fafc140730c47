//! Heartbeat Channel Module
//!
//! Typed messages and the send/receive seams shared by the process and
//! thread bindings, plus the pulse loop the supervisor runs.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::error::ErrorRecovery;

/// Default heartbeat cadence in milliseconds
pub const HEARTBEAT_INTERVAL_MS: u64 = 50;

/// One heartbeat pulse.
///
/// Every message counts as a pulse. The debugger endpoint piggybacks on it
/// and may be repeated on every pulse; receivers keep the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    #[serde(rename = "inspectURL", default, skip_serializing_if = "Option::is_none")]
    pub inspect_url: Option<String>,
}

impl HeartbeatMessage {
    pub fn new(inspect_url: Option<String>) -> Self {
        Self { inspect_url }
    }

    /// Endpoint address, ignoring empty strings
    pub fn endpoint(&self) -> Option<&str> {
        self.inspect_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Errors that can occur on a heartbeat channel
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Monitoring side has not connected yet")]
    NotConnected,

    #[error("Heartbeat channel closed")]
    Closed,

    #[error("Failed to encode heartbeat: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sending half, owned by the supervisor
#[async_trait]
pub trait HeartbeatSender: Send {
    async fn send(&mut self, message: &HeartbeatMessage) -> Result<(), ChannelError>;
}

/// Receiving half, owned by the sentinel
#[async_trait]
pub trait HeartbeatReceiver: Send {
    /// Next message, or `None` once the supervisor side is gone
    async fn recv(&mut self) -> Option<HeartbeatMessage>;
}

/// Send a pulse every `period` until cancelled or the channel closes.
///
/// Send failures never escape: a missed pulse looks the same as a late one
/// to the monitor. The loop runs as an ordinary task on the caller's
/// runtime, so a stalled runtime stops the pulses.
pub async fn drive_pulses<S>(
    mut sender: S,
    period: Duration,
    inspect_url: Option<String>,
    cancel: CancellationToken,
) where
    S: HeartbeatSender,
{
    let message = HeartbeatMessage::new(inspect_url);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::debug!("Heartbeat pulses started (every {:?})", period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = sender.send(&message).await {
                    if e.is_fatal() {
                        tracing::debug!("Heartbeat channel gone, stopping pulses: {}", e);
                        break;
                    }
                    tracing::trace!("Heartbeat skipped: {}", e);
                }
            }
        }
    }

    tracing::debug!("Heartbeat pulses stopped");
}
