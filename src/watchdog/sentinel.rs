//! Sentinel
//!
//! Monitoring side of the watchdog. Receives heartbeats, runs the health
//! monitor, starts a stack capture when the monitored context hangs and
//! hands each stall to the reporter, at most once per stall.

use std::time::Instant;

use tokio::sync::mpsc;

use super::capture::{CaptureOutcome, CaptureRequest, StackCapture};
use super::heartbeat::{HeartbeatMessage, HeartbeatReceiver};
use super::monitor::{spawn_ticker, HealthMonitor, HealthState};
use crate::core::config::AnrOptions;
use crate::telemetry::{AnrReport, TelemetryReporter};

/// Current time on tokio's clock, so paused-time tests drive the monitor too
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

pub struct Sentinel<R> {
    options: AnrOptions,
    capture: Box<dyn StackCapture>,
    reporter: R,
    endpoint: Option<String>,
    excursion_hung: bool,
}

impl<R> Sentinel<R>
where
    R: TelemetryReporter,
{
    pub fn new(options: AnrOptions, capture: Box<dyn StackCapture>, reporter: R) -> Self {
        Self {
            options,
            capture,
            reporter,
            endpoint: None,
            excursion_hung: false,
        }
    }

    /// Debugger endpoint received from the host, if any
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Run until the heartbeat channel closes
    pub async fn run<H>(mut self, mut heartbeats: H)
    where
        H: HeartbeatReceiver,
    {
        let (transition_tx, mut transitions) = mpsc::unbounded_channel();
        let (outcome_tx, mut outcomes) = mpsc::unbounded_channel();

        let mut monitor = HealthMonitor::new(self.options.monitor_config(), now(), move |elapsed_ms, state| {
            let _ = transition_tx.send((elapsed_ms, state));
        });
        let mut ticker = spawn_ticker(self.options.tick_interval());

        tracing::info!(
            poll_interval_ms = self.options.poll_interval_ms,
            warning_threshold_ms = self.options.warning_threshold_ms,
            hung_threshold_ms = self.options.hung_threshold_ms,
            "Sentinel started"
        );

        loop {
            tokio::select! {
                message = heartbeats.recv() => match message {
                    Some(message) => {
                        monitor.receive_heartbeat(now());
                        self.accept_endpoint(&message);
                    }
                    None => {
                        tracing::info!("Heartbeat channel closed, sentinel stopping");
                        break;
                    }
                },
                _ = ticker.tick() => monitor.tick(now()),
                Some((elapsed_ms, state)) = transitions.recv() => {
                    self.on_state_change(elapsed_ms, state, &outcome_tx);
                }
                Some(outcome) = outcomes.recv() => self.on_capture(outcome),
            }
        }
    }

    /// First non-empty endpoint wins
    fn accept_endpoint(&mut self, message: &HeartbeatMessage) {
        if self.endpoint.is_some() {
            return;
        }
        if let Some(url) = message.endpoint() {
            tracing::debug!("Received debugger endpoint {}", url);
            self.endpoint = Some(url.to_string());
        }
    }

    fn on_state_change(
        &mut self,
        elapsed_ms: u64,
        state: HealthState,
        outcomes: &mpsc::UnboundedSender<CaptureOutcome>,
    ) {
        match state {
            HealthState::Warning => {
                self.excursion_hung = false;
            }
            HealthState::Hung => {
                self.excursion_hung = true;
                let endpoint = if self.options.capture_stack_trace {
                    self.endpoint.as_deref()
                } else {
                    None
                };
                self.capture
                    .begin(endpoint, CaptureRequest::new(elapsed_ms, outcomes.clone()));
            }
            HealthState::Idle => {
                // A hung excursion was already reported through its capture
                if !self.excursion_hung {
                    self.reporter.report(AnrReport::new(elapsed_ms, false, None));
                }
                self.excursion_hung = false;
            }
        }
    }

    fn on_capture(&mut self, outcome: CaptureOutcome) {
        tracing::debug!(
            "Capture finished with {} frames",
            outcome.frames.as_ref().map_or(0, Vec::len)
        );
        self.reporter
            .report(AnrReport::new(outcome.blocked_ms, true, outcome.frames));
    }
}
