//! Telemetry Reporting
//!
//! Boundary to the collaborator that turns a detected stall into a
//! diagnostic event. The watchdog calls [`TelemetryReporter::report`] at most
//! once per stall; absence of frames is a normal outcome.

mod events;


pub use events::{AnrReport, ANR_MESSAGE};

/// Receives detected stalls
pub trait TelemetryReporter: Send {
    fn report(&mut self, report: AnrReport);
}

impl<F> TelemetryReporter for F
where
    F: FnMut(AnrReport) + Send,
{
    fn report(&mut self, report: AnrReport) {
        self(report)
    }
}

/// Reporter that emits each stall as one structured `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn new() -> Self {
        Self
    }
}

impl TelemetryReporter for TracingReporter {
    fn report(&mut self, report: AnrReport) {
        let payload = serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string());
        let frame_count = report.frames.as_ref().map_or(0, Vec::len);

        if report.level() == "error" {
            tracing::error!(
                target: "anr",
                blocked_ms = report.blocked_ms,
                hung = report.hung,
                has_stack = report.has_stack(),
                frames = frame_count,
                payload = %payload,
                "{}",
                ANR_MESSAGE
            );
        } else {
            tracing::warn!(
                target: "anr",
                blocked_ms = report.blocked_ms,
                hung = report.hung,
                has_stack = report.has_stack(),
                frames = frame_count,
                payload = %payload,
                "{}",
                ANR_MESSAGE
            );
        }
    }
}
