//! ANR report type
//!
//! The data handed to the reporter for one detected stall. Turning it into
//! an envelope and delivering it is the reporter's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inspector::StackFrame;

/// Event message used by reporters that need a human-readable title
pub const ANR_MESSAGE: &str = "Application Not Responding";

/// One detected stall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnrReport {
    /// How long the monitored context was unable to run callbacks
    pub blocked_ms: u64,
    /// Whether the stall crossed the hung threshold
    pub hung: bool,
    /// Stack of the stalled context, outermost frame first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<StackFrame>>,
    /// When the report was produced
    pub detected_at: DateTime<Utc>,
}

impl AnrReport {
    pub fn new(blocked_ms: u64, hung: bool, frames: Option<Vec<StackFrame>>) -> Self {
        Self {
            blocked_ms,
            hung,
            frames,
            detected_at: Utc::now(),
        }
    }

    /// Severity a reporter should use: hangs are errors, stalls are warnings
    pub fn level(&self) -> &'static str {
        if self.hung {
            "error"
        } else {
            "warning"
        }
    }

    pub fn has_stack(&self) -> bool {
        self.frames.as_ref().is_some_and(|frames| !frames.is_empty())
    }
}
