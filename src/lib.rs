//! anr-watchdog - detects when an application stops responding
//!
//! This crate provides:
//! - A heartbeat-driven health monitor with warning and hung states
//! - Process and thread bindings for the monitoring side
//! - Stack capture through a remote debugging connection
//! - Structured logging and reporting of detected stalls

pub mod core;
pub mod inspector;
pub mod logging;
pub mod telemetry;
pub mod watchdog;

// Re-export commonly used items
pub use core::config::AnrOptions;
pub use core::error::{AnrError, Result};
pub use inspector::{DebugProtocolClient, StackFrame};
pub use telemetry::{AnrReport, TelemetryReporter, TracingReporter};
pub use watchdog::{Binding, HealthMonitor, HealthState, Sentinel, Supervisor, SupervisorConfig};
