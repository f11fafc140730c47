//! Watchdog Module
//!
//! Detects when the host stops making progress. The supervisor side sends
//! heartbeats from the host runtime, the sentinel side watches them with a
//! [`HealthMonitor`] and reports stalls, with a stack when it can get one.

pub mod capture;
pub mod heartbeat;
pub mod monitor;
pub mod process;
pub mod sentinel;
pub mod supervisor;
pub mod thread;

#[cfg(test)]
mod tests;

pub use capture::{CaptureOutcome, CaptureRequest, ExternalCapture, InspectorCapture, StackCapture};
pub use heartbeat::{
    drive_pulses, ChannelError, HeartbeatMessage, HeartbeatReceiver, HeartbeatSender,
    HEARTBEAT_INTERVAL_MS,
};
pub use monitor::{HealthMonitor, HealthState, MonitorConfig};
pub use process::{ProcessReceiver, ProcessSender, SentinelArgs};
pub use sentinel::Sentinel;
pub use supervisor::{capture_for, Binding, Supervisor, SupervisorConfig, WatchdogError};
pub use thread::{spawn_sentinel_thread, ThreadReceiver, ThreadSender};
