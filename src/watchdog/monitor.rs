//! Health Monitor Module
//!
//! Turns irregular heartbeat arrivals into edge-triggered health
//! transitions. The monitor never reads the clock itself: callers pass `now`
//! to every operation, which keeps the state machine deterministic.

use std::time::{Duration, Instant};

use tokio::time::{interval, Interval, MissedTickBehavior};

/// Default fine-grained tick, independent of the heartbeat cadence
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

/// Health of the monitored context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthState {
    /// Heartbeats arrive on time
    #[default]
    Idle,
    /// Heartbeats are late by more than the warning threshold
    Warning,
    /// Heartbeats are late by more than the hung threshold
    Hung,
}

/// Monitor thresholds, all in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Expected heartbeat cadence
    pub poll_interval_ms: u64,
    /// Delay above `poll_interval_ms` that counts as a stall
    pub warning_threshold_ms: u64,
    /// Delay above `poll_interval_ms` that counts as hung
    pub hung_threshold_ms: u64,
}

impl MonitorConfig {
    pub fn warning_limit(&self) -> u64 {
        self.poll_interval_ms.saturating_add(self.warning_threshold_ms)
    }

    pub fn hung_limit(&self) -> u64 {
        self.poll_interval_ms.saturating_add(self.hung_threshold_ms)
    }
}

/// Heartbeat health state machine.
///
/// `on_state_change` is called with the elapsed milliseconds and the new
/// state. Hung fires once per excursion. Recovery reports the peak elapsed
/// time of the excursion, not the sample that revealed the recovery.
pub struct HealthMonitor<F> {
    config: MonitorConfig,
    last_heartbeat: Instant,
    state: HealthState,
    last_elapsed_ms: u64,
    peak_elapsed_ms: u64,
    warning_latched: bool,
    on_state_change: F,
}

impl<F> HealthMonitor<F>
where
    F: FnMut(u64, HealthState),
{
    pub fn new(config: MonitorConfig, now: Instant, on_state_change: F) -> Self {
        Self {
            config,
            last_heartbeat: now,
            state: HealthState::Idle,
            last_elapsed_ms: 0,
            peak_elapsed_ms: 0,
            warning_latched: false,
            on_state_change,
        }
    }

    /// Record a heartbeat arrival
    pub fn receive_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = now;
    }

    /// Evaluate the elapsed time since the last heartbeat
    pub fn tick(&mut self, now: Instant) {
        // Clock anomalies saturate to zero
        let elapsed = now.saturating_duration_since(self.last_heartbeat).as_millis() as u64;

        if self.state != HealthState::Idle && elapsed < self.last_elapsed_ms {
            let peak = self.peak_elapsed_ms.max(self.last_elapsed_ms);
            tracing::info!("Heartbeat recovered after {}ms", peak);
            self.transition(peak, HealthState::Idle);
            self.peak_elapsed_ms = 0;
        } else if elapsed > self.config.hung_limit() && self.state != HealthState::Hung {
            tracing::warn!("No heartbeat for {}ms, context is hung", elapsed);
            self.transition(elapsed, HealthState::Hung);
        } else if elapsed > self.config.warning_limit()
            && self.state == HealthState::Idle
            && !self.warning_latched
        {
            tracing::warn!("Heartbeat late by {}ms", elapsed);
            self.warning_latched = true;
            self.transition(elapsed, HealthState::Warning);
        }

        if elapsed < self.config.warning_limit() {
            self.warning_latched = false;
        }

        if self.state != HealthState::Idle {
            self.peak_elapsed_ms = self.peak_elapsed_ms.max(elapsed);
        }
        self.last_elapsed_ms = elapsed;
    }

    fn transition(&mut self, elapsed_ms: u64, state: HealthState) {
        self.state = state;
        (self.on_state_change)(elapsed_ms, state);
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    /// Most recent elapsed sample in milliseconds
    pub fn last_elapsed_ms(&self) -> u64 {
        self.last_elapsed_ms
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }
}

/// Interval driving [`HealthMonitor::tick`].
///
/// Late ticks are delayed rather than bursted, so a stalled monitor resumes
/// with one sample instead of a backlog.
pub fn spawn_ticker(tick_interval: Duration) -> Interval {
    let mut ticker = interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}
