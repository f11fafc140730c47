//! Watchdog Supervisor Module
//!
//! Host side of the watchdog. Starts the sentinel in a child process or a
//! background thread and sends it heartbeats from the host's own runtime, so
//! a stalled host stops the pulses.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::capture::{ExternalCapture, InspectorCapture, StackCapture};
use super::heartbeat::{drive_pulses, ChannelError};
use super::process::{spawn_sentinel_process, ProcessSender, SentinelArgs};
use super::thread::spawn_sentinel_thread;
use crate::core::config::{AnrOptions, ConfigError};
use crate::logging::LogFormat;
use crate::telemetry::TelemetryReporter;

/// File name of the sentinel binary, looked up next to the host executable
pub const SENTINEL_EXECUTABLE: &str = "anr-sentinel";

/// Watchdog errors
#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("Failed to start sentinel process: {0}")]
    ProcessStartFailed(String),

    #[error("Failed to start sentinel thread: {0}")]
    ThreadStartFailed(String),

    #[error("Heartbeat channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the sentinel runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    /// Child OS process talking over a loopback socket
    #[default]
    Process,
    /// Detached thread in the host process
    Thread,
}

/// Capture strategy matching a binding
pub fn capture_for(binding: Binding) -> Box<dyn StackCapture> {
    match binding {
        Binding::Process => Box::new(InspectorCapture::new()),
        Binding::Thread => Box::new(ExternalCapture),
    }
}

/// Supervisor configuration
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    pub options: AnrOptions,

    pub binding: Binding,

    /// Sentinel binary, defaults to `anr-sentinel` beside the current executable
    pub sentinel_executable: Option<PathBuf>,

    /// Arguments placed before the generated sentinel flags
    pub sentinel_args: Vec<String>,

    /// Remote debugging endpoint of the host, if one is open
    pub inspect_url: Option<String>,

    /// Log directory of a sentinel process, console only when unset
    pub sentinel_log_dir: Option<PathBuf>,

    pub sentinel_log_format: LogFormat,
}

impl SupervisorConfig {
    pub fn new(options: AnrOptions) -> Self {
        Self {
            options,
            ..Default::default()
        }
    }

    pub fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_sentinel_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.sentinel_executable = Some(path.into());
        self
    }

    pub fn with_inspect_url(mut self, url: impl Into<String>) -> Self {
        self.inspect_url = Some(url.into());
        self
    }

    /// Have the sentinel process also log to a rolling file in `dir`
    pub fn with_sentinel_logging(mut self, dir: impl Into<PathBuf>, format: LogFormat) -> Self {
        self.sentinel_log_dir = Some(dir.into());
        self.sentinel_log_format = format;
        self
    }

    /// Command line of a sentinel process listening on `channel`
    pub fn sentinel_args(&self, channel: SocketAddr) -> SentinelArgs {
        let mut args = SentinelArgs::new(channel, self.options.clone());
        args.log_dir = self.sentinel_log_dir.clone();
        args.log_format = self.sentinel_log_format;
        args
    }

    /// Endpoint sent with each pulse. Nothing is forwarded unless capture is on.
    pub fn forwarded_inspect_url(&self) -> Option<String> {
        if self.options.capture_stack_trace {
            self.inspect_url.clone().filter(|url| !url.is_empty())
        } else {
            None
        }
    }

    fn sentinel_executable(&self) -> Result<PathBuf, WatchdogError> {
        match &self.sentinel_executable {
            Some(path) => Ok(path.clone()),
            None => {
                let name = format!("{}{}", SENTINEL_EXECUTABLE, std::env::consts::EXE_SUFFIX);
                Ok(std::env::current_exe()?.with_file_name(name))
            }
        }
    }
}

/// Running watchdog, owned by the host.
///
/// Dropping it stops the pulses, which in turn stops the sentinel.
pub struct Supervisor {
    cancel: CancellationToken,
    binding: Binding,
    child_id: Option<u32>,
}

impl Supervisor {
    /// Start the sentinel for `config.binding`.
    ///
    /// `reporter` receives the reports of a thread sentinel. A process
    /// sentinel reports through its own logging and drops it.
    pub async fn start<R>(config: SupervisorConfig, reporter: R) -> Result<Self, WatchdogError>
    where
        R: TelemetryReporter + 'static,
    {
        match config.binding {
            Binding::Process => Self::start_process(config).await,
            Binding::Thread => Self::start_thread(config, reporter),
        }
    }

    /// Spawn the sentinel binary and pulse it over a loopback socket
    pub async fn start_process(config: SupervisorConfig) -> Result<Self, WatchdogError> {
        config.options.validate()?;
        let executable = config.sentinel_executable()?;
        let cancel = CancellationToken::new();

        let (sender, addr) = ProcessSender::bind(cancel.child_token()).await?;
        let args = config.sentinel_args(addr);
        let mut child = match spawn_sentinel_process(&executable, &config.sentinel_args, &args) {
            Ok(child) => child,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        };
        let child_id = child.id();

        // No restart: a dead sentinel only ends the pulses
        let watcher = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = watcher.cancelled() => {}
                status = child.wait() => {
                    match status {
                        Ok(status) => tracing::warn!("Sentinel process exited: {}", status),
                        Err(e) => tracing::error!("Failed to wait for sentinel process: {}", e),
                    }
                    watcher.cancel();
                }
            }
        });

        spawn_pulses(sender, &config, cancel.clone());

        tracing::info!("Watchdog started with sentinel process {:?}", child_id);
        Ok(Self {
            cancel,
            binding: Binding::Process,
            child_id,
        })
    }

    /// Start the sentinel on a background thread of this process
    pub fn start_thread<R>(config: SupervisorConfig, reporter: R) -> Result<Self, WatchdogError>
    where
        R: TelemetryReporter + 'static,
    {
        config.options.validate()?;
        let cancel = CancellationToken::new();

        let sender = spawn_sentinel_thread(config.options.clone(), reporter)?;
        spawn_pulses(sender, &config, cancel.clone());

        tracing::info!("Watchdog started with sentinel thread");
        Ok(Self {
            cancel,
            binding: Binding::Thread,
            child_id: None,
        })
    }

    /// Stop sending pulses. The sentinel exits once it sees the channel close.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            tracing::info!("Stopping watchdog");
            self.cancel.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    /// OS id of the sentinel child, process binding only
    pub fn child_id(&self) -> Option<u32> {
        self.child_id
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_pulses<S>(sender: S, config: &SupervisorConfig, cancel: CancellationToken)
where
    S: super::heartbeat::HeartbeatSender + 'static,
{
    let period = config.options.poll_interval();
    let inspect_url = config.forwarded_inspect_url();

    tokio::spawn(async move {
        drive_pulses(sender, period, inspect_url, cancel.clone()).await;
        // Channel gone for good
        cancel.cancel();
    });
}

// ============================================================================
// Tests
// ============================================================================
