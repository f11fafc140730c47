//! Process Binding
//!
//! Heartbeat channel between a host process and a sentinel child process.
//! The host binds a loopback socket, passes its address on the child's
//! command line and accepts the child's single connection in the
//! background. Messages are newline-delimited JSON.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;

use super::heartbeat::{ChannelError, HeartbeatMessage, HeartbeatReceiver, HeartbeatSender};
use super::supervisor::WatchdogError;
use crate::core::config::AnrOptions;
use crate::logging::{LogFormat, LogLevel, LogOutput, LoggingConfig, RotationStrategy};

/// Longest heartbeat line accepted from the host
pub const MAX_HEARTBEAT_LINE: usize = 16 * 1024;

/// Sending half held by the host
pub struct ProcessSender {
    pending: Option<oneshot::Receiver<TcpStream>>,
    writer: Option<FramedWrite<TcpStream, LinesCodec>>,
}

impl ProcessSender {
    /// Bind a loopback listener and accept one connection in the background.
    ///
    /// Returns the sender and the address the child must connect to.
    pub async fn bind(cancel: CancellationToken) -> Result<(Self, SocketAddr), WatchdogError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("Sentinel connected from {}", peer);
                        let _ = stream.set_nodelay(true);
                        let _ = tx.send(stream);
                    }
                    Err(e) => tracing::warn!("Failed to accept sentinel connection: {}", e),
                },
            }
        });

        Ok((
            Self {
                pending: Some(rx),
                writer: None,
            },
            addr,
        ))
    }

    fn poll_connection(&mut self) -> Result<&mut FramedWrite<TcpStream, LinesCodec>, ChannelError> {
        if self.writer.is_none() {
            let Some(pending) = self.pending.as_mut() else {
                return Err(ChannelError::Closed);
            };
            match pending.try_recv() {
                Ok(stream) => {
                    self.pending = None;
                    let codec = LinesCodec::new_with_max_length(MAX_HEARTBEAT_LINE);
                    self.writer = Some(FramedWrite::new(stream, codec));
                }
                Err(oneshot::error::TryRecvError::Empty) => return Err(ChannelError::NotConnected),
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.pending = None;
                    return Err(ChannelError::Closed);
                }
            }
        }
        self.writer.as_mut().ok_or(ChannelError::Closed)
    }
}

#[async_trait]
impl HeartbeatSender for ProcessSender {
    async fn send(&mut self, message: &HeartbeatMessage) -> Result<(), ChannelError> {
        let line = serde_json::to_string(message)?;
        let writer = self.poll_connection()?;

        if let Err(e) = writer.send(line).await {
            tracing::debug!("Heartbeat write failed: {}", e);
            self.writer = None;
            return Err(ChannelError::Closed);
        }
        Ok(())
    }
}

/// Receiving half held by the sentinel child
pub struct ProcessReceiver {
    lines: FramedRead<TcpStream, LinesCodec>,
}

impl ProcessReceiver {
    /// Connect to the host's heartbeat socket
    pub async fn connect(addr: SocketAddr) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            lines: FramedRead::new(stream, LinesCodec::new_with_max_length(MAX_HEARTBEAT_LINE)),
        })
    }
}

#[async_trait]
impl HeartbeatReceiver for ProcessReceiver {
    async fn recv(&mut self) -> Option<HeartbeatMessage> {
        loop {
            match self.lines.next().await? {
                Ok(line) => match serde_json::from_str(&line) {
                    Ok(message) => return Some(message),
                    Err(e) => tracing::debug!("Dropping malformed heartbeat: {}", e),
                },
                Err(e) => {
                    tracing::debug!("Heartbeat channel read failed: {}", e);
                    return None;
                }
            }
        }
    }
}

/// Command line of the sentinel child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelArgs {
    /// Host heartbeat socket
    pub channel: SocketAddr,
    pub options: AnrOptions,
    pub verbose: bool,
    /// Also write a rolling log file here
    pub log_dir: Option<PathBuf>,
    pub log_format: LogFormat,
    pub log_rotation: RotationStrategy,
}

impl SentinelArgs {
    pub fn new(channel: SocketAddr, options: AnrOptions) -> Self {
        Self {
            channel,
            options,
            verbose: false,
            log_dir: None,
            log_format: LogFormat::default(),
            log_rotation: RotationStrategy::default(),
        }
    }

    /// Logging setup of the sentinel process
    pub fn logging_config(&self) -> LoggingConfig {
        let level = if self.verbose { LogLevel::Debug } else { LogLevel::Info };
        let config = LoggingConfig::new()
            .with_level(level)
            .with_format(self.log_format)
            .with_rotation(self.log_rotation)
            .with_target(false);

        match &self.log_dir {
            Some(dir) => config
                .with_output(LogOutput::Both)
                .with_log_directory(dir.clone()),
            None => config.with_output(LogOutput::Console),
        }
    }

    /// Render as command line flags
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--channel".to_string(),
            self.channel.to_string(),
            "--poll-interval".to_string(),
            self.options.poll_interval_ms.to_string(),
            "--warning-threshold".to_string(),
            self.options.warning_threshold_ms.to_string(),
            "--hung-threshold".to_string(),
            self.options.hung_threshold_ms.to_string(),
            "--tick-interval".to_string(),
            self.options.tick_interval_ms.to_string(),
        ];
        if self.options.capture_stack_trace {
            args.push("--capture".to_string());
        }
        if self.verbose {
            args.push("--verbose".to_string());
        }
        if let Some(dir) = &self.log_dir {
            args.push("--log-dir".to_string());
            args.push(dir.display().to_string());
        }
        if self.log_format != LogFormat::default() {
            args.push("--log-format".to_string());
            args.push(self.log_format.to_string());
        }
        if self.log_rotation != RotationStrategy::default() {
            args.push("--log-rotation".to_string());
            args.push(self.log_rotation.to_string());
        }
        args
    }

    /// Parse flags produced by [`SentinelArgs::to_args`]
    pub fn parse<I>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let mut channel = None;
        let mut options = AnrOptions::default();
        let mut verbose = false;
        let mut log_dir = None;
        let mut log_format = LogFormat::default();
        let mut log_rotation = RotationStrategy::default();

        fn millis(flag: &str, value: Option<String>) -> Result<u64, String> {
            value
                .ok_or_else(|| format!("{} requires a value", flag))?
                .parse()
                .map_err(|_| format!("Invalid {} value", flag))
        }

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--channel" | "-c" => {
                    let value = args.next().ok_or("--channel requires a value")?;
                    channel = Some(value.parse().map_err(|_| "Invalid --channel address")?);
                }
                "--poll-interval" => options.poll_interval_ms = millis(&arg, args.next())?,
                "--warning-threshold" => options.warning_threshold_ms = millis(&arg, args.next())?,
                "--hung-threshold" => options.hung_threshold_ms = millis(&arg, args.next())?,
                "--tick-interval" => options.tick_interval_ms = millis(&arg, args.next())?,
                "--capture" => options.capture_stack_trace = true,
                "--verbose" | "-v" => verbose = true,
                "--log-dir" => {
                    log_dir = Some(PathBuf::from(args.next().ok_or("--log-dir requires a value")?));
                }
                "--log-format" => {
                    log_format = args.next().ok_or("--log-format requires a value")?.parse()?;
                }
                "--log-rotation" => {
                    log_rotation = args.next().ok_or("--log-rotation requires a value")?.parse()?;
                }
                _ => return Err(format!("Unknown argument: {}", arg)),
            }
        }

        options.validate().map_err(|e| e.to_string())?;

        Ok(Self {
            channel: channel.ok_or("--channel is required")?,
            options,
            verbose,
            log_dir,
            log_format,
            log_rotation,
        })
    }
}

/// Spawn the sentinel child with inherited stdio.
///
/// The child is not killed when the returned handle is dropped.
pub fn spawn_sentinel_process(
    executable: &Path,
    extra_args: &[String],
    args: &SentinelArgs,
) -> Result<Child, WatchdogError> {
    tracing::info!("Starting sentinel process: {:?}", executable);

    Command::new(executable)
        .args(extra_args)
        .args(args.to_args())
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| WatchdogError::ProcessStartFailed(format!("{:?}: {}", executable, e)))
}
