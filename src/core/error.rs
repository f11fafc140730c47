//! Error types for the watchdog
//!
//! Every module owns its error enum; `AnrError` aggregates them for callers
//! that only need a single type. Failures after setup are handled at the
//! component boundary according to [`ErrorRecovery`]: the watchdog degrades,
//! it never takes down the context it is watching.

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::inspector::InspectorError;
use crate::logging::LoggingError;
use crate::watchdog::{ChannelError, WatchdogError};

/// Result type alias for watchdog operations
pub type Result<T> = std::result::Result<T, AnrError>;

/// Main error type
#[derive(Error, Debug)]
pub enum AnrError {
    #[error("Watchdog error: {0}")]
    Watchdog(#[from] WatchdogError),

    #[error("Heartbeat channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Debugger error: {0}")]
    Inspector(#[from] InspectorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a component reacts to an error once it is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Try again on the next opportunity (next pulse, next tick)
    Retry,
    /// Drop the offending message and carry on
    Discard,
    /// Carry on without a stack trace
    Degrade,
    /// Stop the affected component
    Abort,
}

/// Trait for error recovery strategies
pub trait ErrorRecovery {
    fn recovery_action(&self) -> RecoveryAction;

    /// Whether the error should stop the component that hit it
    fn is_fatal(&self) -> bool {
        self.recovery_action() == RecoveryAction::Abort
    }
}

impl ErrorRecovery for ChannelError {
    fn recovery_action(&self) -> RecoveryAction {
        match self {
            ChannelError::NotConnected => RecoveryAction::Retry,
            ChannelError::Encode(_) => RecoveryAction::Discard,
            ChannelError::Closed | ChannelError::Io(_) => RecoveryAction::Abort,
        }
    }
}

impl ErrorRecovery for InspectorError {
    fn recovery_action(&self) -> RecoveryAction {
        match self {
            InspectorError::Encode(_) => RecoveryAction::Discard,
            InspectorError::Connect { .. }
            | InspectorError::Transport(_)
            | InspectorError::Closed => RecoveryAction::Degrade,
        }
    }
}

impl ErrorRecovery for AnrError {
    fn recovery_action(&self) -> RecoveryAction {
        match self {
            AnrError::Channel(e) => e.recovery_action(),
            AnrError::Inspector(e) => e.recovery_action(),
            AnrError::Watchdog(_)
            | AnrError::Config(_)
            | AnrError::Logging(_)
            | AnrError::Io(_) => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failures_are_not_fatal_until_closed() {
        assert_eq!(
            ChannelError::NotConnected.recovery_action(),
            RecoveryAction::Retry
        );
        assert!(!ChannelError::NotConnected.is_fatal());
        assert!(ChannelError::Closed.is_fatal());
    }

    #[test]
    fn test_debugger_failures_degrade() {
        assert_eq!(
            AnrError::from(InspectorError::Closed).recovery_action(),
            RecoveryAction::Degrade
        );
    }

    #[test]
    fn test_setup_errors_abort() {
        let err = AnrError::from(ConfigError::Invalid("pollInterval must be non-zero".into()));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("pollInterval"));
    }
}
