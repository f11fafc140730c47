//! Core Module
//!
//! Shared building blocks for the watchdog:
//! - Options and their on-disk configuration
//! - Error types and the recovery taxonomy

pub mod config;
pub mod error;

pub use config::{AnrOptions, ConfigError, ConfigResult};
pub use error::{AnrError, ErrorRecovery, RecoveryAction, Result};
