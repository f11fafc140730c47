//! Tests for the logging system

use super::*;
use tempfile::TempDir;

#[test]
fn test_log_level_display() {
    assert_eq!(LogLevel::Trace.to_string(), "trace");
    assert_eq!(LogLevel::Debug.to_string(), "debug");
    assert_eq!(LogLevel::Info.to_string(), "info");
    assert_eq!(LogLevel::Warn.to_string(), "warn");
    assert_eq!(LogLevel::Error.to_string(), "error");
}

#[test]
fn test_log_level_to_tracing() {
    assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
    assert_eq!(LogLevel::default(), LogLevel::Info);
}

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Text);
    assert_eq!(config.output, LogOutput::Console);
    assert!(config.include_target);
    assert!(!config.writes_file());
    assert_eq!(config.log_directory, Some(default_log_directory()));
    assert_eq!(config.rotation, RotationStrategy::Daily);
}

#[test]
fn test_format_and_rotation_parse_from_flags() {
    assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
    assert_eq!("TEXT".parse::<LogFormat>(), Ok(LogFormat::Text));
    assert!("xml".parse::<LogFormat>().is_err());

    assert_eq!("hourly".parse::<RotationStrategy>(), Ok(RotationStrategy::Hourly));
    assert_eq!("never".parse::<RotationStrategy>(), Ok(RotationStrategy::Never));
    assert!("weekly".parse::<RotationStrategy>().is_err());

    for rotation in [RotationStrategy::Daily, RotationStrategy::Hourly, RotationStrategy::Never] {
        assert_eq!(rotation.to_string().parse::<RotationStrategy>(), Ok(rotation));
    }
}

#[test]
fn test_logging_config_serialization() {
    let config = LoggingConfig::new().with_level(LogLevel::Warn);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"level\":\"warn\""));

    let parsed: LoggingConfig = serde_json::from_str(
        r#"{"level":"error","format":"json","output":"file","log_directory":null}"#,
    )
    .unwrap();
    assert_eq!(parsed.level, LogLevel::Error);
    assert_eq!(parsed.format, LogFormat::Json);
    assert!(parsed.writes_file());
    assert!(parsed.include_target);
    assert_eq!(parsed.rotation, RotationStrategy::Daily);
}

#[test]
fn test_env_filter_uses_configured_level() {
    // RUST_LOG takes precedence when the test runner sets it
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let config = LoggingConfig::new().with_level(LogLevel::Debug);
    let filter = LoggingSystem::build_env_filter(&config);
    assert_eq!(filter.to_string(), "debug");
}

#[test]
fn test_init_creates_log_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("nested").join("logs");
    let config = LoggingConfig::new()
        .with_output(LogOutput::File)
        .with_format(LogFormat::Json)
        .with_log_directory(log_dir.clone());

    // Another test may already own the global subscriber; the directory is
    // created before installation either way.
    let _ = LoggingSystem::init(config);
    assert!(log_dir.exists());
}

#[test]
fn test_console_output_creates_no_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("unused");
    let config = LoggingConfig::new().with_log_directory(log_dir.clone());

    let _ = LoggingSystem::init(config);
    assert!(!log_dir.exists());
}
