//! ANR Sentinel Process
//!
//! Monitoring side of the process binding. Spawned by the host's
//! `Supervisor`, it reads heartbeats from the host over a loopback socket and
//! reports when they stop arriving.
//!
//! Usage:
//!   anr-sentinel --channel <ADDR> [OPTIONS]
//!
//! The sentinel will:
//! 1. Connect to the heartbeat socket opened by the host
//! 2. Track the time since the last heartbeat
//! 3. Pause the host through its debugger and capture a stack when it hangs
//! 4. Exit once the host closes the channel

use anyhow::Context;

use anr_watchdog::logging::LoggingSystem;
use anr_watchdog::telemetry::TracingReporter;
use anr_watchdog::watchdog::{capture_for, Binding, ProcessReceiver, Sentinel, SentinelArgs};

fn print_help() {
    println!(
        r#"ANR Sentinel - Heartbeat Monitor

USAGE:
    anr-sentinel [OPTIONS] --channel <ADDR>

OPTIONS:
    -c, --channel <ADDR>           Host heartbeat socket address (required)
        --poll-interval <MS>       Expected heartbeat cadence (default: 50)
        --warning-threshold <MS>   Delay above the cadence reported as a stall (default: 200)
        --hung-threshold <MS>      Delay above the cadence treated as a hang (default: 5000)
        --tick-interval <MS>       Monitor sampling period (default: 10)
        --capture                  Capture a stack through the host debugger on a hang
    -v, --verbose                  Enable verbose logging
        --log-dir <PATH>           Also write a rolling log file in PATH
        --log-format <FORMAT>      Log line format: text or json (default: text)
        --log-rotation <WHEN>      Log file rollover: daily, hourly or never (default: daily)
    -h, --help                     Print this help message

DESCRIPTION:
    The sentinel is normally started by the host application, not by hand.
    It exits when the host closes the heartbeat channel.
"#
    );
}

fn init_logging(args: &SentinelArgs) -> Option<LoggingSystem> {
    match LoggingSystem::init(args.logging_config()) {
        Ok(system) => Some(system),
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    }
}

async fn run_sentinel(args: SentinelArgs) -> anyhow::Result<()> {
    tracing::info!("Starting ANR sentinel");
    tracing::info!("Heartbeat channel: {}", args.channel);

    let receiver = ProcessReceiver::connect(args.channel)
        .await
        .with_context(|| format!("Failed to connect to heartbeat channel {}", args.channel))?;

    let sentinel = Sentinel::new(args.options, capture_for(Binding::Process), TracingReporter::new());
    sentinel.run(receiver).await;

    tracing::info!("Sentinel stopped");
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return;
    }

    let args = match SentinelArgs::parse(raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let _logging = init_logging(&args);

    if let Err(e) = run_sentinel(args).await {
        tracing::error!("Sentinel failed: {:#}", e);
        std::process::exit(1);
    }
}
