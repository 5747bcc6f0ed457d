//! Pulsegen daemon entry point.
//!
//! Loads a deployment, initializes the process for real-time
//! execution, and runs the channel tasks and reporter until a signal
//! or cycle limit stops them.

mod signals;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use pulsegen_common::RuntimeConfig;
use pulsegen_hal::SimBank;
use pulsegen_runtime::{realtime, Runtime, Shutdown};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::signals::SignalHandler;

/// Pulsegen daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "pulsegen-daemon",
    about = "Periodic signal generator - drives paired output lines at fixed periods",
    version,
    long_about = None
)]
struct Args {
    /// Path to a runtime configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Built-in deployment used when no config file is found.
    #[arg(long, value_enum, default_value_t = Deployment::Pulse)]
    deployment: Deployment,

    /// Maximum cycles per channel (0 = unbounded).
    #[arg(long, default_value = "0")]
    max_cycles: u64,

    /// Disable real-time scheduling regardless of configuration.
    #[arg(long)]
    no_realtime: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

/// Built-in deployments.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Deployment {
    /// Three gated pulse channels at 200/500/1000 ms.
    Pulse,
    /// Three free-running toggle channels at 200/500/1000 ms.
    Toggle,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting pulsegen daemon");

    let mut config = load_config(&args)?;

    if args.no_realtime {
        config.realtime.enabled = false;
    }

    if args.print_config {
        let toml = config.to_toml().context("failed to render configuration")?;
        println!("{toml}");
        return Ok(());
    }

    info!(
        channels = config.channels.len(),
        realtime = config.realtime.enabled,
        "configuration loaded"
    );

    let shutdown = Shutdown::new();
    let signal_handler =
        SignalHandler::install(shutdown.clone()).context("failed to set up signal handlers")?;

    run_daemon(config, shutdown, &signal_handler, args.max_cycles)
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "pulsegen_daemon={level},pulsegen_runtime={level},pulsegen_hal={level},pulsegen_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_names(true)
        .init();
}

/// Load configuration from file or use a built-in deployment.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `PULSEGEN_CONFIG_PATH` environment variable
/// 3. `/etc/pulsegen/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in deployment selected by `--deployment`
fn load_config(args: &Args) -> Result<RuntimeConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "loading config from command-line argument");
        return RuntimeConfig::from_file(config_path)
            .with_context(|| format!("failed to load config from {config_path:?}"));
    }

    if let Ok(env_path) = std::env::var("PULSEGEN_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "loading config from PULSEGEN_CONFIG_PATH");
            return RuntimeConfig::from_file(&config_path).with_context(|| {
                format!("failed to load config from PULSEGEN_CONFIG_PATH={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "PULSEGEN_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    let system_path = PathBuf::from("/etc/pulsegen/config.toml");
    if system_path.exists() {
        info!(?system_path, "loading config from system path");
        return RuntimeConfig::from_file(&system_path)
            .with_context(|| format!("failed to load config from {system_path:?}"));
    }

    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "loading config from local path");
        return RuntimeConfig::from_file(&local_path)
            .with_context(|| format!("failed to load config from {local_path:?}"));
    }

    info!(
        deployment = ?args.deployment,
        "no config file found, using built-in deployment"
    );
    Ok(match args.deployment {
        Deployment::Pulse => RuntimeConfig::pulse_deployment(),
        Deployment::Toggle => RuntimeConfig::toggle_deployment(),
    })
}

/// Run the deployment to completion and log the end-of-run summary.
fn run_daemon(
    config: RuntimeConfig,
    shutdown: Shutdown,
    signal_handler: &SignalHandler,
    max_cycles: u64,
) -> Result<()> {
    let started = Instant::now();

    // The highest priority anyone will request, for the fail_fast
    // capability check.
    let max_priority = config
        .channels
        .iter()
        .filter_map(|c| c.rt_priority)
        .chain(config.reporter.rt_priority)
        .max()
        .unwrap_or(0);
    let rt_status = realtime::init_process(&config.realtime, max_priority)
        .context("real-time initialization failed")?;

    let bank = SimBank::new();

    let mut builder = Runtime::builder(config).shutdown(shutdown);
    if max_cycles > 0 {
        builder = builder.max_cycles(max_cycles);
    }
    let handle = builder
        .build()
        .start(&bank)
        .context("runtime startup failed")?;

    info!(
        channels = handle.channel_count(),
        memory_locked = rt_status.memory_locked,
        "entering run"
    );

    let summary = handle.join();

    for report in &summary.tasks {
        match &report.metrics {
            Some(snapshot) => {
                let json = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());
                info!(
                    channel = %report.channel,
                    state = %report.state,
                    cycles = report.cycles,
                    metrics = %json,
                    "channel finished"
                );
            }
            None => info!(
                channel = %report.channel,
                state = %report.state,
                cycles = report.cycles,
                "channel finished"
            ),
        }
        if let Some(e) = &report.error {
            error!(channel = %report.channel, error = %e, "channel failed at startup");
        }
    }

    let failed = summary.failed_channels();
    let uptime = Duration::from_secs(started.elapsed().as_secs());
    info!(
        total_cycles = summary.total_cycles(),
        events = summary.reporter.events,
        failed = failed.len(),
        signals = signal_handler.signal_count(),
        uptime = %humantime::format_duration(uptime),
        "daemon shutdown complete"
    );

    if !failed.is_empty() && failed.len() == summary.tasks.len() {
        anyhow::bail!("all channels failed at startup");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["pulsegen-daemon", "--max-cycles", "5"]);
        assert_eq!(args.max_cycles, 5);
        assert!(args.config.is_none());
        assert_eq!(args.deployment, Deployment::Pulse);
    }

    #[test]
    fn test_args_with_config() {
        let args = Args::parse_from([
            "pulsegen-daemon",
            "-c",
            "test.toml",
            "--deployment",
            "toggle",
            "--no-realtime",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("test.toml")));
        assert_eq!(args.deployment, Deployment::Toggle);
        assert!(args.no_realtime);
    }

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert_eq!(config.channels.len(), 3);
        config.validate().unwrap();
    }
}
