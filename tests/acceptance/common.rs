//! Common utilities for integration tests.
//!
//! Deployment builders for simulated end-to-end runs, plus real-time
//! prerequisite checks for the privileged tests.

#![allow(dead_code)] // Some helpers serve only the ignored RT tests

use pulsegen_common::{
    ChannelConfig, ChannelId, ChannelProfile, MetricsConfig, RealtimeConfig, ReporterConfig,
    RuntimeConfig,
};
use pulsegen_hal::SimBank;
use pulsegen_runtime::{Runtime, RuntimeSummary};
use std::time::Duration;

/// A pulse channel with line names derived from its id.
pub fn pulse_channel(id: u8, period_ms: u64, active_ms: u64, gated: bool) -> ChannelConfig {
    ChannelConfig {
        id: ChannelId(id),
        period: Duration::from_millis(period_ms),
        active: Duration::from_millis(active_ms),
        primary: format!("led{id}"),
        secondary: format!("trig{id}"),
        profile: ChannelProfile::Pulse,
        gated,
        rt_priority: None,
    }
}

/// A free-running toggle channel.
pub fn toggle_channel(id: u8, period_ms: u64, active_ms: u64) -> ChannelConfig {
    ChannelConfig {
        profile: ChannelProfile::Toggle,
        ..pulse_channel(id, period_ms, active_ms, false)
    }
}

/// A deployment with real-time scheduling off and small histograms.
pub fn deployment(channels: Vec<ChannelConfig>) -> RuntimeConfig {
    RuntimeConfig {
        channels,
        realtime: RealtimeConfig::default(),
        reporter: ReporterConfig::default(),
        metrics: MetricsConfig {
            enabled: true,
            histogram_size: 128,
        },
    }
}

/// Run a deployment on `bank` for a fixed cycle budget and join it.
pub fn run_bounded(config: RuntimeConfig, bank: &SimBank, cycles: u64) -> RuntimeSummary {
    Runtime::builder(config)
        .max_cycles(cycles)
        .build()
        .start(bank)
        .expect("runtime failed to start")
        .join()
}

/// Check if running as root (required for RT priority tests).
pub fn is_root() -> bool {
    // SAFETY: geteuid never fails.
    unsafe { libc::geteuid() == 0 }
}

/// Check if the system has a PREEMPT_RT kernel.
pub fn has_preempt_rt() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|v| v.contains("PREEMPT_RT") || v.contains("PREEMPT RT"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_deployment_builders_validate() {
        let config = deployment(vec![
            pulse_channel(0, 200, 25, true),
            toggle_channel(1, 500, 250),
        ]);
        config.validate().unwrap();
    }

    #[test]
    fn test_config_file_round_trip() {
        let config = deployment(vec![pulse_channel(0, 200, 25, true)]);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config.to_toml().unwrap().as_bytes()).unwrap();

        let loaded = RuntimeConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded.channels.len(), 1);
        assert_eq!(loaded.channels[0].period, Duration::from_millis(200));
        assert_eq!(loaded.channels[0].primary, "led0");
        assert!(loaded.channels[0].gated);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let err = RuntimeConfig::from_file(std::path::Path::new("/nonexistent/pulsegen.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }
}
