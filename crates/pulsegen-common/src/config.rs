//! Configuration structures for the pulse generator runtime.
//!
//! Supports TOML deserialization with working defaults for the
//! reference deployments and explicit values for production use.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Identity of a signal channel, unique within a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u8);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drive profile selecting the per-cycle output policy of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelProfile {
    /// Explicit active/inactive drive with drift-compensated sleep.
    #[default]
    Pulse,
    /// Free-running toggle: outputs flip every cycle, sleep is exactly
    /// the nominal period, no gate and no compensation.
    Toggle,
}

impl fmt::Display for ChannelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pulse => write!(f, "pulse"),
            Self::Toggle => write!(f, "toggle"),
        }
    }
}

/// Per-channel configuration: identity, timing, lines, and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel identity carried in every telemetry event.
    pub id: ChannelId,

    /// Nominal cycle period.
    #[serde(with = "humantime_serde")]
    pub period: Duration,

    /// Active-phase duration; must not exceed `period`.
    #[serde(with = "humantime_serde")]
    pub active: Duration,

    /// Primary output line, owned exclusively by this channel.
    pub primary: String,

    /// Secondary output line, owned exclusively by this channel.
    pub secondary: String,

    /// Drive profile.
    #[serde(default)]
    pub profile: ChannelProfile,

    /// Serialize the active phase through the shared gate.
    /// Only meaningful for the pulse profile.
    #[serde(default)]
    pub gated: bool,

    /// Static SCHED_FIFO priority (1-99, higher preempts) for this
    /// channel's thread. Applied only when real-time mode is enabled.
    #[serde(default)]
    pub rt_priority: Option<u8>,
}

impl ChannelConfig {
    fn new(
        id: u8,
        period_ms: u64,
        active_ms: u64,
        profile: ChannelProfile,
        gated: bool,
        rt_priority: u8,
    ) -> Self {
        Self {
            id: ChannelId(id),
            period: Duration::from_millis(period_ms),
            active: Duration::from_millis(active_ms),
            primary: format!("led{id}"),
            secondary: format!("trig{id}"),
            profile,
            gated,
            rt_priority: Some(rt_priority),
        }
    }
}

/// Real-time scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Enable real-time scheduling (requires privileges).
    pub enabled: bool,

    /// Scheduler policy for channel and reporter threads.
    pub policy: SchedPolicy,

    /// Lock all memory pages (mlockall).
    pub lock_memory: bool,

    /// Pre-fault stack size in bytes.
    pub prefault_stack_size: usize,

    /// Fail at startup if real-time requirements cannot be met.
    /// When false, missing privileges degrade to a logged warning.
    pub fail_fast: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            policy: SchedPolicy::Fifo,
            lock_memory: true,
            prefault_stack_size: 8 * 1024 * 1024, // 8 MiB
            fail_fast: false,
        }
    }
}

/// Scheduler policy for real-time threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    /// SCHED_FIFO: first-in-first-out real-time.
    #[default]
    Fifo,
    /// SCHED_RR: round-robin real-time.
    Rr,
    /// SCHED_OTHER: normal time-sharing (non-RT).
    Other,
}

/// Reporter task configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Static SCHED_FIFO priority for the reporter thread. Must stay
    /// below every channel priority so producers are never starved by
    /// the consumer.
    pub rt_priority: Option<u8>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            rt_priority: Some(5),
        }
    }
}

/// Metrics collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable per-channel cycle metrics.
    pub enabled: bool,

    /// Size of each channel's work-time ring buffer.
    pub histogram_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_size: 1024,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Signal channels, one cyclic task each.
    #[serde(rename = "channel")]
    pub channels: Vec<ChannelConfig>,

    /// Real-time configuration.
    pub realtime: RealtimeConfig,

    /// Reporter configuration.
    pub reporter: ReporterConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::pulse_deployment()
    }
}

impl RuntimeConfig {
    /// Reference pulse deployment: three gated channels with distinct
    /// periods (200/500/1000 ms) and short active phases, channel 0 at
    /// the highest priority.
    #[must_use]
    pub fn pulse_deployment() -> Self {
        Self {
            channels: vec![
                ChannelConfig::new(0, 200, 25, ChannelProfile::Pulse, true, 12),
                ChannelConfig::new(1, 500, 100, ChannelProfile::Pulse, true, 11),
                ChannelConfig::new(2, 1000, 200, ChannelProfile::Pulse, true, 10),
            ],
            realtime: RealtimeConfig::default(),
            reporter: ReporterConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    /// Reference toggle deployment: three free-running channels with
    /// 50% duty cadence and no gate.
    #[must_use]
    pub fn toggle_deployment() -> Self {
        Self {
            channels: vec![
                ChannelConfig::new(0, 200, 100, ChannelProfile::Toggle, false, 12),
                ChannelConfig::new(1, 500, 250, ChannelProfile::Toggle, false, 11),
                ChannelConfig::new(2, 1000, 500, ChannelProfile::Toggle, false, 10),
            ],
            realtime: RealtimeConfig::default(),
            reporter: ReporterConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate deployment invariants: at least one channel, unique
    /// identities, exclusively owned lines, active phases within the
    /// period, priorities in the scheduler's range, no gated toggles.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::Invalid("no channels configured".into()));
        }

        let mut ids = std::collections::HashSet::new();
        let mut lines = std::collections::HashSet::new();

        for ch in &self.channels {
            if !ids.insert(ch.id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate channel id {}",
                    ch.id
                )));
            }
            for line in [&ch.primary, &ch.secondary] {
                if line.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "channel {}: empty line name",
                        ch.id
                    )));
                }
                if !lines.insert(line.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "line '{line}' assigned to more than one channel"
                    )));
                }
            }
            if ch.period.is_zero() {
                return Err(ConfigError::Invalid(format!(
                    "channel {}: period must be nonzero",
                    ch.id
                )));
            }
            if ch.active > ch.period {
                return Err(ConfigError::Invalid(format!(
                    "channel {}: active phase {} exceeds period {}",
                    ch.id,
                    humantime::format_duration(ch.active),
                    humantime::format_duration(ch.period)
                )));
            }
            if ch.profile == ChannelProfile::Toggle && ch.gated {
                return Err(ConfigError::Invalid(format!(
                    "channel {}: toggle profile cannot participate in the gate",
                    ch.id
                )));
            }
            if let Some(prio) = ch.rt_priority {
                if !(1..=99).contains(&prio) {
                    return Err(ConfigError::Invalid(format!(
                        "channel {}: rt_priority {prio} outside 1-99",
                        ch.id
                    )));
                }
            }
        }

        if let Some(prio) = self.reporter.rt_priority {
            if !(1..=99).contains(&prio) {
                return Err(ConfigError::Invalid(format!(
                    "reporter rt_priority {prio} outside 1-99"
                )));
            }
            let min_channel = self
                .channels
                .iter()
                .filter_map(|c| c.rt_priority)
                .min()
                .unwrap_or(u8::MAX);
            if prio >= min_channel {
                return Err(ConfigError::Invalid(format!(
                    "reporter rt_priority {prio} not below the lowest channel priority {min_channel}"
                )));
            }
        }

        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A deployment invariant does not hold.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
