use thiserror::Error;

/// Errors raised by pulsegen components: startup line failures,
/// configuration problems, and lifecycle violations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PulseError {
    /// An output line failed its readiness probe during task startup.
    #[error("device not ready: line '{line}'")]
    DeviceNotReady {
        /// Name of the line that failed the probe.
        line: String,
    },

    /// The platform rejected configuring a line as an output.
    #[error("output configuration rejected for line '{line}': {reason}")]
    LineConfig {
        /// Name of the rejected line.
        line: String,
        /// Platform-reported reason.
        reason: String,
    },

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid lifecycle transition attempted.
    #[error("invalid task transition from {from} to {to}")]
    InvalidTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// The telemetry channel has no live peer on the other side.
    #[error("telemetry channel closed")]
    ChannelClosed,
}

/// Convenience type alias for pulsegen operations.
pub type PulseResult<T> = Result<T, PulseError>;
