//! Hardware abstraction plane for pulsegen.
//!
//! This crate provides:
//! - [`DigitalOutput`] trait for driving a single output line
//! - [`clock`] module with the [`Clock`] trait, the production
//!   [`MonotonicClock`], and the test-oriented [`SimClock`]
//! - [`sim`] module with the [`SimBank`] simulated line bank

pub mod clock;
pub mod sim;

pub use clock::*;
pub use sim::*;

use pulsegen_common::PulseResult;

/// A single digital output line.
///
/// Signal tasks own their lines exclusively; a line handle is never
/// shared between tasks. Readiness is probed before configuration, and
/// `set`/`toggle` are only meaningful after `configure` succeeded.
pub trait DigitalOutput: Send {
    /// Line name used in logs and errors.
    fn name(&self) -> &str;

    /// Probe whether the backing device is ready for use.
    fn is_ready(&self) -> bool;

    /// Configure the line as an output, driven inactive.
    ///
    /// # Errors
    ///
    /// Returns [`pulsegen_common::PulseError::LineConfig`] if the
    /// platform rejects the request.
    fn configure(&mut self) -> PulseResult<()>;

    /// Drive the line active (high) or inactive (low).
    fn set(&mut self, active: bool);

    /// Invert the line's current level.
    fn toggle(&mut self);
}

/// Source of line handles, keyed by configured line name.
///
/// Claiming hands out a fresh handle; exclusivity of ownership is a
/// deployment invariant (no line name appears on two channels), not
/// something the bank polices.
pub trait LineBank: Send + Sync {
    /// Claim a drive handle for the named line.
    fn claim(&self, name: &str) -> Box<dyn DigitalOutput>;
}
