//! The periodic signal task.
//!
//! One task per configured channel, each on its own thread. Startup
//! probes and configures the channel's two output lines; failures there
//! are fatal for this task alone. The steady-state loop then runs
//! without an error path until a cooperative stop:
//!
//! - **pulse profile**: drive active, optionally inside the gate, hold
//!   for the active duration, drive inactive, emit one event, then
//!   sleep the rest of the nominal period. The idle sleep is
//!   drift-compensated and clamps at zero when a cycle's work already
//!   consumed the period.
//! - **toggle profile**: flip the outputs every cycle, emit one event,
//!   and sleep exactly the nominal period.

use crate::gate::Gate;
use crate::shutdown::Shutdown;
use crate::telemetry::{TelemetryEvent, TelemetrySender};
use pulsegen_common::{
    ChannelConfig, ChannelProfile, CycleMetrics, MetricsSnapshot, PulseError, PulseResult,
    StateMachine, TaskState,
};
use pulsegen_hal::{Clock, DigitalOutput};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Idle budget left in a cycle: the nominal period minus the work
/// already done, clamped at zero. Never negative.
#[must_use]
pub fn remaining_sleep(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Final report returned from a task's thread.
#[derive(Debug)]
pub struct TaskReport {
    /// Channel this task drove.
    pub channel: pulsegen_common::ChannelId,
    /// Terminal lifecycle state.
    pub state: TaskState,
    /// Completed cycles.
    pub cycles: u64,
    /// Startup error, for `Failed` reports.
    pub error: Option<PulseError>,
    /// Cycle metrics, when collected.
    pub metrics: Option<MetricsSnapshot>,
}

/// A periodic signal task, ready to run on a dedicated thread.
pub struct SignalTask {
    config: ChannelConfig,
    primary: Box<dyn DigitalOutput>,
    secondary: Box<dyn DigitalOutput>,
    clock: Arc<dyn Clock>,
    gate: Option<Arc<Gate>>,
    telemetry: TelemetrySender,
    shutdown: Shutdown,
    cycle_limit: Option<u64>,
    metrics: Option<CycleMetrics>,
    state: StateMachine,
    seq: u64,
}

impl fmt::Debug for SignalTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Line and clock handles are trait objects without `Debug`.
        f.debug_struct("SignalTask")
            .field("config", &self.config)
            .field("gated", &self.gate.is_some())
            .field("cycle_limit", &self.cycle_limit)
            .field("state", &self.state)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl SignalTask {
    /// Start building a task for `config`.
    #[must_use]
    pub fn builder(config: ChannelConfig) -> SignalTaskBuilder {
        SignalTaskBuilder {
            config,
            primary: None,
            secondary: None,
            clock: None,
            gate: None,
            telemetry: None,
            shutdown: Shutdown::new(),
            cycle_limit: None,
            metrics_capacity: None,
        }
    }

    /// Run the task to completion and return its final report.
    ///
    /// Intended as the body of a dedicated thread; consumes the task.
    pub fn run(mut self) -> TaskReport {
        if self.shutdown.is_requested() {
            info!(channel = %self.config.id, "stop requested before start");
            self.enter(TaskState::Stopped);
            return self.report(None);
        }

        if let Err(e) = self.start_lines() {
            error!(channel = %self.config.id, error = %e, "task startup failed");
            self.enter(TaskState::Failed);
            return self.report(Some(e));
        }

        self.enter(TaskState::Running);
        info!(
            channel = %self.config.id,
            profile = %self.config.profile,
            period_ms = self.config.period.as_millis() as u64,
            active_ms = self.config.active.as_millis() as u64,
            gated = self.gate.is_some(),
            "signal task running"
        );

        match self.config.profile {
            ChannelProfile::Pulse => self.run_pulse(),
            ChannelProfile::Toggle => self.run_toggle(),
        }

        self.enter(TaskState::Stopped);
        info!(channel = %self.config.id, cycles = self.seq, "signal task stopped");
        self.report(None)
    }

    /// Probe readiness of both lines, then configure them as outputs
    /// driven inactive. Any failure here is fatal for this task.
    fn start_lines(&mut self) -> PulseResult<()> {
        for line in [&self.primary, &self.secondary] {
            if !line.is_ready() {
                return Err(PulseError::DeviceNotReady {
                    line: line.name().to_string(),
                });
            }
        }
        self.primary.configure()?;
        self.secondary.configure()?;
        self.primary.set(false);
        self.secondary.set(false);
        Ok(())
    }

    fn run_pulse(&mut self) {
        while !self.should_stop() {
            let start = self.clock.now();

            self.primary.set(true);
            self.secondary.set(true);

            // The gate covers only the active-phase hold; it is
            // released before the lines drop and never spans the
            // idle sleep.
            match self.gate.as_deref() {
                Some(gate) => {
                    let held = gate.acquire();
                    self.clock.sleep(self.config.active);
                    drop(held);
                }
                None => self.clock.sleep(self.config.active),
            }

            self.primary.set(false);
            self.secondary.set(false);

            let seq = self.seq;
            self.seq += 1;
            self.telemetry.send(TelemetryEvent {
                channel: self.config.id,
                seq,
                at: self.clock.now(),
            });

            let elapsed = self.clock.now().saturating_sub(start);
            let sleep = remaining_sleep(self.config.period, elapsed);
            if let Some(metrics) = &mut self.metrics {
                metrics.record(elapsed);
            }
            debug!(
                channel = %self.config.id,
                seq,
                elapsed_ms = elapsed.as_millis() as u64,
                sleep_ms = sleep.as_millis() as u64,
                "cycle complete"
            );

            if !sleep.is_zero() {
                self.clock.sleep(sleep);
            }
        }
    }

    fn run_toggle(&mut self) {
        while !self.should_stop() {
            self.primary.set(self.seq % 2 == 1);
            self.secondary.toggle();

            let seq = self.seq;
            self.seq += 1;
            self.telemetry.send(TelemetryEvent {
                channel: self.config.id,
                seq,
                at: self.clock.now(),
            });

            self.clock.sleep(self.config.period);
        }
    }

    fn should_stop(&self) -> bool {
        self.shutdown.is_requested() || self.cycle_limit.is_some_and(|limit| self.seq >= limit)
    }

    fn enter(&mut self, target: TaskState) {
        if let Err(e) = self.state.transition(target) {
            debug!(channel = %self.config.id, error = %e, "lifecycle bookkeeping out of step");
        }
    }

    fn report(&self, error: Option<PulseError>) -> TaskReport {
        TaskReport {
            channel: self.config.id,
            state: self.state.state(),
            cycles: self.seq,
            error,
            metrics: self.metrics.as_ref().map(CycleMetrics::snapshot),
        }
    }
}

/// Builder for a [`SignalTask`].
pub struct SignalTaskBuilder {
    config: ChannelConfig,
    primary: Option<Box<dyn DigitalOutput>>,
    secondary: Option<Box<dyn DigitalOutput>>,
    clock: Option<Arc<dyn Clock>>,
    gate: Option<Arc<Gate>>,
    telemetry: Option<TelemetrySender>,
    shutdown: Shutdown,
    cycle_limit: Option<u64>,
    metrics_capacity: Option<usize>,
}

impl SignalTaskBuilder {
    /// Set the primary output line.
    #[must_use]
    pub fn primary(mut self, line: Box<dyn DigitalOutput>) -> Self {
        self.primary = Some(line);
        self
    }

    /// Set the secondary output line.
    #[must_use]
    pub fn secondary(mut self, line: Box<dyn DigitalOutput>) -> Self {
        self.secondary = Some(line);
        self
    }

    /// Set the clock the task times itself against.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share the mutual exclusion gate with this task.
    #[must_use]
    pub fn gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Set the telemetry producer handle.
    #[must_use]
    pub fn telemetry(mut self, sender: TelemetrySender) -> Self {
        self.telemetry = Some(sender);
        self
    }

    /// Share the cooperative stop token.
    #[must_use]
    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Bound the task to `limit` cycles. Unbounded when unset.
    #[must_use]
    pub fn cycle_limit(mut self, limit: u64) -> Self {
        self.cycle_limit = Some(limit);
        self
    }

    /// Collect cycle metrics with the given ring size. Only the pulse
    /// profile measures work time, so toggle tasks stay unmetered.
    #[must_use]
    pub fn metrics_capacity(mut self, capacity: usize) -> Self {
        self.metrics_capacity = Some(capacity);
        self
    }

    /// Build the task.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::Config`] when a required collaborator is
    /// missing, or when the channel is gated but no gate was shared.
    pub fn build(self) -> PulseResult<SignalTask> {
        let id = self.config.id;
        let missing = |what: &str| PulseError::Config(format!("channel {id}: {what} not provided"));

        if self.config.gated && self.gate.is_none() {
            return Err(PulseError::Config(format!(
                "channel {id}: gated but no gate shared"
            )));
        }

        let metrics = self
            .metrics_capacity
            .filter(|_| self.config.profile == ChannelProfile::Pulse)
            .map(|capacity| CycleMetrics::new(capacity, self.config.period));

        Ok(SignalTask {
            primary: self.primary.ok_or_else(|| missing("primary line"))?,
            secondary: self.secondary.ok_or_else(|| missing("secondary line"))?,
            clock: self.clock.ok_or_else(|| missing("clock"))?,
            gate: if self.config.gated { self.gate } else { None },
            telemetry: self.telemetry.ok_or_else(|| missing("telemetry sender"))?,
            shutdown: self.shutdown,
            cycle_limit: self.cycle_limit,
            metrics,
            state: StateMachine::new(),
            seq: 0,
            config: self.config,
        })
    }
}
