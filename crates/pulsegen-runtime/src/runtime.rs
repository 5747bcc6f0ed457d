//! Runtime orchestration.
//!
//! Validates a deployment, claims its output lines, and spawns one
//! named thread per channel plus the reporter. All gated channels
//! share one gate; every task shares one shutdown token and one
//! producer handle onto the telemetry channel. The orchestrator drops
//! its own producer handle after spawning, so the channel closes and
//! the reporter drains out exactly when the last task has stopped.

use crate::gate::Gate;
use crate::realtime;
use crate::reporter::{Reporter, ReporterReport};
use crate::shutdown::Shutdown;
use crate::signal::{SignalTask, TaskReport};
use crate::telemetry::{self, TelemetrySender};
use pulsegen_common::{
    ChannelConfig, ChannelId, PulseError, PulseResult, RealtimeConfig, RuntimeConfig, TaskState,
};
use pulsegen_hal::{Clock, LineBank, MonotonicClock};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{error, info};

/// A validated deployment, ready to start.
pub struct Runtime {
    config: RuntimeConfig,
    clock: Arc<dyn Clock>,
    shutdown: Shutdown,
    max_cycles: Option<u64>,
}

impl Runtime {
    /// Start building a runtime for `config`.
    #[must_use]
    pub fn builder(config: RuntimeConfig) -> RuntimeBuilder {
        RuntimeBuilder {
            config,
            clock: None,
            shutdown: None,
            max_cycles: None,
        }
    }

    /// Validate the deployment, claim lines from `bank`, and spawn
    /// every channel task plus the reporter.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or a thread
    /// fails to spawn. Tasks already spawned are stopped and joined
    /// before the error is returned.
    pub fn start(self, bank: &dyn LineBank) -> PulseResult<RuntimeHandle> {
        let Self {
            config,
            clock,
            shutdown,
            max_cycles,
        } = self;

        config
            .validate()
            .map_err(|e| PulseError::Config(e.to_string()))?;

        let gate = Arc::new(Gate::new());
        let (sender, receiver) = telemetry::channel();

        let reporter = {
            let rt = config.realtime.clone();
            let priority = config.reporter.rt_priority;
            std::thread::Builder::new()
                .name("pulsegen-reporter".to_string())
                .spawn(move || {
                    set_thread_priority(&rt, priority);
                    Reporter::new(receiver).run()
                })
                .map_err(|e| PulseError::Config(format!("reporter thread spawn failed: {e}")))?
        };

        let mut tasks: Vec<(ChannelId, JoinHandle<TaskReport>)> =
            Vec::with_capacity(config.channels.len());
        for ch in &config.channels {
            match spawn_channel(ch, &config, bank, &clock, &gate, &sender, &shutdown, max_cycles) {
                Ok(handle) => tasks.push((ch.id, handle)),
                Err(e) => {
                    error!(channel = %ch.id, error = %e, "channel spawn failed, aborting startup");
                    shutdown.request();
                    drop(sender);
                    for (_, handle) in tasks {
                        let _ = handle.join();
                    }
                    let _ = reporter.join();
                    return Err(e);
                }
            }
        }
        drop(sender);

        info!(channels = tasks.len(), "runtime started");
        Ok(RuntimeHandle {
            shutdown,
            tasks,
            reporter,
        })
    }
}

/// Builder for a [`Runtime`].
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    clock: Option<Arc<dyn Clock>>,
    shutdown: Option<Shutdown>,
    max_cycles: Option<u64>,
}

impl RuntimeBuilder {
    /// Time all tasks against `clock` instead of the monotonic default.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an externally owned stop token, so signal handlers set up
    /// before the runtime can request the stop.
    #[must_use]
    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Stop every task after `limit` cycles. Unbounded when unset.
    #[must_use]
    pub fn max_cycles(mut self, limit: u64) -> Self {
        self.max_cycles = Some(limit);
        self
    }

    /// Build the runtime.
    #[must_use]
    pub fn build(self) -> Runtime {
        Runtime {
            config: self.config,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            shutdown: self.shutdown.unwrap_or_default(),
            max_cycles: self.max_cycles,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_channel(
    ch: &ChannelConfig,
    config: &RuntimeConfig,
    bank: &dyn LineBank,
    clock: &Arc<dyn Clock>,
    gate: &Arc<Gate>,
    sender: &TelemetrySender,
    shutdown: &Shutdown,
    max_cycles: Option<u64>,
) -> PulseResult<JoinHandle<TaskReport>> {
    let mut builder = SignalTask::builder(ch.clone())
        .primary(bank.claim(&ch.primary))
        .secondary(bank.claim(&ch.secondary))
        .clock(Arc::clone(clock))
        .telemetry(sender.clone())
        .shutdown(shutdown.clone());
    if ch.gated {
        builder = builder.gate(Arc::clone(gate));
    }
    if let Some(limit) = max_cycles {
        builder = builder.cycle_limit(limit);
    }
    if config.metrics.enabled {
        builder = builder.metrics_capacity(config.metrics.histogram_size);
    }
    let task = builder.build()?;

    let rt = config.realtime.clone();
    let priority = ch.rt_priority;
    std::thread::Builder::new()
        .name(format!("pulsegen-ch{}", ch.id))
        .spawn(move || {
            set_thread_priority(&rt, priority);
            task.run()
        })
        .map_err(|e| PulseError::Config(format!("channel {} thread spawn failed: {e}", ch.id)))
}

/// Apply the calling thread's static priority when real-time mode is
/// on. Failures other than missing privileges are logged, never fatal:
/// the thread keeps running at default priority.
fn set_thread_priority(rt: &RealtimeConfig, priority: Option<u8>) {
    if !rt.enabled {
        return;
    }
    let Some(priority) = priority else { return };
    if let Err(e) = realtime::apply_thread_priority(rt.policy, priority) {
        error!(error = %e, "thread priority not applied");
    }
}

/// Handle onto a started runtime.
#[derive(Debug)]
pub struct RuntimeHandle {
    shutdown: Shutdown,
    tasks: Vec<(ChannelId, JoinHandle<TaskReport>)>,
    reporter: JoinHandle<ReporterReport>,
}

impl RuntimeHandle {
    /// Request a cooperative stop of every task.
    pub fn request_stop(&self) {
        info!("stop requested");
        self.shutdown.request();
    }

    /// The stop token shared by every task.
    #[must_use]
    pub fn shutdown_token(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Number of channel tasks running under this handle.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.tasks.len()
    }

    /// Wait for every task and the reporter to finish.
    ///
    /// Blocks until all tasks have stopped; call [`Self::request_stop`]
    /// first unless the runtime was built with a cycle limit. A
    /// panicked thread is reported as a failed task rather than
    /// propagating the panic.
    #[must_use]
    pub fn join(self) -> RuntimeSummary {
        let mut reports = Vec::with_capacity(self.tasks.len());
        for (id, handle) in self.tasks {
            match handle.join() {
                Ok(report) => reports.push(report),
                Err(_) => {
                    error!(channel = %id, "channel thread panicked");
                    reports.push(TaskReport {
                        channel: id,
                        state: TaskState::Failed,
                        cycles: 0,
                        error: Some(PulseError::Config(format!(
                            "channel {id} thread panicked"
                        ))),
                        metrics: None,
                    });
                }
            }
        }

        // Every producer handle is gone once the tasks are joined, so
        // the reporter drains the backlog and exits on its own.
        let reporter = match self.reporter.join() {
            Ok(report) => report,
            Err(_) => {
                error!("reporter thread panicked");
                ReporterReport::default()
            }
        };

        RuntimeSummary {
            tasks: reports,
            reporter,
        }
    }
}

/// Aggregated end-of-run reports.
#[derive(Debug)]
pub struct RuntimeSummary {
    /// Per-channel task reports, in configuration order.
    pub tasks: Vec<TaskReport>,
    /// What the reporter drained.
    pub reporter: ReporterReport,
}

impl RuntimeSummary {
    /// Total cycles across all channels.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.tasks.iter().map(|t| t.cycles).sum()
    }

    /// Channels that failed at startup.
    #[must_use]
    pub fn failed_channels(&self) -> Vec<ChannelId> {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Failed)
            .map(|t| t.channel)
            .collect()
    }
}
