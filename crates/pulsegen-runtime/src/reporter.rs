//! Telemetry reporter.
//!
//! A single consumer thread that blocks on the telemetry channel and
//! renders one log line per event. Producers never wait for it: the
//! channel is unbounded, so a slow reporter only grows the backlog.
//! The reporter exits once every producer handle is dropped and the
//! backlog is drained, which makes shutdown a plain close-and-join.

use crate::telemetry::TelemetryReceiver;
use pulsegen_common::ChannelId;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// What the reporter saw before the channel closed.
#[derive(Debug, Default)]
pub struct ReporterReport {
    /// Total events drained.
    pub events: u64,
    /// Events drained per channel.
    pub per_channel: HashMap<ChannelId, u64>,
    /// Events whose per-channel counter was not the expected next
    /// value. Always zero with healthy producers.
    pub ordering_violations: u64,
}

/// The telemetry-draining consumer.
pub struct Reporter {
    receiver: TelemetryReceiver,
}

impl Reporter {
    /// Take ownership of the consumer end of the telemetry channel.
    #[must_use]
    pub fn new(receiver: TelemetryReceiver) -> Self {
        Self { receiver }
    }

    /// Drain events until the channel closes, one log line each.
    ///
    /// Intended as the body of a dedicated thread; returns only after
    /// the last producer handle is gone and the backlog is empty.
    pub fn run(mut self) -> ReporterReport {
        let mut report = ReporterReport::default();
        let mut next_seq: HashMap<ChannelId, u64> = HashMap::new();

        while let Ok(event) = self.receiver.recv() {
            info!(
                channel = %event.channel,
                seq = event.seq,
                at_ms = event.at.as_millis() as u64,
                "cycle event"
            );
            report.events += 1;
            *report.per_channel.entry(event.channel).or_insert(0) += 1;

            let expected = next_seq.entry(event.channel).or_insert(0);
            if event.seq != *expected {
                warn!(
                    channel = %event.channel,
                    seq = event.seq,
                    expected = *expected,
                    "cycle counter out of sequence"
                );
                report.ordering_violations += 1;
            }
            *expected = event.seq + 1;
        }

        debug!(events = report.events, "telemetry channel closed, reporter exiting");
        report
    }
}
