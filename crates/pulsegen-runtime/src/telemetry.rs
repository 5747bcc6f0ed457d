//! Telemetry channel between signal tasks and the reporter.
//!
//! A thin ownership wrapper around `std::sync::mpsc`: the channel is
//! unbounded, so a producer's push never blocks and never drops, and a
//! consumer's pop parks the thread without busy-waiting. Events are
//! small owned values; pushing performs no per-event allocation beyond
//! the channel's own storage.
//!
//! Ordering: events from one producer arrive in emission order.
//! Interleaving across producers is unspecified.

use pulsegen_common::{ChannelId, PulseError, PulseResult};
use std::fmt;
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::time::Duration;
use tracing::trace;

/// One per-cycle event from a signal task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryEvent {
    /// Source channel.
    pub channel: ChannelId,
    /// Per-channel cycle counter: starts at 0, increments by exactly
    /// one per cycle, never resets.
    pub seq: u64,
    /// Source clock reading at emission.
    pub at: Duration,
}

impl fmt::Display for TelemetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel {} cycle {} at {}ms",
            self.channel,
            self.seq,
            self.at.as_millis()
        )
    }
}

/// Create a connected producer/consumer pair.
#[must_use]
pub fn channel() -> (TelemetrySender, TelemetryReceiver) {
    let (sender, receiver) = mpsc::channel();
    (TelemetrySender { sender }, TelemetryReceiver { receiver })
}

/// Cloneable producer handle; one clone per signal task.
#[derive(Debug, Clone)]
pub struct TelemetrySender {
    sender: mpsc::Sender<TelemetryEvent>,
}

impl TelemetrySender {
    /// Push one event. Never blocks.
    ///
    /// A push can only fail once the consumer is gone, which happens
    /// during teardown; such events are dropped with a trace record.
    pub fn send(&self, event: TelemetryEvent) {
        if self.sender.send(event).is_err() {
            trace!(channel = %event.channel, seq = event.seq, "event dropped at teardown");
        }
    }
}

/// Consuming handle held by the reporter.
#[derive(Debug)]
pub struct TelemetryReceiver {
    receiver: mpsc::Receiver<TelemetryEvent>,
}

impl TelemetryReceiver {
    /// Block until an event arrives.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::ChannelClosed`] once every producer is
    /// gone and the backlog is drained.
    pub fn recv(&mut self) -> PulseResult<TelemetryEvent> {
        self.receiver.recv().map_err(|_| PulseError::ChannelClosed)
    }

    /// Block up to `timeout` for an event; `Ok(None)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::ChannelClosed`] once every producer is
    /// gone and the backlog is drained.
    pub fn recv_timeout(&mut self, timeout: Duration) -> PulseResult<Option<TelemetryEvent>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PulseError::ChannelClosed),
        }
    }

    /// Non-blocking pop; `Ok(None)` when the channel is empty but
    /// producers remain connected.
    ///
    /// # Errors
    ///
    /// Returns [`PulseError::ChannelClosed`] once every producer is
    /// gone and the backlog is drained.
    pub fn try_recv(&mut self) -> PulseResult<Option<TelemetryEvent>> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PulseError::ChannelClosed),
        }
    }
}
