//! Per-task cycle metrics.
//!
//! Tracks cycle work times in a fixed ring buffer so a running task
//! never allocates while recording. A cycle whose work time reaches the
//! nominal period leaves no idle budget; the compensated sleep clamps
//! to zero and the cycle is counted as clamped.

use std::time::Duration;

/// Cycle metrics with a ring buffer of recent work times.
#[derive(Debug)]
pub struct CycleMetrics {
    /// Ring buffer of cycle work times in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples collected (saturates at buffer size).
    sample_count: usize,
    /// Total cycles executed.
    total_cycles: u64,
    /// Minimum observed work time in nanoseconds.
    min_ns: u64,
    /// Maximum observed work time in nanoseconds.
    max_ns: u64,
    /// Sum of all work times for mean calculation.
    sum_ns: u64,
    /// Cycles whose compensated sleep clamped to zero.
    clamped_count: u64,
    /// Nominal task period in nanoseconds.
    period_ns: u64,
}

impl CycleMetrics {
    /// Create a new metrics collector.
    ///
    /// # Arguments
    ///
    /// * `histogram_size` - Number of samples to retain in the ring buffer.
    /// * `period` - Nominal task period; work times reaching it count as clamped.
    #[must_use]
    pub fn new(histogram_size: usize, period: Duration) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_cycles: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            clamped_count: 0,
            period_ns: period.as_nanos() as u64,
        }
    }

    /// Record one cycle's work time (everything before the idle sleep).
    ///
    /// Allocation-free; safe to call from the task loop.
    pub fn record(&mut self, work: Duration) {
        let ns = work.as_nanos() as u64;

        self.samples[self.write_pos] = ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_cycles += 1;
        self.min_ns = self.min_ns.min(ns);
        self.max_ns = self.max_ns.max(ns);
        self.sum_ns = self.sum_ns.wrapping_add(ns);

        if ns >= self.period_ns {
            self.clamped_count += 1;
        }
    }

    /// Get total number of cycles executed.
    #[must_use]
    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    /// Get minimum observed work time.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        if self.total_cycles > 0 {
            Some(Duration::from_nanos(self.min_ns))
        } else {
            None
        }
    }

    /// Get maximum observed work time.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        if self.total_cycles > 0 {
            Some(Duration::from_nanos(self.max_ns))
        } else {
            None
        }
    }

    /// Get mean work time.
    #[must_use]
    pub fn mean(&self) -> Option<Duration> {
        if self.total_cycles > 0 {
            Some(Duration::from_nanos(self.sum_ns / self.total_cycles))
        } else {
            None
        }
    }

    /// Get number of cycles whose sleep clamped to zero.
    #[must_use]
    pub fn clamped_count(&self) -> u64 {
        self.clamped_count
    }

    /// Compute a percentile from the ring buffer.
    ///
    /// Returns `None` if no samples have been collected or if
    /// `percentile` is outside 0.0..=100.0.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 {
            return None;
        }
        if !(0.0..=100.0).contains(&percentile) || percentile.is_nan() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();

        let idx = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        let idx = idx.min(sorted.len() - 1);

        Some(Duration::from_nanos(sorted[idx]))
    }

    /// Get a snapshot of current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_cycles: self.total_cycles,
            min_ns: if self.total_cycles > 0 {
                Some(self.min_ns)
            } else {
                None
            },
            max_ns: if self.total_cycles > 0 {
                Some(self.max_ns)
            } else {
                None
            },
            mean_ns: if self.total_cycles > 0 {
                Some(self.sum_ns / self.total_cycles)
            } else {
                None
            },
            clamped_count: self.clamped_count,
            sample_count: self.sample_count,
        }
    }
}

/// Immutable snapshot of metrics for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Total cycles executed.
    pub total_cycles: u64,
    /// Minimum work time in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum work time in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean work time in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Cycles whose sleep clamped to zero.
    pub clamped_count: u64,
    /// Number of samples in the histogram.
    pub sample_count: usize,
}

impl MetricsSnapshot {
    /// Get jitter (max - min) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
