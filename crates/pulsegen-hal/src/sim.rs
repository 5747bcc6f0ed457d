//! Simulated line bank.
//!
//! Stands in for real GPIO in tests and hardware-free deployments.
//! Each named line keeps its level and an edge counter in cache-padded
//! atomics: the owning task drives the line through its [`SimLine`]
//! handle while observers (tests, diagnostics) read levels and edge
//! counts through the bank without contending on the same cache line.
//!
//! Readiness and configuration rejection are test-controllable per
//! line so both startup failure paths can be exercised.

use crate::{DigitalOutput, LineBank};
use crossbeam_utils::CachePadded;
use pulsegen_common::{PulseError, PulseResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Shared per-line state.
#[derive(Debug, Default)]
struct LineCell {
    /// Current level; true is active.
    level: CachePadded<AtomicBool>,
    /// Number of level transitions since creation.
    edges: CachePadded<AtomicU64>,
    /// Readiness probe result. Lines start ready.
    ready: AtomicBool,
    /// When set, `configure` is rejected.
    reject_configure: AtomicBool,
    /// Set once `configure` succeeded.
    configured: AtomicBool,
}

/// A bank of simulated output lines, keyed by name.
///
/// Handles for driving are claimed with [`SimBank::line`]; observer
/// methods read the same state without a handle.
#[derive(Debug, Default)]
pub struct SimBank {
    lines: Mutex<HashMap<String, Arc<LineCell>>>,
}

impl SimBank {
    /// Create an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, name: &str) -> Arc<LineCell> {
        let mut lines = self.lines.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(lines.entry(name.to_string()).or_insert_with(|| {
            let cell = Arc::new(LineCell::default());
            cell.ready.store(true, Ordering::SeqCst);
            cell
        }))
    }

    /// Claim a drive handle for `name`, creating the line on first use.
    #[must_use]
    pub fn line(&self, name: &str) -> SimLine {
        SimLine {
            name: name.to_string(),
            cell: self.cell(name),
        }
    }

    /// Mark a line's device as ready or not ready.
    pub fn set_ready(&self, name: &str, ready: bool) {
        self.cell(name).ready.store(ready, Ordering::SeqCst);
    }

    /// Make `configure` on a line fail.
    pub fn reject_configure(&self, name: &str, reject: bool) {
        self.cell(name)
            .reject_configure
            .store(reject, Ordering::SeqCst);
    }

    /// Observe a line's current level.
    #[must_use]
    pub fn level(&self, name: &str) -> bool {
        self.cell(name).level.load(Ordering::SeqCst)
    }

    /// Observe how many level transitions a line has seen.
    #[must_use]
    pub fn edges(&self, name: &str) -> u64 {
        self.cell(name).edges.load(Ordering::SeqCst)
    }

    /// Observe whether a line has been configured as an output.
    #[must_use]
    pub fn is_configured(&self, name: &str) -> bool {
        self.cell(name).configured.load(Ordering::SeqCst)
    }
}

impl LineBank for SimBank {
    fn claim(&self, name: &str) -> Box<dyn DigitalOutput> {
        Box::new(self.line(name))
    }
}

/// Drive handle for one simulated line.
#[derive(Debug)]
pub struct SimLine {
    name: String,
    cell: Arc<LineCell>,
}

impl DigitalOutput for SimLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        self.cell.ready.load(Ordering::SeqCst)
    }

    fn configure(&mut self) -> PulseResult<()> {
        if self.cell.reject_configure.load(Ordering::SeqCst) {
            return Err(PulseError::LineConfig {
                line: self.name.clone(),
                reason: "simulated configure rejection".to_string(),
            });
        }
        self.cell.level.store(false, Ordering::SeqCst);
        self.cell.configured.store(true, Ordering::SeqCst);
        debug!(line = %self.name, "configured as output");
        Ok(())
    }

    fn set(&mut self, active: bool) {
        let previous = self.cell.level.swap(active, Ordering::SeqCst);
        if previous != active {
            self.cell.edges.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn toggle(&mut self) {
        self.cell.level.fetch_xor(true, Ordering::SeqCst);
        self.cell.edges.fetch_add(1, Ordering::SeqCst);
    }
}
