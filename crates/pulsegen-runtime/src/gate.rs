//! Mutual exclusion gate for active phases.
//!
//! Tasks that opt in hold the gate for exactly their active phase, so
//! no two participating channels are active at the same time. The gate
//! is an explicit value: the runtime creates one per deployment and
//! hands an `Arc` to each participating task. There is no global
//! instance.
//!
//! Acquisition order among waiters is scheduler-determined; fairness
//! is not guaranteed.

use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

/// Serializes the active phases of participating tasks.
#[derive(Debug, Default)]
pub struct Gate {
    inner: Mutex<()>,
}

impl Gate {
    /// Create an unheld gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the gate is free, then hold it until the returned
    /// guard drops. A poisoned lock is recovered, not propagated.
    #[must_use]
    pub fn acquire(&self) -> GateGuard<'_> {
        GateGuard {
            _held: self.inner.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Take the gate only if it is free right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        match self.inner.try_lock() {
            Ok(held) => Some(GateGuard { _held: held }),
            Err(TryLockError::Poisoned(poisoned)) => Some(GateGuard {
                _held: poisoned.into_inner(),
            }),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

/// Holds the gate; dropping releases it.
#[must_use]
#[derive(Debug)]
pub struct GateGuard<'a> {
    _held: MutexGuard<'a, ()>,
}
