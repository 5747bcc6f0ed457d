//! Lifecycle state machine for signal tasks.
//!
//! A task is CREATED, then either enters RUNNING (startup checks passed)
//! or FAILED (a line was not ready or rejected configuration). RUNNING
//! ends only through a cooperative stop: the steady-state loop has no
//! error path.

use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of a signal task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Constructed but not yet started; lines unconfigured.
    #[default]
    Created,
    /// Startup checks passed; cyclic loop in progress.
    Running,
    /// Exited cooperatively (shutdown request or cycle limit).
    Stopped,
    /// Startup failed; the task exited without entering its loop.
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl TaskState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: TaskState) -> bool {
        use TaskState::{Created, Failed, Running, Stopped};

        matches!(
            (self, target),
            // Startup outcome
            (Created, Running)
                | (Created, Failed)
                // Shutdown requested before the loop was entered
                | (Created, Stopped)
                // Cooperative stop; the only way out of RUNNING
                | (Running, Stopped)
        )
    }

    /// Returns true if the task has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Returns true if the cyclic loop is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: TaskState,
    previous: Option<TaskState>,
    transition_count: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine starting in CREATED.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: TaskState::Created,
            previous: None,
            transition_count: 0,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<TaskState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: TaskState) -> PulseResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(PulseError::InvalidTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }
}
