//! Resource limits for sandboxed execution.
//!
//! The machine ticks its tracker on every loop iteration and every function
//! call. A tracker that reports a violation unwinds execution with an
//! uncatchable signal: scripted `try/catch` cannot suppress a limit
//! violation, so untrusted code cannot keep itself alive past its budget.

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Why execution was cut short by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// The configured step budget was exhausted.
    Steps { limit: u64 },
    /// The configured wall-clock deadline passed.
    Timeout { limit: Duration },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Steps { limit } => write!(f, "execution exceeded the step limit of {limit}"),
            Self::Timeout { limit } => write!(f, "execution exceeded the timeout of {limit:?}"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Tracks execution cost and decides when to cut a script off.
///
/// Implementations should keep `on_step` cheap: it runs once per loop
/// iteration and once per function invocation.
pub trait ResourceTracker {
    /// Called on every loop iteration and function call.
    fn on_step(&mut self) -> Result<(), ResourceError>;
}

/// Tracker that never interrupts execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_step(&mut self) -> Result<(), ResourceError> {
        Ok(())
    }
}

/// Tracker enforcing a step budget and/or a wall-clock deadline.
///
/// The deadline is only checked every `TIME_CHECK_INTERVAL` steps so the
/// common path stays a counter increment.
#[derive(Debug, Clone)]
pub struct LimitedTracker {
    max_steps: Option<u64>,
    steps: u64,
    timeout: Option<Duration>,
    started: Instant,
}

/// How many steps pass between `Instant::now()` checks.
const TIME_CHECK_INTERVAL: u64 = 1024;

impl LimitedTracker {
    /// Creates a tracker. `None` disables the corresponding limit.
    #[must_use]
    pub fn new(max_steps: Option<u64>, timeout: Option<Duration>) -> Self {
        Self {
            max_steps,
            steps: 0,
            timeout,
            started: Instant::now(),
        }
    }

    /// Steps consumed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_step(&mut self) -> Result<(), ResourceError> {
        self.steps += 1;
        if let Some(limit) = self.max_steps
            && self.steps > limit
        {
            return Err(ResourceError::Steps { limit });
        }
        if let Some(limit) = self.timeout
            && self.steps % TIME_CHECK_INTERVAL == 0
            && self.started.elapsed() > limit
        {
            return Err(ResourceError::Timeout { limit });
        }
        Ok(())
    }
}
