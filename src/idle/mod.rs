//! Idle-time and clock sources
//!
//! Both are plain queries with no internal state, safe to call from any
//! thread. The break monitor only ever sees these traits so tests can drive
//! it with a simulated clock and idle time.

use std::time::Instant;

/// Errors that can occur querying idle time
#[derive(Debug, thiserror::Error)]
pub enum IdleError {
    #[error("idle time query failed: {0}")]
    Query(String),
}

/// OS idle-time query
pub trait IdleSource: Send + Sync {
    /// Milliseconds since the last physical input event.
    fn inactive_millis(&self) -> Result<u64, IdleError>;
}

/// Monotonic millisecond clock
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Wall time measured from when the clock was created
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
