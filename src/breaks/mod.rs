//! Break reminder module
//!
//! Tracks continuous activity from system-wide idle time and shows a
//! countdown reminder once the user has been active too long:
//! - Idle: accumulating active time, polled about once a minute
//! - Reminding: countdown display up until the user is idle long enough

mod monitor;
mod tracker;

pub use monitor::{BreakMonitor, ReminderDisplay, BREAK_COMPLETE, REMINDER_TITLE};
pub use tracker::{BreakConfig, BreakState};
