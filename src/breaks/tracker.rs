//! Break reminder state machine
//!
//! Tracks active time since the last break and decides when to remind.
//! Pure: callers pass in the current time and idle time, so the same
//! logic runs under the real clock and under tests.

use std::fmt;
use std::time::Duration;

const MILLIS_PER_MINUTE: u64 = 60 * 1000;

/// The two states of the break monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakState {
    /// No reminder shown
    #[default]
    Idle,
    /// Countdown display active
    Reminding,
}

impl fmt::Display for BreakState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakState::Idle => write!(f, "Idle"),
            BreakState::Reminding => write!(f, "Reminding"),
        }
    }
}

/// Break monitor settings
#[derive(Debug, Clone)]
pub struct BreakConfig {
    /// Active minutes before a reminder; `<= 0` disables the monitor
    pub warning_minutes: i64,
    /// Minutes of continuous inactivity that count as a break
    pub reset_minutes: i64,
    /// Period of the low-frequency poll
    pub poll_interval: Duration,
    /// Delay before the first low-frequency poll
    pub first_poll_delay: Duration,
    /// Sleep between countdown samples
    pub countdown_interval: Duration,
}

impl BreakConfig {
    pub fn new(warning_minutes: i64, reset_minutes: i64) -> Self {
        Self {
            warning_minutes,
            reset_minutes,
            poll_interval: Duration::from_secs(60),
            first_poll_delay: Duration::from_millis(minutes_to_millis(warning_minutes)),
            countdown_interval: Duration::from_millis(16),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.warning_minutes > 0
    }

    fn warning_millis(&self) -> u64 {
        minutes_to_millis(self.warning_minutes)
    }

    fn reset_millis(&self) -> u64 {
        minutes_to_millis(self.reset_minutes)
    }
}

/// Negative minutes count as zero; huge ones saturate.
fn minutes_to_millis(minutes: i64) -> u64 {
    (minutes.max(0) as u64).saturating_mul(MILLIS_PER_MINUTE)
}

/// Result of a low-frequency poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A reminder is already showing; nothing evaluated
    AlreadyReminding,
    /// The user was idle long enough that this counts as a break
    BreakAbsorbed,
    /// Active time crossed the warning threshold; now `Reminding`
    Remind,
    /// Still accumulating active time
    Active,
}

/// Result of one countdown sample
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Break not taken yet; refresh the display
    Progress { text: String, progress: f32 },
    /// Idle time reached the reset threshold; back to `Idle`
    BreakTaken,
}

pub struct BreakTracker {
    config: BreakConfig,
    state: BreakState,
    /// Clock time of the last completed break (or of creation)
    last_break_at: u64,
}

impl BreakTracker {
    pub fn new(config: BreakConfig, now: u64) -> Self {
        Self {
            config,
            state: BreakState::Idle,
            last_break_at: now,
        }
    }

    pub fn state(&self) -> BreakState {
        self.state
    }

    pub fn is_reminding(&self) -> bool {
        self.state == BreakState::Reminding
    }

    pub fn last_break_at(&self) -> u64 {
        self.last_break_at
    }

    pub fn active_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_break_at)
    }

    /// Low-frequency check, the only place `Idle -> Reminding` happens.
    pub fn poll(&mut self, now: u64, inactive_millis: u64) -> PollOutcome {
        if self.is_reminding() {
            return PollOutcome::AlreadyReminding;
        }

        if inactive_millis >= self.config.reset_millis() {
            self.record_break(now);
            return PollOutcome::BreakAbsorbed;
        }

        if self.active_millis(now) >= self.config.warning_millis() {
            self.state = BreakState::Reminding;
            return PollOutcome::Remind;
        }

        PollOutcome::Active
    }

    /// High-frequency check while the countdown display is up.
    pub fn sample(&mut self, now: u64, inactive_millis: u64) -> Sample {
        if inactive_millis >= self.config.reset_millis() {
            self.record_break(now);
            self.state = BreakState::Idle;
            return Sample::BreakTaken;
        }

        Sample::Progress {
            text: active_text(self.active_millis(now) / MILLIS_PER_MINUTE),
            progress: progress(inactive_millis, self.config.reset_minutes),
        }
    }

    /// Leave `Reminding` without recording a break.
    pub fn abort(&mut self) {
        self.state = BreakState::Idle;
    }

    fn record_break(&mut self, now: u64) {
        self.last_break_at = self.last_break_at.max(now);
    }
}

/// Fraction of the reset threshold still to go: 1 with no inactivity,
/// 0 once inactivity reaches the threshold.
pub fn progress(inactive_millis: u64, reset_minutes: i64) -> f32 {
    let reset_millis = minutes_to_millis(reset_minutes);
    if reset_millis == 0 {
        return 0.0;
    }
    (1.0 - inactive_millis as f64 / reset_millis as f64).clamp(0.0, 1.0) as f32
}

/// "Active: H hour(s), M minute(s)", dropping the hours when zero.
pub fn active_text(active_minutes: u64) -> String {
    let hours = active_minutes / 60;
    let minutes = active_minutes % 60;
    let minutes_text = plural(minutes, "minute");
    if hours == 0 {
        format!("Active: {}", minutes_text)
    } else {
        format!("Active: {}, {}", plural(hours, "hour"), minutes_text)
    }
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
