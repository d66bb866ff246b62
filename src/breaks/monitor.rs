//! Background drivers for the break tracker
//!
//! A low-frequency `break-timer` thread polls idle time and, when the
//! tracker asks for a reminder, opens the display on the UI thread and
//! starts a `break-countdown` thread that samples at ~60 Hz until a break
//! is taken. Both threads share one cancellation channel: dropping its
//! sender wakes them and `stop` joins them, then closes a reminder that
//! was still showing.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, trace, warn};

use super::tracker::{BreakConfig, BreakState, BreakTracker, PollOutcome, Sample};
use crate::idle::{Clock, IdleError, IdleSource};
use crate::ui::UiHandle;

/// Title of the countdown display
pub const REMINDER_TITLE: &str = "Break reminder";

/// Message shown when the countdown ends because a break was taken
pub const BREAK_COMPLETE: &str = "Break complete!";

/// The countdown display, driven on the UI thread.
///
/// At most one reminder is open at a time: `open` is always followed by
/// `close` before the next `open`.
pub trait ReminderDisplay {
    fn open(&mut self, title: &str);
    fn set_text(&mut self, text: &str);
    fn set_progress(&mut self, progress: f32);
    fn close(&mut self, message: &str);
}

/// Handle to a running (or disabled) break monitor
pub struct BreakMonitor {
    shared: Arc<Shared>,
    stop_tx: Option<Sender<()>>,
    timer: Option<thread::JoinHandle<()>>,
    close_reminder: Option<Box<dyn Fn() + Send>>,
}

struct Shared {
    tracker: Mutex<BreakTracker>,
    countdown: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Shared {
    fn tracker(&self) -> MutexGuard<'_, BreakTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything a monitor thread needs
struct Worker<S> {
    config: BreakConfig,
    idle: Arc<dyn IdleSource>,
    clock: Arc<dyn Clock>,
    ui: UiHandle<S>,
    shared: Arc<Shared>,
    stop_rx: Receiver<()>,
}

impl<S> Clone for Worker<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            idle: Arc::clone(&self.idle),
            clock: Arc::clone(&self.clock),
            ui: self.ui.clone(),
            shared: Arc::clone(&self.shared),
            stop_rx: self.stop_rx.clone(),
        }
    }
}

impl BreakMonitor {
    /// Start monitoring. With `warning_minutes <= 0` no thread is started
    /// and the display is never touched.
    pub fn start<S>(
        config: BreakConfig,
        idle: Arc<dyn IdleSource>,
        clock: Arc<dyn Clock>,
        ui: UiHandle<S>,
    ) -> io::Result<Self>
    where
        S: ReminderDisplay + 'static,
    {
        let shared = Arc::new(Shared {
            tracker: Mutex::new(BreakTracker::new(config.clone(), clock.now_millis())),
            countdown: Mutex::new(None),
        });

        if !config.is_enabled() {
            info!("break reminders disabled");
            return Ok(Self {
                shared,
                stop_tx: None,
                timer: None,
                close_reminder: None,
            });
        }

        info!(
            warning_minutes = config.warning_minutes,
            reset_minutes = config.reset_minutes,
            "break monitor started"
        );

        let close_reminder: Box<dyn Fn() + Send> = {
            let ui = ui.clone();
            Box::new(move || {
                ui.post(|display: &mut S| display.close(""));
            })
        };

        let (stop_tx, stop_rx) = bounded(0);
        let worker = Worker {
            config,
            idle,
            clock,
            ui,
            shared: Arc::clone(&shared),
            stop_rx,
        };
        let timer = thread::Builder::new()
            .name("break-timer".to_string())
            .spawn(move || worker.run_timer())?;

        Ok(Self {
            shared,
            stop_tx: Some(stop_tx),
            timer: Some(timer),
            close_reminder: Some(close_reminder),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.timer.is_some()
    }

    pub fn state(&self) -> BreakState {
        self.shared.tracker().state()
    }

    /// Clock time of the last recognized break
    pub fn last_break_at(&self) -> u64 {
        self.shared.tracker().last_break_at()
    }

    /// Cancel both threads and wait for them to exit. A reminder still on
    /// screen is closed with an empty message.
    pub fn stop(&mut self) {
        // Disconnecting the channel wakes every `recv_timeout`.
        self.stop_tx.take();

        if let Some(timer) = self.timer.take() {
            if timer.join().is_err() {
                warn!("break timer thread panicked");
            }
        }
        let countdown = self
            .shared
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(countdown) = countdown {
            if countdown.join().is_err() {
                warn!("break countdown thread panicked");
            }
        }

        let mut tracker = self.shared.tracker();
        if tracker.is_reminding() {
            tracker.abort();
            drop(tracker);
            debug!("closing break reminder on stop");
            if let Some(close) = &self.close_reminder {
                close();
            }
        }
    }
}

impl Drop for BreakMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<S: ReminderDisplay + 'static> Worker<S> {
    /// Sleep until the next poll; false once the monitor is stopping.
    fn wait(&self, delay: std::time::Duration) -> bool {
        matches!(self.stop_rx.recv_timeout(delay), Err(RecvTimeoutError::Timeout))
    }

    fn run_timer(self) {
        debug!("break timer thread started");
        let mut delay = self.config.first_poll_delay;
        while self.wait(delay) {
            delay = self.config.poll_interval;
            if let Err(e) = self.tick() {
                error!(%e, "break timer stopping");
                break;
            }
        }
        debug!("break timer thread stopped");
    }

    fn tick(&self) -> Result<(), IdleError> {
        let mut tracker = self.shared.tracker();
        if tracker.is_reminding() {
            trace!("reminder already showing");
            return Ok(());
        }

        let inactive = self.idle.inactive_millis()?;
        match tracker.poll(self.clock.now_millis(), inactive) {
            PollOutcome::BreakAbsorbed => {
                info!(inactive_ms = inactive, "idle stretch counted as a break");
            }
            PollOutcome::Remind => {
                drop(tracker);
                self.open_reminder();
            }
            PollOutcome::AlreadyReminding | PollOutcome::Active => {}
        }
        Ok(())
    }

    fn open_reminder(&self) {
        info!("active too long, showing break reminder");
        self.ui.post(|display: &mut S| display.open(REMINDER_TITLE));

        let mut slot = self
            .shared
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // The previous countdown has already released the guard.
        if let Some(previous) = slot.take() {
            let _ = previous.join();
        }

        let worker = self.clone();
        match thread::Builder::new()
            .name("break-countdown".to_string())
            .spawn(move || worker.run_countdown())
        {
            Ok(handle) => *slot = Some(handle),
            Err(e) => {
                error!(%e, "failed to spawn break countdown thread");
                self.shared.tracker().abort();
                self.ui.post(|display: &mut S| display.close(""));
            }
        }
    }

    fn run_countdown(self) {
        debug!("break countdown thread started");
        loop {
            let inactive = match self.idle.inactive_millis() {
                Ok(inactive) => inactive,
                Err(e) => {
                    error!(%e, "break countdown stopping");
                    self.shared.tracker().abort();
                    self.ui.post(|display: &mut S| display.close(""));
                    break;
                }
            };

            let sample = self.shared.tracker().sample(self.clock.now_millis(), inactive);
            match sample {
                Sample::Progress { text, progress } => {
                    self.ui.post(move |display: &mut S| {
                        display.set_text(&text);
                        display.set_progress(progress);
                    });
                }
                Sample::BreakTaken => {
                    info!("break taken");
                    self.ui.post(|display: &mut S| display.close(BREAK_COMPLETE));
                    break;
                }
            }

            if !self.wait(self.config.countdown_interval) {
                break;
            }
        }
        debug!("break countdown thread stopped");
    }
}
