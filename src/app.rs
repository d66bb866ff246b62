//! Application state owned by the UI loop
//!
//! Receives hotkeys from the bridge and reminder updates from the break
//! monitor, always on the UI thread, and republishes both as [`AppEvent`]s
//! for the popup, upload and screenshot collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::breaks::ReminderDisplay;
use crate::events::AppEvent;
use crate::hotkey::{HotkeyHandler, KeyCombination};

/// Smallest progress change worth publishing
const PROGRESS_STEP: f32 = 0.01;

/// What a configured hotkey does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotkeyAction {
    /// Show the clip history popup
    Popup,
    /// Upload the current clipboard contents
    Upload,
    /// Capture the whole screen
    Screenshot,
    /// Capture the focused window
    ScreenshotApp,
    /// Capture a selected region
    ScreenshotRegion,
    /// Capture the previously selected region again
    ScreenshotLastRegion,
}

impl fmt::Display for HotkeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HotkeyAction::Popup => "popup",
            HotkeyAction::Upload => "upload",
            HotkeyAction::Screenshot => "screenshot",
            HotkeyAction::ScreenshotApp => "screenshot_app",
            HotkeyAction::ScreenshotRegion => "screenshot_region",
            HotkeyAction::ScreenshotLastRegion => "screenshot_last_region",
        };
        f.write_str(name)
    }
}

/// What the break reminder currently shows
#[derive(Debug, Clone, PartialEq)]
pub struct ReminderView {
    pub title: String,
    pub text: String,
    pub progress: f32,
}

pub struct App {
    hotkeys: Vec<(HotkeyAction, KeyCombination)>,
    events: broadcast::Sender<AppEvent>,
    reminder: Option<ReminderView>,
    /// Text and progress of the last published `BreakProgress`
    published: Option<(String, f32)>,
}

impl App {
    pub fn new(
        hotkeys: Vec<(HotkeyAction, KeyCombination)>,
        events: broadcast::Sender<AppEvent>,
    ) -> Self {
        Self {
            hotkeys,
            events,
            reminder: None,
            published: None,
        }
    }

    pub fn action_for(&self, combo: &KeyCombination) -> Option<HotkeyAction> {
        self.hotkeys
            .iter()
            .find(|(_, c)| c == combo)
            .map(|(action, _)| *action)
    }

    pub fn reminder(&self) -> Option<&ReminderView> {
        self.reminder.as_ref()
    }

    fn publish(&self, event: AppEvent) {
        trace!(%event, "publishing");
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    fn publish_progress(&mut self) {
        let Some(view) = &self.reminder else {
            return;
        };
        let changed = match &self.published {
            Some((text, progress)) => {
                *text != view.text || (view.progress - progress).abs() >= PROGRESS_STEP
            }
            None => true,
        };
        if !changed {
            return;
        }

        self.published = Some((view.text.clone(), view.progress));
        self.publish(AppEvent::BreakProgress {
            text: view.text.clone(),
            progress: view.progress,
        });
    }
}

impl HotkeyHandler for App {
    fn hotkey(&mut self, combo: &KeyCombination) {
        let Some(action) = self.action_for(combo) else {
            warn!(%combo, "hotkey with no action");
            return;
        };
        debug!(%combo, %action, "hotkey");
        self.publish(AppEvent::HotkeyPressed {
            action,
            hotkey: *combo,
        });
    }
}

impl ReminderDisplay for App {
    fn open(&mut self, title: &str) {
        self.reminder = Some(ReminderView {
            title: title.to_string(),
            text: String::new(),
            progress: 1.0,
        });
        self.published = None;
        self.publish(AppEvent::BreakReminderOpened {
            title: title.to_string(),
        });
    }

    fn set_text(&mut self, text: &str) {
        if let Some(view) = &mut self.reminder {
            view.text = text.to_string();
        }
    }

    fn set_progress(&mut self, progress: f32) {
        if let Some(view) = &mut self.reminder {
            view.progress = progress.clamp(0.0, 1.0);
        }
        self.publish_progress();
    }

    fn close(&mut self, message: &str) {
        if self.reminder.take().is_none() {
            return;
        }
        self.published = None;
        if message.is_empty() {
            info!("break reminder closed");
            self.publish(AppEvent::BreakReminderClosed);
        } else {
            info!(message, "break reminder closed");
            self.publish(AppEvent::BreakCompleted {
                message: message.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaks::{BREAK_COMPLETE, REMINDER_TITLE};

    fn app() -> (App, broadcast::Receiver<AppEvent>) {
        let (tx, rx) = broadcast::channel(64);
        let hotkeys = vec![
            (HotkeyAction::Popup, "ctrl shift INSERT".parse().unwrap()),
            (HotkeyAction::Upload, "ctrl shift alt INSERT".parse().unwrap()),
        ];
        (App::new(hotkeys, tx), rx)
    }

    fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_hotkey_publishes_action() {
        let (mut app, mut rx) = app();
        let combo: KeyCombination = "ctrl shift alt INSERT".parse().unwrap();
        app.hotkey(&combo);

        assert_eq!(
            drain(&mut rx),
            vec![AppEvent::HotkeyPressed {
                action: HotkeyAction::Upload,
                hotkey: combo,
            }]
        );
    }

    #[test]
    fn test_unknown_hotkey_ignored() {
        let (mut app, mut rx) = app();
        app.hotkey(&"ctrl F9".parse().unwrap());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_reminder_lifecycle() {
        let (mut app, mut rx) = app();
        app.open(REMINDER_TITLE);
        app.set_text("Active: 30 minutes");
        app.set_progress(1.0);
        assert_eq!(app.reminder().unwrap().text, "Active: 30 minutes");

        app.close(BREAK_COMPLETE);
        assert!(app.reminder().is_none());

        assert_eq!(
            drain(&mut rx),
            vec![
                AppEvent::BreakReminderOpened {
                    title: REMINDER_TITLE.to_string()
                },
                AppEvent::BreakProgress {
                    text: "Active: 30 minutes".to_string(),
                    progress: 1.0
                },
                AppEvent::BreakCompleted {
                    message: BREAK_COMPLETE.to_string()
                },
            ]
        );
    }

    #[test]
    fn test_progress_throttled() {
        let (mut app, mut rx) = app();
        app.open(REMINDER_TITLE);
        app.set_text("Active: 30 minutes");
        app.set_progress(0.5);
        app.set_progress(0.505);
        app.set_progress(0.498);
        app.set_progress(0.48);
        app.set_text("Active: 31 minutes");
        app.set_progress(0.48);

        let progress: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                AppEvent::BreakProgress { text, progress } => Some((text, progress)),
                _ => None,
            })
            .collect();
        assert_eq!(
            progress,
            vec![
                ("Active: 30 minutes".to_string(), 0.5),
                ("Active: 30 minutes".to_string(), 0.48),
                ("Active: 31 minutes".to_string(), 0.48),
            ]
        );
    }

    #[test]
    fn test_aborted_reminder_closes_without_completion() {
        let (mut app, mut rx) = app();
        app.open(REMINDER_TITLE);
        app.close("");
        // A second close with nothing open is ignored.
        app.close(BREAK_COMPLETE);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], AppEvent::BreakReminderClosed);
    }

    #[test]
    fn test_updates_without_reminder_ignored() {
        let (mut app, mut rx) = app();
        app.set_text("Active: 1 minute");
        app.set_progress(0.3);
        assert!(app.reminder().is_none());
        assert!(drain(&mut rx).is_empty());
    }
}
