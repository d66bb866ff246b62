//! Events published by the application loop
//!
//! Hotkey presses and break-reminder updates, fanned out to IPC
//! subscribers over a broadcast channel.

use serde::{Deserialize, Serialize};

use crate::app::HotkeyAction;
use crate::hotkey::KeyCombination;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A registered hotkey fired
    HotkeyPressed {
        action: HotkeyAction,
        hotkey: KeyCombination,
    },

    /// The break reminder display opened
    BreakReminderOpened { title: String },

    /// Countdown update while reminding
    BreakProgress {
        text: String,
        /// Fraction in [0, 1], counting down toward a completed break
        progress: f32,
    },

    /// The user took a break and the reminder closed
    BreakCompleted { message: String },

    /// The reminder closed without a break, after an idle-time query failed
    BreakReminderClosed,
}

impl std::fmt::Display for AppEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppEvent::HotkeyPressed { action, hotkey } => {
                write!(f, "HOTKEY_PRESSED {} ({})", action, hotkey)
            }
            AppEvent::BreakReminderOpened { .. } => write!(f, "BREAK_REMINDER_OPENED"),
            AppEvent::BreakProgress { progress, .. } => {
                write!(f, "BREAK_PROGRESS ({:.0}%)", progress * 100.0)
            }
            AppEvent::BreakCompleted { .. } => write!(f, "BREAK_COMPLETED"),
            AppEvent::BreakReminderClosed => write!(f, "BREAK_REMINDER_CLOSED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::HotkeyPressed {
            action: HotkeyAction::ScreenshotRegion,
            hotkey: "ctrl shift R".parse().unwrap(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"hotkey_pressed""#));
        assert!(json.contains(r#""action":"screenshot_region""#));
        assert!(json.contains(r#""hotkey":"ctrl shift R""#));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"break_completed","message":"Break complete!"}"#;
        let event: AppEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            AppEvent::BreakCompleted {
                message: "Break complete!".to_string()
            }
        );
    }

    #[test]
    fn test_display() {
        let event = AppEvent::BreakProgress {
            text: "Active: 1 minute".to_string(),
            progress: 0.25,
        };
        assert_eq!(event.to_string(), "BREAK_PROGRESS (25%)");
    }
}
