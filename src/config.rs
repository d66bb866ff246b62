//! Configuration loading and management
//!
//! Defaults, then `config.json` in the data directory, then environment
//! overrides for the break thresholds.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::app::HotkeyAction;
use crate::breaks::BreakConfig;
use crate::hotkey::KeyCombination;

const WARNING_ENV: &str = "DESKMATE_BREAK_WARNING_MINUTES";
const RESET_ENV: &str = "DESKMATE_BREAK_RESET_MINUTES";

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Active minutes before a break reminder; `<= 0` disables it
    pub break_warning_minutes: i64,

    /// Idle minutes that count as a break
    pub break_reset_minutes: i64,

    pub popup_hotkey: Option<String>,
    pub upload_hotkey: Option<String>,
    pub screenshot_hotkey: Option<String>,
    pub screenshot_app_hotkey: Option<String>,
    pub screenshot_region_hotkey: Option<String>,
    pub screenshot_last_region_hotkey: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            socket_path: data_dir.join("daemon.sock"),
            data_dir,
            break_warning_minutes: 55,
            break_reset_minutes: 5,
            popup_hotkey: Some("ctrl shift INSERT".to_string()),
            upload_hotkey: Some("ctrl shift alt INSERT".to_string()),
            screenshot_hotkey: None,
            screenshot_app_hotkey: None,
            screenshot_region_hotkey: None,
            screenshot_last_region_hotkey: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    home.join(".local").join("share").join("deskmate")
}

impl Config {
    /// Load configuration from defaults, the config file and environment
    pub fn load() -> Result<Self> {
        let path = default_data_dir().join("config.json");
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Apply environment overrides through `lookup`
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup(WARNING_ENV) {
            self.break_warning_minutes = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer", WARNING_ENV))?;
        }
        if let Some(value) = lookup(RESET_ENV) {
            self.break_reset_minutes = value
                .trim()
                .parse()
                .with_context(|| format!("{} must be an integer", RESET_ENV))?;
        }
        Ok(())
    }

    /// Configured hotkeys in registration order, skipping unset ones
    pub fn hotkey_bindings(&self) -> Result<Vec<(HotkeyAction, KeyCombination)>> {
        let slots = [
            (HotkeyAction::Popup, &self.popup_hotkey),
            (HotkeyAction::Upload, &self.upload_hotkey),
            (HotkeyAction::Screenshot, &self.screenshot_hotkey),
            (HotkeyAction::ScreenshotApp, &self.screenshot_app_hotkey),
            (HotkeyAction::ScreenshotRegion, &self.screenshot_region_hotkey),
            (HotkeyAction::ScreenshotLastRegion, &self.screenshot_last_region_hotkey),
        ];

        let mut bindings = Vec::new();
        for (action, value) in slots {
            let Some(text) = value.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
                continue;
            };
            let combo = text
                .parse::<KeyCombination>()
                .with_context(|| format!("invalid {} hotkey {:?}", action, text))?;
            bindings.push((action, combo));
        }
        Ok(bindings)
    }

    pub fn breaks(&self) -> BreakConfig {
        BreakConfig::new(self.break_warning_minutes, self.break_reset_minutes)
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::KeyCode;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.socket_path.to_string_lossy().contains("deskmate"));
        assert_eq!(config.break_warning_minutes, 55);
        assert_eq!(config.break_reset_minutes, 5);

        let bindings = config.hotkey_bindings().unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].0, HotkeyAction::Popup);
        assert_eq!(bindings[0].1.key, KeyCode::INSERT);
        assert!(!bindings[0].1.modifiers.alt);
        assert_eq!(bindings[1].0, HotkeyAction::Upload);
        assert!(bindings[1].1.modifiers.alt);
    }

    #[test]
    fn test_from_json_partial() {
        let config = Config::from_json(
            r#"{"break_warning_minutes": 30, "screenshot_region_hotkey": "ctrl+alt+r", "upload_hotkey": null}"#,
        )
        .unwrap();
        assert_eq!(config.break_warning_minutes, 30);
        assert_eq!(config.break_reset_minutes, 5);

        let actions: Vec<_> = config
            .hotkey_bindings()
            .unwrap()
            .into_iter()
            .map(|(action, _)| action)
            .collect();
        assert_eq!(actions, vec![HotkeyAction::Popup, HotkeyAction::ScreenshotRegion]);
    }

    #[test]
    fn test_invalid_hotkey_rejected() {
        let config = Config::from_json(r#"{"popup_hotkey": "ctrl shift NOSUCHKEY"}"#).unwrap();
        assert!(config.hotkey_bindings().is_err());
    }

    #[test]
    fn test_blank_hotkey_skipped() {
        let config = Config::from_json(r#"{"popup_hotkey": "  "}"#).unwrap();
        let bindings = config.hotkey_bindings().unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].0, HotkeyAction::Upload);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(|name| match name {
                WARNING_ENV => Some("0".to_string()),
                RESET_ENV => Some(" 10 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.break_warning_minutes, 0);
        assert_eq!(config.break_reset_minutes, 10);
        assert!(!config.breaks().is_enabled());

        let mut config = Config::default();
        assert!(config
            .apply_env(|name| (name == RESET_ENV).then(|| "soon".to_string()))
            .is_err());
    }

    #[test]
    fn test_breaks() {
        let breaks = Config::default().breaks();
        assert!(breaks.is_enabled());
        assert_eq!(breaks.poll_interval, Duration::from_secs(60));
        assert_eq!(breaks.first_poll_delay, Duration::from_secs(55 * 60));
        assert_eq!(breaks.countdown_interval, Duration::from_millis(16));
    }

    #[test]
    fn test_huge_break_minutes_do_not_overflow() {
        let mut config = Config::from_json(&format!(
            r#"{{"break_warning_minutes": {}}}"#,
            i64::MAX
        ))
        .unwrap();
        config
            .apply_env(|name| (name == RESET_ENV).then(|| (i64::MAX / 2).to_string()))
            .unwrap();

        let breaks = config.breaks();
        assert!(breaks.is_enabled());
        assert_eq!(breaks.first_poll_delay, Duration::from_millis(u64::MAX));
    }
}
