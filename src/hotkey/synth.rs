//! Fire-and-forget key synthesis

use std::sync::Arc;

use tracing::{debug, warn};

use super::backend::KeySynth;
use super::keys::KeyCode;

/// Modifier used with V for the paste shortcut.
#[cfg(target_os = "macos")]
pub const PASTE_MODIFIER: KeyCode = KeyCode::META;
#[cfg(not(target_os = "macos"))]
pub const PASTE_MODIFIER: KeyCode = KeyCode::CONTROL;

/// Cloneable handle for injecting key events from any thread.
///
/// Failures are logged and dropped; callers get no completion signal.
#[derive(Clone)]
pub struct KeySender {
    synth: Arc<dyn KeySynth>,
}

impl KeySender {
    pub fn new(synth: Arc<dyn KeySynth>) -> Self {
        Self { synth }
    }

    pub fn send_key_down(&self, code: KeyCode) {
        if let Err(e) = self.synth.key_down(code) {
            warn!(key = %code.name(), %e, "failed to synthesize key down");
        }
    }

    pub fn send_key_up(&self, code: KeyCode) {
        if let Err(e) = self.synth.key_up(code) {
            warn!(key = %code.name(), %e, "failed to synthesize key up");
        }
    }

    pub fn send_key_press(&self, code: KeyCode) {
        self.send_key_down(code);
        self.send_key_up(code);
    }

    /// Emit the paste shortcut into whichever window has focus.
    ///
    /// Modifiers the user may still be holding from the triggering hotkey
    /// are released first, otherwise the target sees e.g. ctrl+shift+V.
    pub fn paste(&self) {
        debug!("sending paste keystroke");
        self.send_key_up(KeyCode::ALT);
        self.send_key_up(KeyCode::SHIFT);
        self.send_key_up(KeyCode::CONTROL);

        let v = KeyCode(u16::from(b'V'));
        self.send_key_down(PASTE_MODIFIER);
        self.send_key_down(v);
        self.send_key_up(v);
        self.send_key_up(PASTE_MODIFIER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::testing::{KeyTransition, RecordingSynth};

    #[test]
    fn test_key_press_is_down_then_up() {
        let synth = Arc::new(RecordingSynth::default());
        let sender = KeySender::new(synth.clone());

        sender.send_key_press(KeyCode::ENTER);

        assert_eq!(
            synth.transitions(),
            vec![KeyTransition::Down(KeyCode::ENTER), KeyTransition::Up(KeyCode::ENTER)]
        );
    }

    #[test]
    fn test_paste_releases_modifiers_first() {
        let synth = Arc::new(RecordingSynth::default());
        let sender = KeySender::new(synth.clone());
        let v = KeyCode(u16::from(b'V'));

        sender.paste();

        assert_eq!(
            synth.transitions(),
            vec![
                KeyTransition::Up(KeyCode::ALT),
                KeyTransition::Up(KeyCode::SHIFT),
                KeyTransition::Up(KeyCode::CONTROL),
                KeyTransition::Down(PASTE_MODIFIER),
                KeyTransition::Down(v),
                KeyTransition::Up(v),
                KeyTransition::Up(PASTE_MODIFIER),
            ]
        );
    }

    #[test]
    fn test_failures_are_swallowed() {
        let synth = Arc::new(RecordingSynth::failing());
        let sender = KeySender::new(synth.clone());

        sender.paste();

        assert!(synth.transitions().is_empty());
    }
}
