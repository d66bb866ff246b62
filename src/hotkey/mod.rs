//! Hotkey module for system-wide keyboard shortcuts
//!
//! Registers global hotkeys on a dedicated native-event thread, delivers
//! them to the application's event loop, and synthesizes key presses.

mod backend;
mod bridge;
mod keys;
mod synth;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{HotkeyBackend, HotkeyError, HotkeyId, KeySynth, QuitHandle};
pub use bridge::{HotkeyBridge, HotkeyHandler};
pub use keys::{KeyCode, KeyCombination, Modifiers};
pub use synth::KeySender;
