//! Seams between the hotkey bridge and the operating system
//!
//! `HotkeyBackend` is driven entirely from the native-event thread: it binds
//! hotkeys, blocks on the OS event queue and unbinds on the way out.
//! `KeySynth` injects key transitions and may be called from any thread.

use std::fmt;
use std::sync::Arc;

use super::keys::{KeyCode, KeyCombination};

/// Dense index of a registration entry, used as the OS-level hotkey id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HotkeyId(pub u32);

impl HotkeyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for HotkeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors that can occur in the hotkey bridge
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("key combination is empty")]
    EmptyCombination,

    #[error("hotkey bridge has already been started")]
    AlreadyStarted,

    #[error("unable to register hotkey {combo}: {reason}")]
    Bind { combo: KeyCombination, reason: String },

    #[error("native hotkey call failed: {0}")]
    Os(String),

    #[error("failed to spawn native-event thread: {0}")]
    ThreadSpawn(String),

    #[error("native-event thread exited before hotkeys were registered")]
    NativeThreadExited,
}

/// Wakes a backend blocked in [`HotkeyBackend::run`] and makes it return.
#[derive(Clone)]
pub struct QuitHandle(Arc<dyn Fn() + Send + Sync>);

impl QuitHandle {
    pub fn new(quit: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(quit))
    }

    pub fn quit(&self) {
        (self.0)()
    }
}

impl fmt::Debug for QuitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QuitHandle")
    }
}

/// OS global-hotkey API.
///
/// Every method is called on the native-event thread, in this order:
/// `bind` for each entry, `quit_handle` once, `run`, then `unbind` for each
/// bound entry. `start` on the bridge returns only after `run` has called
/// `started`; an error returned from `run` before that fails `start`.
pub trait HotkeyBackend: Send + 'static {
    /// Bind `id` as a system-wide hotkey for `combo`.
    fn bind(&mut self, id: HotkeyId, combo: &KeyCombination) -> Result<(), HotkeyError>;

    /// Release a binding made by `bind`.
    fn unbind(&mut self, id: HotkeyId) -> Result<(), HotkeyError>;

    /// Handle another thread uses to make `run` return.
    fn quit_handle(&self) -> QuitHandle;

    /// Block on the OS event queue, calling `on_hotkey` for each hotkey
    /// event, until the queue reports quit.
    ///
    /// `started` must be called once, as soon as every binding is able to
    /// fire.
    fn run(
        &mut self,
        started: &mut dyn FnMut(),
        on_hotkey: &mut dyn FnMut(HotkeyId),
    ) -> Result<(), HotkeyError>;
}

/// OS key-synthesis API.
pub trait KeySynth: Send + Sync {
    fn key_down(&self, code: KeyCode) -> Result<(), HotkeyError>;

    fn key_up(&self, code: KeyCode) -> Result<(), HotkeyError>;
}
