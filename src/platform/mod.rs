//! Native hotkey, key-synthesis and idle-time backends
//!
//! Exactly one backend is compiled per target; all export the same three
//! types: `NativeHotkeys`, `NativeKeySynth` and `NativeIdle`.

mod keymap;

#[cfg(windows)]
mod win32;
#[cfg(windows)]
pub use win32::{NativeHotkeys, NativeIdle, NativeKeySynth};

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::{NativeHotkeys, NativeIdle, NativeKeySynth};

#[cfg(all(unix, not(target_os = "macos")))]
mod x11;
#[cfg(all(unix, not(target_os = "macos")))]
pub use x11::{NativeHotkeys, NativeIdle, NativeKeySynth};
