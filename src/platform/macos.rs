//! macOS hotkeys, key synthesis and idle time
//!
//! Hotkeys are matched from a listen-only CGEventTap on the native-event
//! thread's own CFRunLoop. Requires the Accessibility permission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventTapProxy, CGEventType, EventField,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use tracing::{info, warn};

use super::keymap;
use crate::hotkey::{
    HotkeyBackend, HotkeyError, HotkeyId, KeyCode, KeyCombination, KeySynth, Modifiers, QuitHandle,
};
use crate::idle::{IdleError, IdleSource};

fn modifiers_from_flags(flags: CGEventFlags) -> Modifiers {
    Modifiers {
        shift: flags.contains(CGEventFlags::CGEventFlagShift),
        control: flags.contains(CGEventFlags::CGEventFlagControl),
        alt: flags.contains(CGEventFlags::CGEventFlagAlternate),
        meta: flags.contains(CGEventFlags::CGEventFlagCommand),
    }
}

struct Binding {
    id: HotkeyId,
    keycode: u16,
    modifiers: Modifiers,
}

/// Event-tap hotkeys
pub struct NativeHotkeys {
    bindings: Vec<Binding>,
    running: Arc<AtomicBool>,
}

impl NativeHotkeys {
    pub fn new() -> Result<Self, HotkeyError> {
        Ok(Self {
            bindings: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }
}

impl HotkeyBackend for NativeHotkeys {
    fn bind(&mut self, id: HotkeyId, combo: &KeyCombination) -> Result<(), HotkeyError> {
        let keycode = keymap::mac_keycode(combo.key).ok_or_else(|| HotkeyError::Bind {
            combo: *combo,
            reason: "key has no macOS key code".to_string(),
        })?;
        if self
            .bindings
            .iter()
            .any(|b| b.keycode == keycode && b.modifiers == combo.modifiers)
        {
            return Err(HotkeyError::Bind {
                combo: *combo,
                reason: "already registered".to_string(),
            });
        }

        self.bindings.push(Binding {
            id,
            keycode,
            modifiers: combo.modifiers,
        });
        Ok(())
    }

    fn unbind(&mut self, id: HotkeyId) -> Result<(), HotkeyError> {
        self.bindings.retain(|b| b.id != id);
        Ok(())
    }

    fn quit_handle(&self) -> QuitHandle {
        let running = Arc::clone(&self.running);
        QuitHandle::new(move || running.store(false, Ordering::SeqCst))
    }

    fn run(
        &mut self,
        started: &mut dyn FnMut(),
        on_hotkey: &mut dyn FnMut(HotkeyId),
    ) -> Result<(), HotkeyError> {
        let (key_tx, key_rx) = mpsc::channel::<(u16, CGEventFlags)>();

        // CGEventTap callback - must be fast and non-blocking
        let callback = move |_proxy: CGEventTapProxy, event_type: CGEventType, event: &CGEvent| {
            match event_type {
                CGEventType::KeyDown => {
                    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                    let _ = key_tx.send((keycode as u16, event.get_flags()));
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    warn!("event tap disabled by the system");
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown],
            callback,
        )
        .map_err(|_| {
            HotkeyError::Os("failed to create event tap - check Accessibility permissions".to_string())
        })?;
        tap.enable();

        let source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| HotkeyError::Os("failed to create run loop source".to_string()))?;
        let run_loop = CFRunLoop::get_current();
        unsafe {
            run_loop.add_source(&source, kCFRunLoopCommonModes);
        }
        info!("event tap created and enabled");
        started();

        while self.running.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
            }

            while let Ok((keycode, flags)) = key_rx.try_recv() {
                let modifiers = modifiers_from_flags(flags);
                for binding in &self.bindings {
                    if binding.keycode == keycode && binding.modifiers == modifiers {
                        on_hotkey(binding.id);
                    }
                }
            }
        }

        unsafe {
            run_loop.remove_source(&source, kCFRunLoopCommonModes);
        }
        Ok(())
    }
}

/// Quartz keyboard-event synthesis
pub struct NativeKeySynth;

impl NativeKeySynth {
    pub fn new() -> Result<Self, HotkeyError> {
        Ok(Self)
    }

    fn post(&self, code: KeyCode, down: bool) -> Result<(), HotkeyError> {
        let keycode = keymap::mac_keycode(code)
            .ok_or_else(|| HotkeyError::Os(format!("no macOS key code for {}", code.name())))?;
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| HotkeyError::Os("failed to create event source".to_string()))?;
        let event = CGEvent::new_keyboard_event(source, keycode, down)
            .map_err(|_| HotkeyError::Os("failed to create keyboard event".to_string()))?;
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

impl KeySynth for NativeKeySynth {
    fn key_down(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.post(code, true)
    }

    fn key_up(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.post(code, false)
    }
}

#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventSourceSecondsSinceLastEventType(state: i32, event_type: u32) -> f64;
}

// kCGEventSourceStateCombinedSessionState
const COMBINED_SESSION_STATE: i32 = 0;
// kCGAnyInputEventType
const ANY_INPUT_EVENT: u32 = u32::MAX;

/// Quartz event-source idle time
pub struct NativeIdle;

impl NativeIdle {
    pub fn new() -> Result<Self, IdleError> {
        Ok(Self)
    }
}

impl IdleSource for NativeIdle {
    fn inactive_millis(&self) -> Result<u64, IdleError> {
        let seconds = unsafe {
            CGEventSourceSecondsSinceLastEventType(COMBINED_SESSION_STATE, ANY_INPUT_EVENT)
        };
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(IdleError::Query(format!("unexpected idle seconds: {}", seconds)));
        }
        Ok((seconds * 1000.0) as u64)
    }
}
