//! Win32 hotkeys, key synthesis and idle time
//!
//! `RegisterHotKey` with a null window binds to the calling thread's
//! message queue, so binding, `GetMessageW` and unbinding all happen on
//! the native-event thread. Quit is a `WM_QUIT` posted to that thread,
//! which `GetMessageW` returns regardless of its message filter.

use std::mem::size_of;

use windows::core::Error as WinError;
use windows::Win32::Foundation::{HWND, LPARAM, WPARAM};
use windows::Win32::System::SystemInformation::GetTickCount;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    keybd_event, GetLastInputInfo, RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS,
    KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP, LASTINPUTINFO,
};
use windows::Win32::UI::WindowsAndMessaging::{GetMessageW, PostThreadMessageW, MSG, WM_HOTKEY, WM_QUIT};

use super::keymap;
use crate::hotkey::{HotkeyBackend, HotkeyError, HotkeyId, KeyCode, KeyCombination, KeySynth, QuitHandle};
use crate::idle::{IdleError, IdleSource};

/// Thread-message-queue hotkeys
pub struct NativeHotkeys;

impl NativeHotkeys {
    pub fn new() -> Result<Self, HotkeyError> {
        Ok(Self)
    }
}

impl HotkeyBackend for NativeHotkeys {
    fn bind(&mut self, id: HotkeyId, combo: &KeyCombination) -> Result<(), HotkeyError> {
        let modifiers = HOT_KEY_MODIFIERS(keymap::win32_modifiers(&combo.modifiers));
        let vk = keymap::win32_vk(combo.key);
        unsafe { RegisterHotKey(HWND::default(), id.0 as i32, modifiers, vk) }.map_err(|e| {
            HotkeyError::Bind {
                combo: *combo,
                reason: e.to_string(),
            }
        })
    }

    fn unbind(&mut self, id: HotkeyId) -> Result<(), HotkeyError> {
        unsafe { UnregisterHotKey(HWND::default(), id.0 as i32) }
            .map_err(|e| HotkeyError::Os(e.to_string()))
    }

    fn quit_handle(&self) -> QuitHandle {
        let thread_id = unsafe { GetCurrentThreadId() };
        QuitHandle::new(move || {
            let _ = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
        })
    }

    fn run(
        &mut self,
        started: &mut dyn FnMut(),
        on_hotkey: &mut dyn FnMut(HotkeyId),
    ) -> Result<(), HotkeyError> {
        // RegisterHotKey already made the bindings live.
        started();
        let mut msg = MSG::default();
        loop {
            // Filtered to WM_HOTKEY so nothing else wakes this thread.
            let result = unsafe { GetMessageW(&mut msg, HWND::default(), WM_HOTKEY, WM_HOTKEY) };
            match result.0 {
                0 => return Ok(()),
                -1 => return Err(HotkeyError::Os(WinError::from_win32().to_string())),
                _ => {}
            }
            if msg.message == WM_HOTKEY {
                on_hotkey(HotkeyId(msg.wParam.0 as u32));
            }
        }
    }
}

/// `keybd_event` key synthesis
pub struct NativeKeySynth;

impl NativeKeySynth {
    pub fn new() -> Result<Self, HotkeyError> {
        Ok(Self)
    }

    fn send(&self, code: KeyCode, flags: KEYBD_EVENT_FLAGS) {
        let vk = keymap::win32_vk(code) as u8;
        unsafe { keybd_event(vk, 0, flags, 0) };
    }
}

impl KeySynth for NativeKeySynth {
    fn key_down(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.send(code, KEYBD_EVENT_FLAGS(0));
        Ok(())
    }

    fn key_up(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.send(code, KEYEVENTF_KEYUP);
        Ok(())
    }
}

/// `GetLastInputInfo` idle time
pub struct NativeIdle;

impl NativeIdle {
    pub fn new() -> Result<Self, IdleError> {
        Ok(Self)
    }
}

impl IdleSource for NativeIdle {
    fn inactive_millis(&self) -> Result<u64, IdleError> {
        let mut info = LASTINPUTINFO {
            cbSize: size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };
        if !unsafe { GetLastInputInfo(&mut info) }.as_bool() {
            return Err(IdleError::Query(WinError::from_win32().to_string()));
        }
        // Both are 32-bit tick counts that wrap every ~49 days.
        let now = unsafe { GetTickCount() };
        Ok(u64::from(now.wrapping_sub(info.dwTime)))
    }
}
