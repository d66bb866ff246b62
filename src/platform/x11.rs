//! X11 hotkeys, key synthesis and idle time
//!
//! Hotkeys are passive key grabs on the root window. Each combination is
//! grabbed once per lock-modifier variant so Caps Lock and Num Lock don't
//! hide it. The native-event thread blocks in `wait_for_event`; quit is a
//! client message sent to a private input-only window on the same
//! connection.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::{
    ClientMessageEvent, ConnectionExt, CreateWindowAux, EventMask, GrabMode, Keycode, ModMask,
    Window, WindowClass, KEY_PRESS_EVENT, KEY_RELEASE_EVENT,
};
use x11rb::protocol::{screensaver, xtest, ErrorKind, Event};
use x11rb::rust_connection::RustConnection;
use x11rb::CURRENT_TIME;

use super::keymap;
use crate::hotkey::{HotkeyBackend, HotkeyError, HotkeyId, KeyCode, KeyCombination, KeySynth, QuitHandle};
use crate::idle::{IdleError, IdleSource};

const QUIT_ATOM_NAME: &[u8] = b"DESKMATE_HOTKEYS_QUIT";

fn connect() -> Result<(RustConnection, Window), String> {
    let (conn, screen_num) = x11rb::connect(None).map_err(|e| e.to_string())?;
    let root = conn
        .setup()
        .roots
        .get(screen_num)
        .map(|screen| screen.root)
        .ok_or_else(|| format!("invalid screen number {}", screen_num))?;
    Ok((conn, root))
}

/// Finds the first keycode whose mapping carries `keysym` in any column.
fn keycode_for(conn: &RustConnection, keysym: u32) -> Result<Option<Keycode>, String> {
    let setup = conn.setup();
    let (min, max) = (setup.min_keycode, setup.max_keycode);
    let mapping = conn
        .get_keyboard_mapping(min, max - min + 1)
        .map_err(|e| e.to_string())?
        .reply()
        .map_err(|e| e.to_string())?;

    let per = usize::from(mapping.keysyms_per_keycode);
    if per == 0 {
        return Ok(None);
    }
    Ok(mapping
        .keysyms
        .chunks(per)
        .position(|syms| syms.contains(&keysym))
        .map(|offset| min + offset as u8))
}

fn resolve(conn: &RustConnection, code: KeyCode) -> Result<Keycode, String> {
    let keysym = keymap::x11_keysym(code).ok_or_else(|| format!("no keysym for {}", code.name()))?;
    keycode_for(conn, keysym)?.ok_or_else(|| format!("{} is not on the keyboard map", code.name()))
}

struct Grab {
    id: HotkeyId,
    keycode: Keycode,
    modifiers: u16,
}

/// Root-window key grabs
pub struct NativeHotkeys {
    conn: Arc<RustConnection>,
    root: Window,
    quit_window: Window,
    quit_atom: u32,
    grabs: Vec<Grab>,
}

impl NativeHotkeys {
    pub fn new() -> Result<Self, HotkeyError> {
        let (conn, root) = connect().map_err(HotkeyError::Os)?;
        let os = |e: &dyn std::fmt::Display| HotkeyError::Os(e.to_string());

        let quit_window = conn.generate_id().map_err(|e| os(&e))?;
        conn.create_window(
            0,
            quit_window,
            root,
            0,
            0,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            0,
            &CreateWindowAux::new(),
        )
        .map_err(|e| os(&e))?;
        let quit_atom = conn
            .intern_atom(false, QUIT_ATOM_NAME)
            .map_err(|e| os(&e))?
            .reply()
            .map_err(|e| os(&e))?
            .atom;
        conn.flush().map_err(|e| os(&e))?;

        Ok(Self {
            conn: Arc::new(conn),
            root,
            quit_window,
            quit_atom,
            grabs: Vec::new(),
        })
    }

    fn ungrab(&self, keycode: Keycode, modifiers: u16) {
        for lock in keymap::X11_LOCK_VARIANTS {
            if let Err(e) = self
                .conn
                .ungrab_key(keycode, self.root, ModMask::from(modifiers | lock))
            {
                warn!("ungrab_key failed: {}", e);
            }
        }
    }
}

impl HotkeyBackend for NativeHotkeys {
    fn bind(&mut self, id: HotkeyId, combo: &KeyCombination) -> Result<(), HotkeyError> {
        let fail = |reason: String| HotkeyError::Bind {
            combo: *combo,
            reason,
        };
        let keycode = resolve(&self.conn, combo.key).map_err(fail)?;
        let modifiers = keymap::x11_modifiers(&combo.modifiers);

        for lock in keymap::X11_LOCK_VARIANTS {
            let checked = self
                .conn
                .grab_key(
                    false,
                    self.root,
                    ModMask::from(modifiers | lock),
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )
                .map_err(|e| e.to_string())
                .and_then(|cookie| {
                    cookie.check().map_err(|e| match e {
                        ReplyError::X11Error(ref x) if x.error_kind == ErrorKind::Access => {
                            "already grabbed by another client".to_string()
                        }
                        other => other.to_string(),
                    })
                });
            if let Err(reason) = checked {
                self.ungrab(keycode, modifiers);
                let _ = self.conn.flush();
                return Err(fail(reason));
            }
        }

        debug!("grabbed keycode {} mask {:#x} for {}", keycode, modifiers, id);
        self.grabs.push(Grab {
            id,
            keycode,
            modifiers,
        });
        Ok(())
    }

    fn unbind(&mut self, id: HotkeyId) -> Result<(), HotkeyError> {
        let Some(pos) = self.grabs.iter().position(|g| g.id == id) else {
            return Ok(());
        };
        let grab = self.grabs.remove(pos);
        self.ungrab(grab.keycode, grab.modifiers);
        self.conn
            .flush()
            .map_err(|e| HotkeyError::Os(e.to_string()))
    }

    fn quit_handle(&self) -> QuitHandle {
        let conn = Arc::clone(&self.conn);
        let window = self.quit_window;
        let atom = self.quit_atom;
        QuitHandle::new(move || {
            let event = ClientMessageEvent::new(32, window, atom, [0u32; 5]);
            if let Err(e) = conn.send_event(false, window, EventMask::NO_EVENT, event) {
                warn!("failed to send quit message: {}", e);
            }
            let _ = conn.flush();
        })
    }

    fn run(
        &mut self,
        started: &mut dyn FnMut(),
        on_hotkey: &mut dyn FnMut(HotkeyId),
    ) -> Result<(), HotkeyError> {
        // The grabs are live once bind has flushed them.
        started();
        let mut repeats = RepeatFilter::default();
        loop {
            let event = self
                .conn
                .wait_for_event()
                .map_err(|e| HotkeyError::Os(e.to_string()))?;
            match event {
                Event::KeyPress(press) => {
                    if !repeats.press(press.detail, press.time) {
                        continue;
                    }
                    let state = u16::from(press.state) & keymap::X11_RELEVANT;
                    for grab in &self.grabs {
                        if grab.keycode == press.detail && grab.modifiers == state {
                            on_hotkey(grab.id);
                        }
                    }
                }
                Event::KeyRelease(release) => repeats.release(release.detail, release.time),
                Event::ClientMessage(msg)
                    if msg.window == self.quit_window && msg.type_ == self.quit_atom =>
                {
                    return Ok(());
                }
                _ => {}
            }
        }
    }
}

/// Separates the first press of a held key from its auto-repeats.
///
/// With detectable auto-repeat the server sends repeated presses with no
/// release in between. Without it every repeat is a release and a press
/// carrying the same timestamp.
#[derive(Default)]
struct RepeatFilter {
    held: HashSet<Keycode>,
    released_at: HashMap<Keycode, u32>,
}

impl RepeatFilter {
    /// Returns true for a fresh press.
    fn press(&mut self, keycode: Keycode, time: u32) -> bool {
        let synthetic = self.released_at.remove(&keycode) == Some(time);
        self.held.insert(keycode) && !synthetic
    }

    fn release(&mut self, keycode: Keycode, time: u32) {
        self.held.remove(&keycode);
        self.released_at.insert(keycode, time);
    }
}

impl Drop for NativeHotkeys {
    fn drop(&mut self) {
        let _ = self.conn.destroy_window(self.quit_window);
        let _ = self.conn.flush();
    }
}

/// XTEST key synthesis
pub struct NativeKeySynth {
    conn: RustConnection,
    root: Window,
}

impl NativeKeySynth {
    pub fn new() -> Result<Self, HotkeyError> {
        let (conn, root) = connect().map_err(HotkeyError::Os)?;
        Ok(Self { conn, root })
    }

    fn fake(&self, code: KeyCode, event_type: u8) -> Result<(), HotkeyError> {
        let keycode = resolve(&self.conn, code).map_err(HotkeyError::Os)?;
        xtest::fake_input(&self.conn, event_type, keycode, CURRENT_TIME, self.root, 0, 0, 0)
            .map_err(|e| HotkeyError::Os(e.to_string()))?;
        self.conn
            .flush()
            .map_err(|e| HotkeyError::Os(e.to_string()))
    }
}

impl KeySynth for NativeKeySynth {
    fn key_down(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.fake(code, KEY_PRESS_EVENT)
    }

    fn key_up(&self, code: KeyCode) -> Result<(), HotkeyError> {
        self.fake(code, KEY_RELEASE_EVENT)
    }
}

/// MIT-SCREEN-SAVER idle time
pub struct NativeIdle {
    conn: RustConnection,
    root: Window,
}

impl NativeIdle {
    pub fn new() -> Result<Self, IdleError> {
        let (conn, root) = connect().map_err(IdleError::Query)?;
        Ok(Self { conn, root })
    }
}

impl IdleSource for NativeIdle {
    fn inactive_millis(&self) -> Result<u64, IdleError> {
        let info = screensaver::query_info(&self.conn, self.root)
            .map_err(|e| IdleError::Query(e.to_string()))?
            .reply()
            .map_err(|e| IdleError::Query(e.to_string()))?;
        Ok(u64::from(info.ms_since_user_input))
    }
}
