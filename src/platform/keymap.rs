//! Logical key codes to native codes, one fixed table per platform
//!
//! Kept free of OS calls so every table is checked on every platform.
#![cfg_attr(not(test), allow(dead_code))]

use crate::hotkey::{KeyCode, Modifiers};

pub const WIN32_MOD_ALT: u32 = 0x0001;
pub const WIN32_MOD_CONTROL: u32 = 0x0002;
pub const WIN32_MOD_SHIFT: u32 = 0x0004;
pub const WIN32_MOD_WIN: u32 = 0x0008;
pub const WIN32_MOD_NOREPEAT: u32 = 0x4000;

/// Win32 virtual-key code.
///
/// Keys whose logical code differs from the Win32 one go through the
/// exception table; everything else passes through unchanged.
pub fn win32_vk(code: KeyCode) -> u32 {
    match code {
        KeyCode::INSERT => 0x2D,
        KeyCode::DELETE => 0x2E,
        KeyCode::ENTER => 0x0D,
        KeyCode::COMMA => 0xBC,
        KeyCode::PERIOD => 0xBE,
        KeyCode::PLUS => 0xBB,
        KeyCode::MINUS => 0xBD,
        KeyCode::SLASH => 0xBF,
        KeyCode::SEMICOLON => 0xBA,
        KeyCode::PRINTSCREEN => 0x2C,
        KeyCode::EQUALS => 0xBB,
        KeyCode::OPEN_BRACKET => 0xDB,
        KeyCode::BACK_SLASH => 0xDC,
        KeyCode::CLOSE_BRACKET => 0xDD,
        KeyCode::META => 0x5B,
        other => u32::from(other.0),
    }
}

/// `RegisterHotKey` modifier mask. Always includes MOD_NOREPEAT so a held
/// combination fires once.
pub fn win32_modifiers(modifiers: &Modifiers) -> u32 {
    let mut mask = WIN32_MOD_NOREPEAT;
    if modifiers.shift {
        mask |= WIN32_MOD_SHIFT;
    }
    if modifiers.control {
        mask |= WIN32_MOD_CONTROL;
    }
    if modifiers.alt {
        mask |= WIN32_MOD_ALT;
    }
    if modifiers.meta {
        mask |= WIN32_MOD_WIN;
    }
    mask
}

pub const X11_SHIFT: u16 = 1 << 0;
pub const X11_LOCK: u16 = 1 << 1;
pub const X11_CONTROL: u16 = 1 << 2;
pub const X11_MOD1: u16 = 1 << 3;
pub const X11_MOD2: u16 = 1 << 4;
pub const X11_MOD4: u16 = 1 << 6;

/// Modifier bits that take part in matching; CapsLock and NumLock do not.
pub const X11_RELEVANT: u16 = X11_SHIFT | X11_CONTROL | X11_MOD1 | X11_MOD4;

/// Extra bits each X11 grab is repeated with.
pub const X11_LOCK_VARIANTS: [u16; 4] = [0, X11_LOCK, X11_MOD2, X11_LOCK | X11_MOD2];

pub fn x11_modifiers(modifiers: &Modifiers) -> u16 {
    let mut mask = 0;
    if modifiers.shift {
        mask |= X11_SHIFT;
    }
    if modifiers.control {
        mask |= X11_CONTROL;
    }
    if modifiers.alt {
        mask |= X11_MOD1;
    }
    if modifiers.meta {
        mask |= X11_MOD4;
    }
    mask
}

/// X11 keysym for a logical key.
pub fn x11_keysym(code: KeyCode) -> Option<u32> {
    if let Some(c) = code.as_char() {
        // Letters are grabbed by their unshifted (lower-case) keysym.
        return Some(u32::from(c.to_ascii_lowercase()));
    }
    if let Some(n) = code.function_number() {
        return Some(0xFFBE + u32::from(n) - 1);
    }
    let keysym = match code {
        KeyCode::BACK_SPACE => 0xFF08,
        KeyCode::TAB => 0xFF09,
        KeyCode::ENTER => 0xFF0D,
        KeyCode::PAUSE => 0xFF13,
        KeyCode::ESCAPE => 0xFF1B,
        KeyCode::HOME => 0xFF50,
        KeyCode::LEFT => 0xFF51,
        KeyCode::UP => 0xFF52,
        KeyCode::RIGHT => 0xFF53,
        KeyCode::DOWN => 0xFF54,
        KeyCode::PAGE_UP => 0xFF55,
        KeyCode::PAGE_DOWN => 0xFF56,
        KeyCode::END => 0xFF57,
        KeyCode::PRINTSCREEN => 0xFF61,
        KeyCode::INSERT => 0xFF63,
        KeyCode::SHIFT => 0xFFE1,
        KeyCode::CONTROL => 0xFFE3,
        KeyCode::CAPS_LOCK => 0xFFE5,
        KeyCode::ALT => 0xFFE9,
        KeyCode::META => 0xFFEB,
        KeyCode::DELETE => 0xFFFF,
        KeyCode::SPACE => 0x20,
        KeyCode::QUOTE => 0x27,
        KeyCode::PLUS => 0x2B,
        KeyCode::COMMA => 0x2C,
        KeyCode::MINUS => 0x2D,
        KeyCode::PERIOD => 0x2E,
        KeyCode::SLASH => 0x2F,
        KeyCode::SEMICOLON => 0x3B,
        KeyCode::EQUALS => 0x3D,
        KeyCode::OPEN_BRACKET => 0x5B,
        KeyCode::BACK_SLASH => 0x5C,
        KeyCode::CLOSE_BRACKET => 0x5D,
        KeyCode::BACK_QUOTE => 0x60,
        _ => return None,
    };
    Some(keysym)
}

/// macOS virtual key code (ANSI layout).
pub fn mac_keycode(code: KeyCode) -> Option<u16> {
    if let Some(c) = code.as_char() {
        let keycode = match c {
            'A' => 0x00,
            'S' => 0x01,
            'D' => 0x02,
            'F' => 0x03,
            'H' => 0x04,
            'G' => 0x05,
            'Z' => 0x06,
            'X' => 0x07,
            'C' => 0x08,
            'V' => 0x09,
            'B' => 0x0B,
            'Q' => 0x0C,
            'W' => 0x0D,
            'E' => 0x0E,
            'R' => 0x0F,
            'Y' => 0x10,
            'T' => 0x11,
            '1' => 0x12,
            '2' => 0x13,
            '3' => 0x14,
            '4' => 0x15,
            '6' => 0x16,
            '5' => 0x17,
            '9' => 0x19,
            '7' => 0x1A,
            '8' => 0x1C,
            '0' => 0x1D,
            'O' => 0x1F,
            'U' => 0x20,
            'I' => 0x22,
            'P' => 0x23,
            'L' => 0x25,
            'J' => 0x26,
            'K' => 0x28,
            'N' => 0x2D,
            'M' => 0x2E,
            _ => return None,
        };
        return Some(keycode);
    }
    if let Some(n) = code.function_number() {
        const F_KEYS: [u16; 12] = [
            0x7A, 0x78, 0x63, 0x76, 0x60, 0x61, 0x62, 0x64, 0x65, 0x6D, 0x67, 0x6F,
        ];
        return Some(F_KEYS[usize::from(n) - 1]);
    }
    let keycode = match code {
        KeyCode::EQUALS | KeyCode::PLUS => 0x18,
        KeyCode::MINUS => 0x1B,
        KeyCode::CLOSE_BRACKET => 0x1E,
        KeyCode::OPEN_BRACKET => 0x21,
        KeyCode::ENTER => 0x24,
        KeyCode::QUOTE => 0x27,
        KeyCode::SEMICOLON => 0x29,
        KeyCode::BACK_SLASH => 0x2A,
        KeyCode::COMMA => 0x2B,
        KeyCode::SLASH => 0x2C,
        KeyCode::PERIOD => 0x2F,
        KeyCode::TAB => 0x30,
        KeyCode::SPACE => 0x31,
        KeyCode::BACK_QUOTE => 0x32,
        KeyCode::BACK_SPACE => 0x33,
        KeyCode::ESCAPE => 0x35,
        KeyCode::META => 0x37,
        KeyCode::SHIFT => 0x38,
        KeyCode::CAPS_LOCK => 0x39,
        KeyCode::ALT => 0x3A,
        KeyCode::CONTROL => 0x3B,
        KeyCode::PRINTSCREEN => 0x69,
        KeyCode::PAUSE => 0x71,
        KeyCode::INSERT => 0x72,
        KeyCode::HOME => 0x73,
        KeyCode::PAGE_UP => 0x74,
        KeyCode::DELETE => 0x75,
        KeyCode::END => 0x77,
        KeyCode::PAGE_DOWN => 0x79,
        KeyCode::LEFT => 0x7B,
        KeyCode::RIGHT => 0x7C,
        KeyCode::DOWN => 0x7D,
        KeyCode::UP => 0x7E,
        _ => return None,
    };
    Some(keycode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::KeyCombination;

    #[test]
    fn test_win32_exception_table() {
        assert_eq!(win32_vk(KeyCode::INSERT), 0x2D);
        assert_eq!(win32_vk(KeyCode::DELETE), 0x2E);
        assert_eq!(win32_vk(KeyCode::ENTER), 0x0D);
        assert_eq!(win32_vk(KeyCode::COMMA), 0xBC);
        assert_eq!(win32_vk(KeyCode::PERIOD), 0xBE);
        assert_eq!(win32_vk(KeyCode::PLUS), 0xBB);
        assert_eq!(win32_vk(KeyCode::MINUS), 0xBD);
        assert_eq!(win32_vk(KeyCode::SLASH), 0xBF);
        assert_eq!(win32_vk(KeyCode::SEMICOLON), 0xBA);
        assert_eq!(win32_vk(KeyCode::PRINTSCREEN), 0x2C);
    }

    #[test]
    fn test_win32_pass_through() {
        assert_eq!(win32_vk(KeyCode::from_char('V').unwrap()), 0x56);
        assert_eq!(win32_vk(KeyCode::from_char('7').unwrap()), 0x37);
        assert_eq!(win32_vk(KeyCode::F1), 0x70);
        assert_eq!(win32_vk(KeyCode::HOME), 0x24);
        assert_eq!(win32_vk(KeyCode::CONTROL), 0x11);
    }

    #[test]
    fn test_win32_modifiers() {
        let combo: KeyCombination = "ctrl shift INSERT".parse().unwrap();
        assert_eq!(
            win32_modifiers(&combo.modifiers),
            WIN32_MOD_CONTROL | WIN32_MOD_SHIFT | WIN32_MOD_NOREPEAT
        );
        let combo: KeyCombination = "alt meta A".parse().unwrap();
        assert_eq!(
            win32_modifiers(&combo.modifiers),
            WIN32_MOD_ALT | WIN32_MOD_WIN | WIN32_MOD_NOREPEAT
        );
    }

    #[test]
    fn test_x11_keysyms() {
        assert_eq!(x11_keysym(KeyCode::from_char('V').unwrap()), Some(0x76));
        assert_eq!(x11_keysym(KeyCode::from_char('3').unwrap()), Some(0x33));
        assert_eq!(x11_keysym(KeyCode::F1), Some(0xFFBE));
        assert_eq!(x11_keysym(KeyCode::F12), Some(0xFFC9));
        assert_eq!(x11_keysym(KeyCode::INSERT), Some(0xFF63));
        assert_eq!(x11_keysym(KeyCode(0x01)), None);
    }

    #[test]
    fn test_x11_modifiers_ignore_locks() {
        let combo: KeyCombination = "ctrl alt P".parse().unwrap();
        let mask = x11_modifiers(&combo.modifiers);
        assert_eq!(mask, X11_CONTROL | X11_MOD1);
        for extra in X11_LOCK_VARIANTS {
            assert_eq!((mask | extra) & X11_RELEVANT, mask);
        }
    }

    #[test]
    fn test_mac_keycodes() {
        assert_eq!(mac_keycode(KeyCode::from_char('A').unwrap()), Some(0x00));
        assert_eq!(mac_keycode(KeyCode::from_char('V').unwrap()), Some(0x09));
        assert_eq!(mac_keycode(KeyCode::function(5).unwrap()), Some(0x60));
        assert_eq!(mac_keycode(KeyCode::INSERT), Some(0x72));
        assert_eq!(mac_keycode(KeyCode(0x01)), None);
    }
}
