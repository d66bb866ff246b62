//! Key combination definitions and parsing
//!
//! Provides logical key codes, the modifier set, and the
//! `KeyCombination` type registered with the OS as a global hotkey.
//! Combinations are written the way users configure them, e.g.
//! `"ctrl shift INSERT"` or `"ctrl+alt+v"`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Logical virtual-key code.
///
/// Letters and digits use their upper-case ASCII value. Named keys use the
/// constants below. Each platform backend translates these into its own
/// native codes through a fixed table before talking to the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const BACK_SPACE: Self = Self(0x08);
    pub const TAB: Self = Self(0x09);
    pub const ENTER: Self = Self(0x0A);
    pub const SHIFT: Self = Self(0x10);
    pub const CONTROL: Self = Self(0x11);
    pub const ALT: Self = Self(0x12);
    pub const PAUSE: Self = Self(0x13);
    pub const CAPS_LOCK: Self = Self(0x14);
    pub const ESCAPE: Self = Self(0x1B);
    pub const SPACE: Self = Self(0x20);
    pub const PAGE_UP: Self = Self(0x21);
    pub const PAGE_DOWN: Self = Self(0x22);
    pub const END: Self = Self(0x23);
    pub const HOME: Self = Self(0x24);
    pub const LEFT: Self = Self(0x25);
    pub const UP: Self = Self(0x26);
    pub const RIGHT: Self = Self(0x27);
    pub const DOWN: Self = Self(0x28);
    pub const COMMA: Self = Self(0x2C);
    pub const MINUS: Self = Self(0x2D);
    pub const PERIOD: Self = Self(0x2E);
    pub const SLASH: Self = Self(0x2F);
    pub const SEMICOLON: Self = Self(0x3B);
    pub const EQUALS: Self = Self(0x3D);
    pub const OPEN_BRACKET: Self = Self(0x5B);
    pub const BACK_SLASH: Self = Self(0x5C);
    pub const CLOSE_BRACKET: Self = Self(0x5D);
    pub const F1: Self = Self(0x70);
    pub const F12: Self = Self(0x7B);
    pub const DELETE: Self = Self(0x7F);
    pub const PRINTSCREEN: Self = Self(0x9A);
    pub const INSERT: Self = Self(0x9B);
    pub const META: Self = Self(0x9D);
    pub const BACK_QUOTE: Self = Self(0xC0);
    pub const QUOTE: Self = Self(0xDE);
    pub const PLUS: Self = Self(0x0209);

    /// Key code for an ASCII letter or digit.
    pub fn from_char(c: char) -> Option<Self> {
        let c = c.to_ascii_uppercase();
        if c.is_ascii_uppercase() || c.is_ascii_digit() {
            Some(Self(c as u16))
        } else {
            None
        }
    }

    /// The letter or digit this code stands for, if any.
    pub fn as_char(self) -> Option<char> {
        let c = char::from_u32(u32::from(self.0))?;
        (c.is_ascii_uppercase() || c.is_ascii_digit()).then_some(c)
    }

    /// Function key number (1-12) if this is a function key.
    pub fn function_number(self) -> Option<u8> {
        (Self::F1.0..=Self::F12.0)
            .contains(&self.0)
            .then(|| (self.0 - Self::F1.0 + 1) as u8)
    }

    /// Function key `F<n>` for n in 1..=12.
    pub fn function(n: u8) -> Option<Self> {
        (1..=12).contains(&n).then(|| Self(Self::F1.0 + u16::from(n) - 1))
    }

    /// Whether this code is itself a modifier key.
    pub fn is_modifier(self) -> bool {
        matches!(self, Self::SHIFT | Self::CONTROL | Self::ALT | Self::META)
    }

    /// Parse a key name such as `INSERT`, `v`, `F5` or `BACK_SLASH`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.chars().count() == 1 {
            return upper.chars().next().and_then(Self::from_char);
        }
        if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
            return Self::function(n);
        }
        NAMED_KEYS
            .iter()
            .find(|(names, _)| names.contains(&upper.as_str()))
            .map(|(_, code)| *code)
    }

    /// Canonical name used when displaying a combination.
    pub fn name(self) -> String {
        if let Some(c) = self.as_char() {
            return c.to_string();
        }
        if let Some(n) = self.function_number() {
            return format!("F{}", n);
        }
        NAMED_KEYS
            .iter()
            .find(|(_, code)| *code == self)
            .map(|(names, _)| names[0].to_string())
            .unwrap_or_else(|| format!("0x{:X}", self.0))
    }
}

/// Named keys; the first name in each entry is the canonical one.
const NAMED_KEYS: &[(&[&str], KeyCode)] = &[
    (&["BACK_SPACE", "BACKSPACE"], KeyCode::BACK_SPACE),
    (&["TAB"], KeyCode::TAB),
    (&["ENTER", "RETURN"], KeyCode::ENTER),
    (&["SHIFT"], KeyCode::SHIFT),
    (&["CONTROL", "CTRL"], KeyCode::CONTROL),
    (&["ALT"], KeyCode::ALT),
    (&["PAUSE"], KeyCode::PAUSE),
    (&["CAPS_LOCK", "CAPSLOCK"], KeyCode::CAPS_LOCK),
    (&["ESCAPE", "ESC"], KeyCode::ESCAPE),
    (&["SPACE"], KeyCode::SPACE),
    (&["PAGE_UP", "PAGEUP"], KeyCode::PAGE_UP),
    (&["PAGE_DOWN", "PAGEDOWN"], KeyCode::PAGE_DOWN),
    (&["END"], KeyCode::END),
    (&["HOME"], KeyCode::HOME),
    (&["LEFT"], KeyCode::LEFT),
    (&["UP"], KeyCode::UP),
    (&["RIGHT"], KeyCode::RIGHT),
    (&["DOWN"], KeyCode::DOWN),
    (&["COMMA"], KeyCode::COMMA),
    (&["MINUS"], KeyCode::MINUS),
    (&["PERIOD"], KeyCode::PERIOD),
    (&["SLASH"], KeyCode::SLASH),
    (&["SEMICOLON"], KeyCode::SEMICOLON),
    (&["EQUALS"], KeyCode::EQUALS),
    (&["OPEN_BRACKET"], KeyCode::OPEN_BRACKET),
    (&["BACK_SLASH", "BACKSLASH"], KeyCode::BACK_SLASH),
    (&["CLOSE_BRACKET"], KeyCode::CLOSE_BRACKET),
    (&["DELETE", "DEL"], KeyCode::DELETE),
    (&["PRINTSCREEN", "PRINT_SCREEN"], KeyCode::PRINTSCREEN),
    (&["INSERT", "INS"], KeyCode::INSERT),
    (&["META", "WINDOWS", "SUPER"], KeyCode::META),
    (&["BACK_QUOTE", "BACKQUOTE"], KeyCode::BACK_QUOTE),
    (&["QUOTE"], KeyCode::QUOTE),
    (&["PLUS"], KeyCode::PLUS),
];

/// Modifier keys held as part of a combination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Shift key is held
    pub shift: bool,
    /// Control key is held
    pub control: bool,
    /// Alt/Option key is held
    pub alt: bool,
    /// Platform key (Windows/Super/Command) is held
    pub meta: bool,
}

impl Modifiers {
    /// Check if no modifier is part of the combination
    pub fn is_empty(&self) -> bool {
        !self.shift && !self.control && !self.alt && !self.meta
    }

    /// Set the modifier named by `word`, returning false if it is not one.
    fn set_from_word(&mut self, word: &str) -> bool {
        match word.to_ascii_lowercase().as_str() {
            "shift" => self.shift = true,
            "ctrl" | "control" => self.control = true,
            "alt" | "option" => self.alt = true,
            "meta" | "win" | "super" | "cmd" | "command" => self.meta = true,
            _ => return false,
        }
        true
    }
}

/// A key plus the modifiers that must be held with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombination {
    pub key: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyCombination {
    pub fn new(key: KeyCode, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// A combination without a key cannot be registered.
    pub fn is_empty(&self) -> bool {
        self.key.0 == 0
    }
}

/// Errors that can occur parsing a key combination
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseKeyError {
    #[error("key combination is empty")]
    Empty,

    #[error("unknown key name: {0}")]
    UnknownKey(String),

    #[error("key combination names more than one key: {0}")]
    MultipleKeys(String),

    #[error("key combination has modifiers but no key: {0}")]
    MissingKey(String),
}

impl FromStr for KeyCombination {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = s
            .split(|c: char| c.is_whitespace() || c == '+')
            .filter(|w| !w.is_empty())
            .collect();
        if words.is_empty() {
            return Err(ParseKeyError::Empty);
        }

        let mut modifiers = Modifiers::default();
        let mut key = None;
        // The word after `pressed` is always the key, even `SHIFT`.
        let mut key_next = false;
        for word in words {
            if key.is_none() && !key_next && word.eq_ignore_ascii_case("pressed") {
                key_next = true;
                continue;
            }
            if key.is_none() && !key_next && modifiers.set_from_word(word) {
                continue;
            }
            if key.is_some() {
                return Err(ParseKeyError::MultipleKeys(s.to_string()));
            }
            key = Some(
                KeyCode::from_name(word).ok_or_else(|| ParseKeyError::UnknownKey(word.to_string()))?,
            );
        }

        let key = key.ok_or_else(|| ParseKeyError::MissingKey(s.to_string()))?;
        Ok(Self { key, modifiers })
    }
}

impl fmt::Display for KeyCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        if m.control {
            write!(f, "ctrl ")?;
        }
        if m.shift {
            write!(f, "shift ")?;
        }
        if m.alt {
            write!(f, "alt ")?;
        }
        if m.meta {
            write!(f, "meta ")?;
        }
        if self.key.is_modifier() {
            write!(f, "pressed ")?;
        }
        write!(f, "{}", self.key.name())
    }
}

impl Serialize for KeyCombination {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyCombination {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
