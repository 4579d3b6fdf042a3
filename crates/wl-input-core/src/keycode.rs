//! Character and platform keycode translation to Linux evdev keycodes
//!
//! The compositor core consumes evdev keycodes and runs its own XKB state,
//! so every key this layer injects is expressed as an [`evdev::Key`]:
//!
//! - [`map`] turns a committed character into a keycode plus a flag telling
//!   whether Shift must be held to produce it (US layout).
//! - [`android_keycode_to_linux`] translates hardware `KeyEvent` keycodes.
//! - [`parse_key`] resolves human-readable key names from configuration.
//!
//! The character table covers printable ASCII that exists on a US keyboard,
//! plus space, tab and newline. Everything else (non-ASCII, emoji, surrogate
//! halves) is unmapped and must travel through the text-commit protocol.

use std::str::FromStr;

use evdev::Key;
use serde::Serialize;

/// Keycode and shift requirement for one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyMapping {
    pub key: Key,
    pub needs_shift: bool,
}

impl KeyMapping {
    const fn plain(key: Key) -> Self {
        Self {
            key,
            needs_shift: false,
        }
    }

    const fn shifted(key: Key) -> Self {
        Self {
            key,
            needs_shift: true,
        }
    }

    /// Raw evdev keycode.
    pub fn keycode(&self) -> u16 {
        self.key.code()
    }
}

impl Serialize for KeyMapping {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("KeyMapping", 2)?;
        s.serialize_field("keycode", &self.keycode())?;
        s.serialize_field("needs_shift", &self.needs_shift)?;
        s.end()
    }
}

/// evdev keycodes for `a`..`z`; the kernel numbering follows the physical
/// QWERTY rows, not the alphabet.
const LETTER_KEYS: [Key; 26] = [
    Key::KEY_A,
    Key::KEY_B,
    Key::KEY_C,
    Key::KEY_D,
    Key::KEY_E,
    Key::KEY_F,
    Key::KEY_G,
    Key::KEY_H,
    Key::KEY_I,
    Key::KEY_J,
    Key::KEY_K,
    Key::KEY_L,
    Key::KEY_M,
    Key::KEY_N,
    Key::KEY_O,
    Key::KEY_P,
    Key::KEY_Q,
    Key::KEY_R,
    Key::KEY_S,
    Key::KEY_T,
    Key::KEY_U,
    Key::KEY_V,
    Key::KEY_W,
    Key::KEY_X,
    Key::KEY_Y,
    Key::KEY_Z,
];

/// `1`..`9` then `0`, in keycode order.
const DIGIT_KEYS: [Key; 10] = [
    Key::KEY_1,
    Key::KEY_2,
    Key::KEY_3,
    Key::KEY_4,
    Key::KEY_5,
    Key::KEY_6,
    Key::KEY_7,
    Key::KEY_8,
    Key::KEY_9,
    Key::KEY_0,
];

/// Symbols typed with Shift held over `1`..`9`, `0`.
const SHIFTED_DIGITS: [u8; 10] = *b"!@#$%^&*()";

/// Punctuation keys with their unshifted and shifted characters.
const PUNCTUATION: [(u8, u8, Key); 11] = [
    (b'-', b'_', Key::KEY_MINUS),
    (b'=', b'+', Key::KEY_EQUAL),
    (b'[', b'{', Key::KEY_LEFTBRACE),
    (b']', b'}', Key::KEY_RIGHTBRACE),
    (b'\\', b'|', Key::KEY_BACKSLASH),
    (b';', b':', Key::KEY_SEMICOLON),
    (b'\'', b'"', Key::KEY_APOSTROPHE),
    (b'`', b'~', Key::KEY_GRAVE),
    (b',', b'<', Key::KEY_COMMA),
    (b'.', b'>', Key::KEY_DOT),
    (b'/', b'?', Key::KEY_SLASH),
];

const fn build_ascii_keymap() -> [Option<KeyMapping>; 128] {
    let mut table: [Option<KeyMapping>; 128] = [None; 128];

    let mut i = 0;
    while i < LETTER_KEYS.len() {
        table[b'a' as usize + i] = Some(KeyMapping::plain(LETTER_KEYS[i]));
        table[b'A' as usize + i] = Some(KeyMapping::shifted(LETTER_KEYS[i]));
        i += 1;
    }

    let mut i = 0;
    while i < DIGIT_KEYS.len() {
        let digit = if i == 9 { b'0' } else { b'1' + i as u8 };
        table[digit as usize] = Some(KeyMapping::plain(DIGIT_KEYS[i]));
        table[SHIFTED_DIGITS[i] as usize] = Some(KeyMapping::shifted(DIGIT_KEYS[i]));
        i += 1;
    }

    let mut i = 0;
    while i < PUNCTUATION.len() {
        let (plain, shifted, key) = PUNCTUATION[i];
        table[plain as usize] = Some(KeyMapping::plain(key));
        table[shifted as usize] = Some(KeyMapping::shifted(key));
        i += 1;
    }

    table[b' ' as usize] = Some(KeyMapping::plain(Key::KEY_SPACE));
    table[b'\t' as usize] = Some(KeyMapping::plain(Key::KEY_TAB));
    table[b'\n' as usize] = Some(KeyMapping::plain(Key::KEY_ENTER));
    table[b'\r' as usize] = Some(KeyMapping::plain(Key::KEY_ENTER));

    table
}

static ASCII_KEYMAP: [Option<KeyMapping>; 128] = build_ascii_keymap();

/// Map a character to the evdev key that types it on a US layout.
///
/// Returns `None` for anything outside the table; callers route such text
/// through the text-commit protocol instead of synthesizing key events.
pub fn map(ch: char) -> Option<KeyMapping> {
    if ch.is_ascii() {
        ASCII_KEYMAP[ch as usize]
    } else {
        None
    }
}

/// Same as [`map`] for a single UTF-16 code unit.
///
/// Surrogate halves never map: an astral character (emoji) can only be
/// delivered as text.
pub fn map_utf16(unit: u16) -> Option<KeyMapping> {
    if unit < 0x80 {
        ASCII_KEYMAP[unit as usize]
    } else {
        None
    }
}

/// Map every character of `text`, or `None` if any one of them is unmapped.
pub fn map_str(text: &str) -> Option<Vec<KeyMapping>> {
    text.chars().map(map).collect()
}

/// Android `KeyEvent` keycodes handled by this layer.
pub mod android {
    pub const KEYCODE_0: u32 = 7;
    pub const KEYCODE_9: u32 = 16;
    pub const KEYCODE_DPAD_UP: u32 = 19;
    pub const KEYCODE_DPAD_DOWN: u32 = 20;
    pub const KEYCODE_DPAD_LEFT: u32 = 21;
    pub const KEYCODE_DPAD_RIGHT: u32 = 22;
    pub const KEYCODE_DPAD_CENTER: u32 = 23;
    pub const KEYCODE_VOLUME_UP: u32 = 24;
    pub const KEYCODE_A: u32 = 29;
    pub const KEYCODE_Z: u32 = 54;
    pub const KEYCODE_COMMA: u32 = 55;
    pub const KEYCODE_PERIOD: u32 = 56;
    pub const KEYCODE_ALT_LEFT: u32 = 57;
    pub const KEYCODE_ALT_RIGHT: u32 = 58;
    pub const KEYCODE_SHIFT_LEFT: u32 = 59;
    pub const KEYCODE_SHIFT_RIGHT: u32 = 60;
    pub const KEYCODE_TAB: u32 = 61;
    pub const KEYCODE_SPACE: u32 = 62;
    pub const KEYCODE_ENTER: u32 = 66;
    pub const KEYCODE_DEL: u32 = 67;
    pub const KEYCODE_GRAVE: u32 = 68;
    pub const KEYCODE_MINUS: u32 = 69;
    pub const KEYCODE_EQUALS: u32 = 70;
    pub const KEYCODE_LEFT_BRACKET: u32 = 71;
    pub const KEYCODE_RIGHT_BRACKET: u32 = 72;
    pub const KEYCODE_BACKSLASH: u32 = 73;
    pub const KEYCODE_SEMICOLON: u32 = 74;
    pub const KEYCODE_APOSTROPHE: u32 = 75;
    pub const KEYCODE_SLASH: u32 = 76;
    pub const KEYCODE_DPAD_UP_2: u32 = 85;
    pub const KEYCODE_DPAD_DOWN_2: u32 = 86;
    pub const KEYCODE_DPAD_LEFT_2: u32 = 87;
    pub const KEYCODE_DPAD_RIGHT_2: u32 = 88;
    pub const KEYCODE_DPAD_CENTER_2: u32 = 89;
    pub const KEYCODE_PAGE_UP: u32 = 92;
    pub const KEYCODE_PAGE_DOWN: u32 = 93;
    pub const KEYCODE_ESCAPE: u32 = 111;
    pub const KEYCODE_FORWARD_DEL: u32 = 112;
    pub const KEYCODE_CTRL_LEFT: u32 = 113;
    pub const KEYCODE_CTRL_RIGHT: u32 = 114;
    pub const KEYCODE_META_LEFT: u32 = 117;
    pub const KEYCODE_META_RIGHT: u32 = 118;
    pub const KEYCODE_MOVE_HOME: u32 = 122;
    pub const KEYCODE_MOVE_END: u32 = 123;
    pub const KEYCODE_INSERT: u32 = 124;
}

/// Translate an Android hardware keycode to the matching evdev key.
///
/// Returns `None` for keys with no evdev counterpart in this layer (volume,
/// camera, media); those are dropped rather than forwarded with a wrong code.
pub fn android_keycode_to_linux(keycode: u32) -> Option<Key> {
    use android::*;

    match keycode {
        KEYCODE_A..=KEYCODE_Z => Some(LETTER_KEYS[(keycode - KEYCODE_A) as usize]),
        KEYCODE_0 => Some(Key::KEY_0),
        // KEYCODE_1..KEYCODE_9 are contiguous, like KEY_1..KEY_9
        k if (KEYCODE_0 + 1..=KEYCODE_9).contains(&k) => {
            Some(DIGIT_KEYS[(k - KEYCODE_0 - 1) as usize])
        }

        // Modifiers
        KEYCODE_CTRL_LEFT => Some(Key::KEY_LEFTCTRL),
        KEYCODE_CTRL_RIGHT => Some(Key::KEY_RIGHTCTRL),
        KEYCODE_SHIFT_LEFT => Some(Key::KEY_LEFTSHIFT),
        KEYCODE_SHIFT_RIGHT => Some(Key::KEY_RIGHTSHIFT),
        KEYCODE_ALT_LEFT => Some(Key::KEY_LEFTALT),
        KEYCODE_ALT_RIGHT => Some(Key::KEY_RIGHTALT),
        KEYCODE_META_LEFT => Some(Key::KEY_LEFTMETA),
        KEYCODE_META_RIGHT => Some(Key::KEY_RIGHTMETA),

        // Navigation
        KEYCODE_DPAD_UP | KEYCODE_DPAD_UP_2 => Some(Key::KEY_UP),
        KEYCODE_DPAD_DOWN | KEYCODE_DPAD_DOWN_2 => Some(Key::KEY_DOWN),
        KEYCODE_DPAD_LEFT | KEYCODE_DPAD_LEFT_2 => Some(Key::KEY_LEFT),
        KEYCODE_DPAD_RIGHT | KEYCODE_DPAD_RIGHT_2 => Some(Key::KEY_RIGHT),
        KEYCODE_MOVE_HOME => Some(Key::KEY_HOME),
        KEYCODE_MOVE_END => Some(Key::KEY_END),
        KEYCODE_PAGE_UP => Some(Key::KEY_PAGEUP),
        KEYCODE_PAGE_DOWN => Some(Key::KEY_PAGEDOWN),
        KEYCODE_INSERT => Some(Key::KEY_INSERT),

        // Editing
        KEYCODE_ENTER | KEYCODE_DPAD_CENTER | KEYCODE_DPAD_CENTER_2 => Some(Key::KEY_ENTER),
        KEYCODE_TAB => Some(Key::KEY_TAB),
        KEYCODE_SPACE => Some(Key::KEY_SPACE),
        KEYCODE_ESCAPE => Some(Key::KEY_ESC),
        KEYCODE_DEL => Some(Key::KEY_BACKSPACE),
        KEYCODE_FORWARD_DEL => Some(Key::KEY_DELETE),

        // Punctuation
        KEYCODE_COMMA => Some(Key::KEY_COMMA),
        KEYCODE_PERIOD => Some(Key::KEY_DOT),
        KEYCODE_SLASH => Some(Key::KEY_SLASH),
        KEYCODE_MINUS => Some(Key::KEY_MINUS),
        KEYCODE_EQUALS => Some(Key::KEY_EQUAL),
        KEYCODE_LEFT_BRACKET => Some(Key::KEY_LEFTBRACE),
        KEYCODE_RIGHT_BRACKET => Some(Key::KEY_RIGHTBRACE),
        KEYCODE_BACKSLASH => Some(Key::KEY_BACKSLASH),
        KEYCODE_SEMICOLON => Some(Key::KEY_SEMICOLON),
        KEYCODE_APOSTROPHE => Some(Key::KEY_APOSTROPHE),
        KEYCODE_GRAVE => Some(Key::KEY_GRAVE),

        _ => None,
    }
}

/// Parse a key name string to an evdev Key
///
/// NOTE: This must stay in sync with is_valid_key() in wl-input-config.
pub fn parse_key(name: &str) -> Option<Key> {
    let upper = name.to_uppercase();

    match upper.as_str() {
        "ESCAPE" | "ESC" => Some(Key::KEY_ESC),
        "ENTER" | "RETURN" => Some(Key::KEY_ENTER),
        "TAB" => Some(Key::KEY_TAB),
        "SPACE" => Some(Key::KEY_SPACE),
        "BACKSPACE" => Some(Key::KEY_BACKSPACE),

        // Modifiers
        "CTRL" | "CONTROL" => Some(Key::KEY_LEFTCTRL),
        "SHIFT" => Some(Key::KEY_LEFTSHIFT),
        "ALT" => Some(Key::KEY_LEFTALT),
        "SUPER" | "META" | "LOGO" | "WIN" => Some(Key::KEY_LEFTMETA),

        // Symbol keys
        "MINUS" | "-" => Some(Key::KEY_MINUS),
        "EQUALS" | "EQUAL" | "=" => Some(Key::KEY_EQUAL),
        "LEFTBRACE" | "LBRACE" | "[" => Some(Key::KEY_LEFTBRACE),
        "RIGHTBRACE" | "RBRACE" | "]" => Some(Key::KEY_RIGHTBRACE),
        "SEMICOLON" | ";" => Some(Key::KEY_SEMICOLON),
        "APOSTROPHE" | "'" => Some(Key::KEY_APOSTROPHE),
        "GRAVE" | "`" => Some(Key::KEY_GRAVE),
        "BACKSLASH" | "\\" => Some(Key::KEY_BACKSLASH),
        "COMMA" | "," => Some(Key::KEY_COMMA),
        "DOT" | "PERIOD" | "." => Some(Key::KEY_DOT),
        "SLASH" | "/" => Some(Key::KEY_SLASH),

        // Arrow keys
        "UP" => Some(Key::KEY_UP),
        "DOWN" => Some(Key::KEY_DOWN),
        "LEFT" => Some(Key::KEY_LEFT),
        "RIGHT" => Some(Key::KEY_RIGHT),

        // Navigation keys
        "HOME" => Some(Key::KEY_HOME),
        "END" => Some(Key::KEY_END),
        "PAGEUP" | "PGUP" => Some(Key::KEY_PAGEUP),
        "PAGEDOWN" | "PGDN" | "PGDOWN" => Some(Key::KEY_PAGEDOWN),
        "INSERT" | "INS" => Some(Key::KEY_INSERT),
        "DELETE" | "DEL" => Some(Key::KEY_DELETE),

        // Function keys
        "F1" => Some(Key::KEY_F1),
        "F2" => Some(Key::KEY_F2),
        "F3" => Some(Key::KEY_F3),
        "F4" => Some(Key::KEY_F4),
        "F5" => Some(Key::KEY_F5),
        "F6" => Some(Key::KEY_F6),
        "F7" => Some(Key::KEY_F7),
        "F8" => Some(Key::KEY_F8),
        "F9" => Some(Key::KEY_F9),
        "F10" => Some(Key::KEY_F10),
        "F11" => Some(Key::KEY_F11),
        "F12" => Some(Key::KEY_F12),

        // Single letters and digits share the character table
        s if s.len() == 1 && s.as_bytes()[0].is_ascii_alphanumeric() => {
            map(s.as_bytes()[0].to_ascii_lowercase() as char).map(|m| m.key)
        }

        _ => {
            // Raw kernel key names as an escape hatch
            if upper.starts_with("KEY_") {
                match Key::from_str(&upper) {
                    Ok(key) => return Some(key),
                    Err(_) => {
                        tracing::warn!("Unknown evdev key: {}", name);
                        return None;
                    }
                }
            }
            tracing::warn!("Unknown key: {}", name);
            None
        }
    }
}
