//! Keystroke planning for `vmcli mks`.
//!
//! Letters and digits are batched into `sendKeySequence` strings; every
//! other character becomes one `sendKeyEvent` carrying a USB HID usage.

use crate::controller::Controller;
use log::debug;
use vmws_core::{VmwsError, VmwsResult};

// ── HID usages (keyboard page 0x07) ─────────────────────────────────

pub mod hid {
    pub const ENTER: u8 = 0x28;
    pub const ESCAPE: u8 = 0x29;
    pub const BACKSPACE: u8 = 0x2A;
    pub const TAB: u8 = 0x2B;
    pub const SPACE: u8 = 0x2C;
    pub const MINUS: u8 = 0x2D;
    pub const EQUAL: u8 = 0x2E;
    pub const LEFT_BRACKET: u8 = 0x2F;
    pub const RIGHT_BRACKET: u8 = 0x30;
    pub const BACKSLASH: u8 = 0x31;
    pub const SEMICOLON: u8 = 0x33;
    pub const QUOTE: u8 = 0x34;
    pub const GRAVE: u8 = 0x35;
    pub const COMMA: u8 = 0x36;
    pub const PERIOD: u8 = 0x37;
    pub const SLASH: u8 = 0x38;
    pub const DELETE: u8 = 0x4C;
}

/// Keyboard usage page, low half of every event code.
const KEYBOARD_PAGE: u32 = 0x0007;

/// Left shift in the `sendKeyEvent` modifier mask.
pub const MOD_SHIFT: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Sequence(String),
    Event { code: u32, modifier: u32 },
}

/// HID usage and shift state for one ASCII character.
pub fn hid_usage(c: u8) -> Option<(u8, bool)> {
    let plain = |u| Some((u, false));
    let shifted = |u| Some((u, true));
    match c {
        b'a'..=b'z' => plain(0x04 + (c - b'a')),
        b'A'..=b'Z' => shifted(0x04 + (c - b'A')),
        b'1'..=b'9' => plain(0x1E + (c - b'1')),
        b'0' => plain(0x27),
        b'\n' | b'\r' => plain(hid::ENTER),
        0x1B => plain(hid::ESCAPE),
        0x08 => plain(hid::BACKSPACE),
        b'\t' => plain(hid::TAB),
        b' ' => plain(hid::SPACE),
        b'-' => plain(hid::MINUS),
        b'=' => plain(hid::EQUAL),
        b'[' => plain(hid::LEFT_BRACKET),
        b']' => plain(hid::RIGHT_BRACKET),
        b'\\' => plain(hid::BACKSLASH),
        b';' => plain(hid::SEMICOLON),
        b'\'' => plain(hid::QUOTE),
        b'`' => plain(hid::GRAVE),
        b',' => plain(hid::COMMA),
        b'.' => plain(hid::PERIOD),
        b'/' => plain(hid::SLASH),
        0x7F => plain(hid::DELETE),
        b'!' => shifted(0x1E),
        b'@' => shifted(0x1F),
        b'#' => shifted(0x20),
        b'$' => shifted(0x21),
        b'%' => shifted(0x22),
        b'^' => shifted(0x23),
        b'&' => shifted(0x24),
        b'*' => shifted(0x25),
        b'(' => shifted(0x26),
        b')' => shifted(0x27),
        b'_' => shifted(hid::MINUS),
        b'+' => shifted(hid::EQUAL),
        b'{' => shifted(hid::LEFT_BRACKET),
        b'}' => shifted(hid::RIGHT_BRACKET),
        b'|' => shifted(hid::BACKSLASH),
        b':' => shifted(hid::SEMICOLON),
        b'"' => shifted(hid::QUOTE),
        b'~' => shifted(hid::GRAVE),
        b'<' => shifted(hid::COMMA),
        b'>' => shifted(hid::PERIOD),
        b'?' => shifted(hid::SLASH),
        _ => None,
    }
}

/// `sendKeyEvent` code for a HID usage.
pub fn event_code(usage: u8) -> u32 {
    ((usage as u32) << 16) | KEYBOARD_PAGE
}

/// Decode C-style escapes. Non-ASCII input is rejected.
pub fn decode_escapes(s: &str) -> VmwsResult<Vec<u8>> {
    if let Some(c) = s.chars().find(|c| !c.is_ascii()) {
        return Err(VmwsError::unencodable(format!(
            "multi-byte character '{}' cannot be typed",
            c
        )));
    }
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&e) = bytes.get(i) else {
            return Err(VmwsError::invalid_input("trailing backslash in key string"));
        };
        i += 1;
        let decoded = match e {
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'\\' => b'\\',
            b'\'' => b'\'',
            b'"' => b'"',
            b'a' => 0x07,
            b'b' => 0x08,
            b'e' => 0x1B,
            b'f' => 0x0C,
            b'v' => 0x0B,
            b'0' => 0x00,
            b'x' => {
                let hex = bytes
                    .get(i..i + 2)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| VmwsError::invalid_input("\\x needs two hex digits"))?;
                i += 2;
                if !hex.is_ascii() {
                    return Err(VmwsError::unencodable(format!("byte 0x{:02x} is not ASCII", hex)));
                }
                hex
            }
            other => {
                return Err(VmwsError::invalid_input(format!(
                    "unknown escape '\\{}'",
                    other as char
                )))
            }
        };
        out.push(decoded);
    }
    Ok(out)
}

/// Split `keys` into sequences and events.
pub fn plan(keys: &str) -> VmwsResult<Vec<KeyAction>> {
    let bytes = decode_escapes(keys)?;
    let mut actions = Vec::new();
    let mut buf = String::new();
    for b in bytes {
        if b.is_ascii_alphanumeric() {
            buf.push(b as char);
            continue;
        }
        if !buf.is_empty() {
            actions.push(KeyAction::Sequence(std::mem::take(&mut buf)));
        }
        let (usage, shift) = hid_usage(b).ok_or_else(|| {
            VmwsError::unencodable(format!("no key for character 0x{:02x}", b))
        })?;
        actions.push(KeyAction::Event {
            code: event_code(usage),
            modifier: if shift { MOD_SHIFT } else { 0 },
        });
    }
    if !buf.is_empty() {
        actions.push(KeyAction::Sequence(buf));
    }
    Ok(actions)
}

impl Controller {
    /// Type `keys` into the instance console. Returns the number of
    /// `vmcli mks` calls issued.
    pub async fn send_keys(&mut self, key: &str, keys: &str) -> VmwsResult<usize> {
        let actions = plan(keys)?;
        let vid = self.resolve(key).await?;
        let cli = self.vmcli();
        for action in &actions {
            match action {
                KeyAction::Sequence(s) => cli.send_key_sequence(&vid, s).await?,
                KeyAction::Event { code, modifier } => {
                    cli.send_key_event(&vid, *code, *modifier).await?
                }
            }
        }
        debug!("{}: sent {} key actions", vid.name, actions.len());
        Ok(actions.len())
    }
}
