//! Hotkey string parsing.
//!
//! Hotkeys are written in configuration as `+`-separated tokens such as
//! `"CTRL+ALT+F12"`.  Parsing turns them into the two numbers the Win32
//! `RegisterHotKey` call takes: a modifier bit mask and a virtual-key code.
//! Registration itself is the job of whatever UI hosts the switcher; this
//! module only validates and translates.
//!
//! # Accepted tokens
//!
//! Matching is case-insensitive.
//!
//! | Token                       | Meaning                     |
//! |-----------------------------|-----------------------------|
//! | `CTRL`, `ALT`, `SHIFT`, `WIN` | modifier bits             |
//! | `0`–`9`                     | `VK_0`–`VK_9` (0x30–0x39)   |
//! | `A`–`Z`                     | `VK_A`–`VK_Z` (0x41–0x5A)   |
//! | `F1`–`F24`                  | `VK_F1`–`VK_F24` (0x70–0x87)|
//!
//! When several key tokens appear, the last one wins.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const MOD_ALT: u32 = 0x0001;
pub const MOD_CONTROL: u32 = 0x0002;
pub const MOD_SHIFT: u32 = 0x0004;
pub const MOD_WIN: u32 = 0x0008;

const VK_0: u32 = 0x30;
const VK_A: u32 = 0x41;
const VK_F1: u32 = 0x70;

/// Errors produced by [`HotkeySpec::parse`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("hotkey string is empty")]
    Empty,

    #[error("unknown hotkey token {0:?}")]
    UnknownToken(String),

    /// Only modifiers were given.
    #[error("hotkey {0:?} has no key, only modifiers")]
    MissingKey(String),
}

/// A parsed hotkey: Win32 `MOD_*` bits plus a virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeySpec {
    pub modifiers: u32,
    pub vk: u32,
}

impl HotkeySpec {
    /// Parses a string such as `"ctrl+alt+f12"`.
    ///
    /// # Errors
    ///
    /// - [`HotkeyError::Empty`] for an empty or whitespace-only string.
    /// - [`HotkeyError::UnknownToken`] for a token that is neither a modifier
    ///   nor a supported key, including empty tokens from `"CTRL++A"`.
    /// - [`HotkeyError::MissingKey`] when no key token is present.
    pub fn parse(text: &str) -> Result<Self, HotkeyError> {
        let upper = text.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(HotkeyError::Empty);
        }

        let mut modifiers = 0;
        let mut vk = None;
        for token in upper.split('+').map(str::trim) {
            if let Some(bit) = modifier_bit(token) {
                modifiers |= bit;
            } else if let Some(code) = virtual_key(token) {
                vk = Some(code);
            } else {
                return Err(HotkeyError::UnknownToken(token.to_owned()));
            }
        }

        match vk {
            Some(vk) => Ok(Self { modifiers, vk }),
            None => Err(HotkeyError::MissingKey(text.to_owned())),
        }
    }
}

impl FromStr for HotkeySpec {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HotkeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (bit, name) in [
            (MOD_CONTROL, "CTRL"),
            (MOD_ALT, "ALT"),
            (MOD_SHIFT, "SHIFT"),
            (MOD_WIN, "WIN"),
        ] {
            if self.modifiers & bit != 0 {
                write!(f, "{name}+")?;
            }
        }
        match self.vk {
            v @ 0x30..=0x39 | v @ 0x41..=0x5A => {
                write!(f, "{}", char::from_u32(v).unwrap_or('?'))
            }
            v @ 0x70..=0x87 => write!(f, "F{}", v - VK_F1 + 1),
            v => write!(f, "VK{v:#04X}"),
        }
    }
}

fn modifier_bit(token: &str) -> Option<u32> {
    match token {
        "CTRL" => Some(MOD_CONTROL),
        "ALT" => Some(MOD_ALT),
        "SHIFT" => Some(MOD_SHIFT),
        "WIN" => Some(MOD_WIN),
        _ => None,
    }
}

fn virtual_key(token: &str) -> Option<u32> {
    let bytes = token.as_bytes();
    if let [c] = bytes {
        return match c {
            b'0'..=b'9' => Some(VK_0 + u32::from(c - b'0')),
            b'A'..=b'Z' => Some(VK_A + u32::from(c - b'A')),
            _ => None,
        };
    }
    let n: u32 = token.strip_prefix('F')?.parse().ok()?;
    (1..=24).contains(&n).then(|| VK_F1 + n - 1)
}
