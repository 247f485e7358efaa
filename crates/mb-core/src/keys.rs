use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Virtual key code as delivered to the target window.
pub type KeyCode = u16;

pub const VK_SHIFT: KeyCode = 0x10;
pub const VK_CONTROL: KeyCode = 0x11;
pub const VK_ALT: KeyCode = 0x12;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b001;
        const CONTROL = 0b010;
        const ALT = 0b100;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::empty()
    }
}

impl Modifiers {
    /// Modifier virtual keys in press order.
    pub fn key_codes(self) -> Vec<KeyCode> {
        let mut keys = Vec::with_capacity(3);
        if self.contains(Self::SHIFT) {
            keys.push(VK_SHIFT);
        }
        if self.contains(Self::CONTROL) {
            keys.push(VK_CONTROL);
        }
        if self.contains(Self::ALT) {
            keys.push(VK_ALT);
        }
        keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Keybind {
    pub key: KeyCode,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl Keybind {
    pub fn new(key: KeyCode, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub fn plain(key: KeyCode) -> Self {
        Self::new(key, Modifiers::empty())
    }

    /// True when every modifier `self` requires is held in `held`.
    pub fn matches(&self, key: KeyCode, held: Modifiers) -> bool {
        self.key == key && held.contains(self.modifiers)
    }
}

impl fmt::Display for Keybind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(Modifiers::SHIFT) {
            f.write_str("Shift+")?;
        }
        if self.modifiers.contains(Modifiers::CONTROL) {
            f.write_str("Ctrl+")?;
        }
        if self.modifiers.contains(Modifiers::ALT) {
            f.write_str("Alt+")?;
        }
        write!(f, "0x{:02X}", self.key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendAction {
    Press,
    Release,
    PressThenRelease,
}

/// A single input message for the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "key", rename_all = "snake_case")]
pub enum KeyMessage {
    Down(KeyCode),
    Up(KeyCode),
}
