//! Daydream type definitions
//!
//! This module defines the basic data types used throughout the daydream
//! module, including button identities, touch positions and connection status.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::daydream::constants::*;

/// Platform identifier of a physical controller
pub type DeviceId = String;

/// Connection status of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// Physical buttons on the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonId {
    /// Touchpad click
    Click,
    App,
    Home,
    VolumeUp,
    VolumeDown,
}

impl ButtonId {
    pub const ALL: [ButtonId; 5] = [
        ButtonId::Click,
        ButtonId::App,
        ButtonId::Home,
        ButtonId::VolumeUp,
        ButtonId::VolumeDown,
    ];

    /// Bit of this button in the frame's button byte
    pub const fn mask(self) -> u8 {
        match self {
            ButtonId::Click => BUTTON_MASK_CLICK,
            ButtonId::App => BUTTON_MASK_APP,
            ButtonId::Home => BUTTON_MASK_HOME,
            ButtonId::VolumeUp => BUTTON_MASK_VOLUME_UP,
            ButtonId::VolumeDown => BUTTON_MASK_VOLUME_DOWN,
        }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonId::Click => "click",
            ButtonId::App => "app",
            ButtonId::Home => "home",
            ButtonId::VolumeUp => "volume+",
            ButtonId::VolumeDown => "volume-",
        };
        f.write_str(name)
    }
}

/// Set of pressed buttons, stored in the frame's own bit layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct ButtonSet(u8);

impl ButtonSet {
    const KNOWN_BITS: u8 = BUTTON_MASK_CLICK
        | BUTTON_MASK_HOME
        | BUTTON_MASK_APP
        | BUTTON_MASK_VOLUME_DOWN
        | BUTTON_MASK_VOLUME_UP;

    /// Build from a raw button byte; unknown bits are ignored
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & Self::KNOWN_BITS)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn is_pressed(self, id: ButtonId) -> bool {
        self.0 & id.mask() != 0
    }

    /// Copy of this set with `id` pressed or released
    pub fn with(self, id: ButtonId, pressed: bool) -> Self {
        if pressed {
            Self(self.0 | id.mask())
        } else {
            Self(self.0 & !id.mask())
        }
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn pressed(self) -> impl Iterator<Item = ButtonId> {
        ButtonId::ALL.into_iter().filter(move |id| self.is_pressed(*id))
    }
}

/// Finger position on the touchpad, each axis normalized to 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    /// Horizontal axis (0.0 = left edge)
    pub x: f32,

    /// Vertical axis (0.0 = top edge)
    pub y: f32,
}

impl TouchPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: TouchPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}
