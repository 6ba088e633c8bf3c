//! Daydream controller support
//!
//! This module provides the controller-side pieces:
//! - BLE connection and characteristic access
//! - Input frame decoding into immutable snapshots
//! - Edge-triggered button and touchpad events
//! - The per-device `Controller` handle
//! - A cache of previously seen devices

pub mod button;
pub mod connection;
pub mod constants;
pub mod controller;
pub mod known_devices;
pub mod state;
pub mod touchpad;
pub mod types;

// Re-export commonly used items
pub use button::{button_edges, ButtonEvent, ControllerButton};
pub use connection::DaydreamConnection;
pub use constants::*;
pub use controller::{Controller, ControllerEvent, DisconnectReason};
pub use known_devices::{KnownDevice, KnownDevices};
pub use state::ControllerState;
pub use touchpad::{touch_transition, TouchEvent, Touchpad};
pub use types::*;
