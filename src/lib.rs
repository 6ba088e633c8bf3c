//! daydream-rs: Google Daydream controller support over Bluetooth LE
//!
//! This library discovers Daydream controllers, decodes their 20-byte input
//! notifications into orientation, motion, touchpad and button snapshots, and
//! delivers edge-triggered events to subscribers over channels.

pub mod config;
pub mod daydream;
pub mod error;
pub mod manager;
pub mod math;
pub mod transport;

// Re-export commonly used items
pub use config::Config;
pub use daydream::{
    ButtonEvent, ButtonId, ButtonSet, ConnectionStatus, Controller, ControllerEvent,
    ControllerState, DeviceId, DisconnectReason, TouchEvent, TouchPoint,
};
pub use error::{DaydreamError, MathError, Result};
pub use manager::{ConnectionManager, ManagerEvent};
pub use math::{Quaternion, Vect3};
pub use transport::{TransportEvent, TransportHandle};
