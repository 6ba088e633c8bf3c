//! Daydream controller protocol constants
//!
//! This module contains the constants needed for Daydream communication:
//! - BLE UUIDs used for discovery and streaming
//! - Input frame layout and scale factors
//! - Timing defaults

use std::f64::consts::PI;
use uuid::Uuid;

// ============================================================================
// BLE Discovery Constants
// ============================================================================

/// Advertised local name prefix of Daydream controllers
pub const DAYDREAM_NAME_PREFIX: &str = "Daydream controller";

/// Google LLC 16-bit service UUID carried in the advertisement
pub const DAYDREAM_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000fe55_0000_1000_8000_00805f9b34fb);

// ============================================================================
// BLE Characteristic UUIDs
// ============================================================================

/// Input frame characteristic (controller -> host, NOTIFY)
pub const INPUT_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x00000001_1000_1000_8000_00805f9b34fb);

/// Standard battery service
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard battery level characteristic (READ, one byte 0-100)
pub const BATTERY_LEVEL_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

// ============================================================================
// Input Frame Layout
// ============================================================================

/// Size of one input notification
pub const FRAME_LEN: usize = 20;

/// Index of the button byte
pub const BUTTON_BYTE_INDEX: usize = 18;

pub const BUTTON_MASK_CLICK: u8 = 0x01;
pub const BUTTON_MASK_HOME: u8 = 0x02;
pub const BUTTON_MASK_APP: u8 = 0x04;
pub const BUTTON_MASK_VOLUME_DOWN: u8 = 0x08;
pub const BUTTON_MASK_VOLUME_UP: u8 = 0x10;

/// Orientation: 13-bit signed axis-angle component -> radians
pub const ORIENTATION_SCALE: f64 = 2.0 * PI / 4095.0;

/// Accelerometer: 13-bit signed -> m/s²
pub const ACCEL_SCALE: f64 = 8.0 * 9.8 / 4095.0;

/// Gyroscope: 13-bit signed -> rad/s
pub const GYRO_SCALE: f64 = 2048.0 / 180.0 * PI / 4095.0;

/// Touch coordinates: 8-bit -> 0.0..=1.0
pub const TOUCH_SCALE: f32 = 1.0 / 255.0;

// ============================================================================
// Timing Constants
// ============================================================================

/// Default window during which a lost controller may reconnect (milliseconds)
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 5_000;

/// How often the dispatcher checks for expired grace windows (milliseconds)
pub const DISPATCH_TICK_MS: u64 = 50;
