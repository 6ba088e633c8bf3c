//! Error types
//!
//! Library errors are plain `thiserror` enums. Math failures are kept in
//! their own type so the value types don't depend on the transport layer.

use crate::config::ConfigError;
use crate::daydream::types::ConnectionStatus;
use thiserror::Error;

/// Degenerate input to a math operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("cannot normalize a zero-magnitude value")]
    ZeroMagnitude,
}

#[derive(Debug, Error)]
pub enum DaydreamError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    #[error("Malformed frame: expected at least {expected} bytes, got {actual}")]
    Decode { expected: usize, actual: usize },

    #[error("Controller {device_id} is {status:?}")]
    InvalidState {
        device_id: String,
        status: ConnectionStatus,
    },

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No Bluetooth adapters found")]
    NoAdapter,
}

pub type Result<T> = std::result::Result<T, DaydreamError>;
