//! Transport events feeding the connection manager
//!
//! BLE link threads never touch controllers directly. They push
//! `TransportEvent`s into the manager's dispatch queue, and the dispatcher
//! applies them one at a time.

use crossbeam_channel::Sender;
use std::time::Instant;

use crate::daydream::types::DeviceId;
use crate::error::{DaydreamError, Result};

#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A controller was seen and a link is being opened
    Discovered { device_id: DeviceId, name: String },
    /// The link is up and frames will follow
    Connected { device_id: DeviceId },
    /// One raw input notification
    Frame {
        device_id: DeviceId,
        data: Vec<u8>,
        timestamp_us: u64,
    },
    /// Battery reading in percent
    Battery { device_id: DeviceId, percent: u8 },
    /// The link failed or dropped
    ConnectionLost { device_id: DeviceId, reason: String },
}

impl TransportEvent {
    pub fn device_id(&self) -> &str {
        match self {
            TransportEvent::Discovered { device_id, .. }
            | TransportEvent::Connected { device_id }
            | TransportEvent::Frame { device_id, .. }
            | TransportEvent::Battery { device_id, .. }
            | TransportEvent::ConnectionLost { device_id, .. } => device_id,
        }
    }
}

/// Cloneable sender into a manager's dispatch queue
#[derive(Clone)]
pub struct TransportHandle {
    sender: Sender<TransportEvent>,
    epoch: Instant,
}

impl TransportHandle {
    pub(crate) fn new(sender: Sender<TransportEvent>, epoch: Instant) -> Self {
        Self { sender, epoch }
    }

    pub fn send(&self, event: TransportEvent) -> Result<()> {
        self.sender
            .send(event)
            .map_err(|_| DaydreamError::Transport("Dispatcher is not running".into()))
    }

    /// Microseconds since the manager was created
    pub fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Send a raw frame stamped with the current time
    pub fn frame(&self, device_id: &str, data: Vec<u8>) -> Result<()> {
        self.send(TransportEvent::Frame {
            device_id: device_id.to_string(),
            data,
            timestamp_us: self.now_us(),
        })
    }
}
