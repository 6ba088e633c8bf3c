//! Daydream controller management
//!
//! A `Controller` is the logical handle for one physical device. The manager
//! drives its connection status; frames are fed in while it is connected and
//! every accepted frame replaces the current snapshot and fans out events to
//! subscribers.
//!
//! Events for one frame are sent in a fixed order: button transitions, then
//! the touch transition, then the new state.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::daydream::button::{ButtonEvent, ControllerButton};
use crate::daydream::state::ControllerState;
use crate::daydream::touchpad::{TouchEvent, Touchpad};
use crate::daydream::types::{ButtonId, ConnectionStatus, DeviceId};
use crate::error::{DaydreamError, Result};

/// Why a controller left the connected state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DisconnectReason {
    /// `ConnectionManager::disconnect` was called
    Requested,
    /// The BLE link dropped or failed
    ConnectionLost(String),
    /// A frame could not be decoded
    DecodeFailure(String),
    /// The manager shut down
    Shutdown,
}

/// Notification pushed to controller subscribers
#[derive(Debug, Clone, Serialize)]
pub enum ControllerEvent {
    StatusChanged(ConnectionStatus),
    Button(ButtonEvent),
    Touch(TouchEvent),
    State(Arc<ControllerState>),
    /// Battery charge, 0.0 to 1.0
    Battery(f32),
    Disconnected(DisconnectReason),
}

struct Inner {
    status: ConnectionStatus,
    /// Set on eviction; the instance can never connect again
    closed: bool,
    /// Latest snapshot; cleared while disconnected
    current: Option<Arc<ControllerState>>,
    /// Timestamp of the newest accepted frame, kept across reconnects
    last_timestamp_us: Option<u64>,
    buttons: Vec<ControllerButton>,
    touchpad: Touchpad,
    battery: Option<f32>,
    subscribers: Vec<Sender<ControllerEvent>>,
}

impl Inner {
    fn publish(&mut self, device_id: &str, event: ControllerEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Controller {}: subscriber queue full, dropping event", device_id);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    /// Release held buttons and an active touch, notifying subscribers
    fn release_inputs(&mut self, device_id: &str) {
        let mut events: Vec<ControllerEvent> = self
            .buttons
            .iter_mut()
            .filter_map(|button| button.release())
            .map(ControllerEvent::Button)
            .collect();
        events.extend(self.touchpad.release().map(ControllerEvent::Touch));
        self.current = None;

        for event in events {
            self.publish(device_id, event);
        }
    }
}

/// One physical Daydream controller
pub struct Controller {
    device_id: DeviceId,
    name: String,
    channel_capacity: usize,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("device_id", &self.device_id)
            .field("name", &self.name)
            .field("status", &self.status())
            .finish()
    }
}

impl Controller {
    pub(crate) fn new(
        device_id: DeviceId,
        name: String,
        touch_threshold: f32,
        channel_capacity: usize,
    ) -> Self {
        Self {
            device_id,
            name,
            channel_capacity,
            inner: Mutex::new(Inner {
                status: ConnectionStatus::Disconnected,
                closed: false,
                current: None,
                last_timestamp_us: None,
                buttons: ButtonId::ALL.into_iter().map(ControllerButton::new).collect(),
                touchpad: Touchpad::new(touch_threshold),
                battery: None,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ConnectionStatus {
        self.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Latest snapshot, if any frame has been received
    pub fn current_state(&self) -> Option<Arc<ControllerState>> {
        self.lock().current.clone()
    }

    /// Last reported battery charge (0.0 to 1.0)
    pub fn battery_level(&self) -> Option<f32> {
        self.lock().battery
    }

    /// Whether `id` is held down as of the latest snapshot
    pub fn button(&self, id: ButtonId) -> bool {
        self.lock()
            .buttons
            .iter()
            .any(|b| b.id() == id && b.is_pressed())
    }

    /// Register a new subscriber
    ///
    /// The receiver sees every event from now on. It is closed when the
    /// controller is evicted from the manager.
    pub fn subscribe(&self) -> Receiver<ControllerEvent> {
        let (tx, rx) = bounded(self.channel_capacity);
        let mut inner = self.lock();
        if !inner.closed {
            inner.subscribers.push(tx);
        }
        rx
    }

    /// Fail with `InvalidState` unless connected
    pub fn require_connected(&self) -> Result<()> {
        let status = self.status();
        if status == ConnectionStatus::Connected {
            Ok(())
        } else {
            Err(DaydreamError::InvalidState {
                device_id: self.device_id.clone(),
                status,
            })
        }
    }

    /// Disconnected -> Connecting
    pub(crate) fn begin_connecting(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed || inner.status != ConnectionStatus::Disconnected {
            return Err(DaydreamError::InvalidState {
                device_id: self.device_id.clone(),
                status: inner.status,
            });
        }
        inner.status = ConnectionStatus::Connecting;
        inner.publish(&self.device_id, ControllerEvent::StatusChanged(ConnectionStatus::Connecting));
        debug!("Controller {} connecting", self.device_id);
        Ok(())
    }

    /// Connecting -> Connected
    pub(crate) fn mark_connected(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.closed || inner.status != ConnectionStatus::Connecting {
            return Err(DaydreamError::InvalidState {
                device_id: self.device_id.clone(),
                status: inner.status,
            });
        }
        inner.status = ConnectionStatus::Connected;
        inner.publish(&self.device_id, ControllerEvent::StatusChanged(ConnectionStatus::Connected));
        info!("✓ Controller {} connected", self.device_id);
        Ok(())
    }

    /// Move to Disconnected and send the terminal notification
    ///
    /// Held buttons and an active touch are released first, so every `Down`
    /// and `Begin` is matched before `Disconnected`. Returns false if the
    /// controller was already disconnected.
    pub(crate) fn mark_disconnected(&self, reason: DisconnectReason) -> bool {
        let mut inner = self.lock();
        if inner.status == ConnectionStatus::Disconnected {
            return false;
        }
        inner.status = ConnectionStatus::Disconnected;
        inner.release_inputs(&self.device_id);
        inner.publish(&self.device_id, ControllerEvent::StatusChanged(ConnectionStatus::Disconnected));
        inner.publish(&self.device_id, ControllerEvent::Disconnected(reason.clone()));
        info!("Controller {} disconnected ({:?})", self.device_id, reason);
        true
    }

    /// Permanently retire this instance and close all subscriber channels
    pub(crate) fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.subscribers.clear();
    }

    /// Decode a raw frame and apply it
    ///
    /// Returns `Ok(false)` for stale frames (timestamp not newer than the
    /// current snapshot).
    pub(crate) fn ingest_frame(&self, frame: &[u8], timestamp_us: u64) -> Result<bool> {
        self.require_connected()?;
        let state = ControllerState::decode(frame, timestamp_us)?;
        self.apply_state(state)
    }

    /// Replace the current snapshot and notify subscribers
    pub(crate) fn apply_state(&self, state: ControllerState) -> Result<bool> {
        let mut inner = self.lock();
        if inner.status != ConnectionStatus::Connected {
            return Err(DaydreamError::InvalidState {
                device_id: self.device_id.clone(),
                status: inner.status,
            });
        }

        if let Some(last) = inner.last_timestamp_us {
            if state.timestamp_us() <= last {
                debug!(
                    "Controller {}: dropping stale frame ({} <= {})",
                    self.device_id,
                    state.timestamp_us(),
                    last
                );
                return Ok(false);
            }
        }

        let buttons = state.buttons();
        let button_events: Vec<ButtonEvent> = inner
            .buttons
            .iter_mut()
            .filter_map(|b| b.update(buttons.is_pressed(b.id())))
            .collect();
        let touch_event = inner.touchpad.update(state.touch());

        let snapshot = Arc::new(state);
        inner.last_timestamp_us = Some(snapshot.timestamp_us());
        inner.current = Some(Arc::clone(&snapshot));

        for event in button_events {
            debug!("Controller {}: {:?}", self.device_id, event);
            inner.publish(&self.device_id, ControllerEvent::Button(event));
        }
        if let Some(event) = touch_event {
            inner.publish(&self.device_id, ControllerEvent::Touch(event));
        }
        inner.publish(&self.device_id, ControllerEvent::State(snapshot));
        Ok(true)
    }

    /// Record a battery reading in percent (0-100)
    pub(crate) fn update_battery(&self, percent: u8) {
        let level = f32::from(percent.min(100)) / 100.0;
        let mut inner = self.lock();
        if inner.status == ConnectionStatus::Disconnected {
            return;
        }
        if inner.battery != Some(level) {
            inner.battery = Some(level);
            inner.publish(&self.device_id, ControllerEvent::Battery(level));
            info!("  Battery Level: {}%", percent.min(100));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daydream::constants::{BUTTON_MASK_APP, BUTTON_MASK_CLICK};
    use crate::daydream::state::tests::frame;
    use crate::daydream::types::ButtonSet;
    use crate::math::Quaternion;

    fn connected() -> Controller {
        let controller = Controller::new("dev-1".to_string(), "Daydream controller".to_string(), 0.05, 64);
        controller.begin_connecting().unwrap();
        controller.mark_connected().unwrap();
        controller
    }

    fn drain(rx: &Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_status_transitions() {
        let controller = Controller::new("dev".to_string(), "x".to_string(), 0.05, 8);
        assert_eq!(controller.status(), ConnectionStatus::Disconnected);
        assert!(controller.mark_connected().is_err());

        controller.begin_connecting().unwrap();
        assert!(controller.begin_connecting().is_err());
        controller.mark_connected().unwrap();
        assert!(controller.is_connected());

        assert!(controller.mark_disconnected(DisconnectReason::Requested));
        assert!(!controller.mark_disconnected(DisconnectReason::Requested));
        assert!(matches!(
            controller.require_connected(),
            Err(DaydreamError::InvalidState { status: ConnectionStatus::Disconnected, .. })
        ));
    }

    #[test]
    fn test_frame_events_in_order() {
        let controller = connected();
        let rx = controller.subscribe();

        controller.ingest_frame(&frame([0, 0, 0], (128, 64), BUTTON_MASK_CLICK), 10).unwrap();
        let events = drain(&rx);

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ControllerEvent::Button(ButtonEvent::Down(ButtonId::Click))));
        assert!(matches!(events[1], ControllerEvent::Touch(TouchEvent::Begin(_))));
        match &events[2] {
            ControllerEvent::State(state) => assert_eq!(state.timestamp_us(), 10),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(controller.button(ButtonId::Click));
        assert_eq!(controller.current_state().unwrap().timestamp_us(), 10);
    }

    #[test]
    fn test_stale_frames_are_dropped() {
        let controller = connected();
        let rx = controller.subscribe();

        assert!(controller.ingest_frame(&frame([0, 0, 0], (0, 0), BUTTON_MASK_APP), 20).unwrap());
        assert!(!controller.ingest_frame(&frame([0, 0, 0], (0, 0), 0), 20).unwrap());
        assert!(!controller.ingest_frame(&frame([0, 0, 0], (0, 0), 0), 5).unwrap());

        // Only the first frame produced events
        let events = drain(&rx);
        assert_eq!(events.len(), 2);
        assert!(controller.button(ButtonId::App));
    }

    #[test]
    fn test_no_events_after_disconnect() {
        let controller = connected();
        let rx = controller.subscribe();

        controller.mark_disconnected(DisconnectReason::ConnectionLost("link dropped".into()));
        let result = controller.apply_state(ControllerState::from_inputs(
            1,
            Quaternion::identity(),
            ButtonSet::from_bits(BUTTON_MASK_APP),
            None,
        ));
        assert!(matches!(result, Err(DaydreamError::InvalidState { .. })));

        let events = drain(&rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ControllerEvent::StatusChanged(ConnectionStatus::Disconnected)));
        assert!(matches!(events[1], ControllerEvent::Disconnected(DisconnectReason::ConnectionLost(_))));
    }

    #[test]
    fn test_disconnect_releases_held_inputs() {
        let controller = connected();
        controller.ingest_frame(&frame([0, 0, 0], (100, 100), BUTTON_MASK_APP), 1).unwrap();
        let rx = controller.subscribe();

        controller.mark_disconnected(DisconnectReason::ConnectionLost("link dropped".into()));
        let events = drain(&rx);

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], ControllerEvent::Button(ButtonEvent::Up(ButtonId::App))));
        assert!(matches!(events[1], ControllerEvent::Touch(TouchEvent::End(_))));
        assert!(matches!(events[2], ControllerEvent::StatusChanged(ConnectionStatus::Disconnected)));
        assert!(matches!(events[3], ControllerEvent::Disconnected(_)));

        assert!(!controller.button(ButtonId::App));
        assert!(controller.current_state().is_none());
    }

    #[test]
    fn test_close_ends_subscriptions() {
        let controller = connected();
        let rx = controller.subscribe();
        controller.mark_disconnected(DisconnectReason::Requested);
        controller.close();

        assert_eq!(drain(&rx).len(), 2);
        assert!(rx.recv().is_err());
        assert!(controller.begin_connecting().is_err());
        // Late subscribers get an already-closed channel
        assert!(controller.subscribe().recv().is_err());
    }

    #[test]
    fn test_battery_updates() {
        let controller = connected();
        let rx = controller.subscribe();

        controller.update_battery(80);
        controller.update_battery(80);
        controller.update_battery(150);

        assert_eq!(controller.battery_level(), Some(1.0));
        let levels: Vec<f32> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                ControllerEvent::Battery(level) => Some(level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![0.8, 1.0]);
    }
}
