//! High-level Daydream connection manager
//!
//! The manager owns the controller registry and three kinds of threads:
//! - a dispatcher that applies `TransportEvent`s and evicts expired entries
//! - a scanner (while discovery is on) that finds controllers over BLE
//! - one link thread per connected controller, streaming raw frames
//!
//! Link threads only ever talk to the dispatcher through a `TransportHandle`,
//! so every registry change and controller transition happens on one thread.

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use futures::stream::StreamExt;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::daydream::connection::{is_daydream, DaydreamConnection};
use crate::daydream::constants::{DISPATCH_TICK_MS, INPUT_CHARACTERISTIC_UUID};
use crate::daydream::controller::{Controller, DisconnectReason};
use crate::daydream::known_devices::{default_cache_path, KnownDevices};
use crate::daydream::types::{ConnectionStatus, DeviceId};
use crate::error::{DaydreamError, Result};
use crate::transport::{TransportEvent, TransportHandle};

/// Registry-level notifications
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    /// A new controller instance entered the registry
    Discovered(Arc<Controller>),
    Connected(DeviceId),
    /// The controller went offline; it stays registered for the grace period
    Disconnected(DeviceId),
    /// The controller left the registry and its subscriptions were closed
    Evicted(DeviceId),
}

struct Entry {
    controller: Arc<Controller>,
    /// Set while disconnected and waiting out the grace period
    lost_at: Option<Instant>,
}

/// State shared between the manager handle and its threads
struct Shared {
    config: Config,
    registry: Mutex<HashMap<DeviceId, Entry>>,
    /// Cancellation for each live BLE link
    links: Mutex<HashMap<DeviceId, CancellationToken>>,
    event_sender: Sender<ManagerEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, HashMap<DeviceId, Entry>> {
        lock(&self.registry)
    }

    fn links(&self) -> MutexGuard<'_, HashMap<DeviceId, CancellationToken>> {
        lock(&self.links)
    }

    fn notify(&self, event: ManagerEvent) {
        match self.event_sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Manager event queue full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn lookup(&self, device_id: &str) -> Option<Arc<Controller>> {
        self.registry()
            .get(device_id)
            .map(|entry| Arc::clone(&entry.controller))
    }

    fn process_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Discovered { device_id, name } => {
                self.handle_discovered(device_id, name);
            }
            TransportEvent::Connected { device_id } => {
                self.handle_connected(&device_id);
            }
            TransportEvent::Frame { device_id, data, timestamp_us } => {
                self.handle_frame(&device_id, &data, timestamp_us);
            }
            TransportEvent::Battery { device_id, percent } => {
                if let Some(controller) = self.lookup(&device_id) {
                    controller.update_battery(percent);
                }
            }
            TransportEvent::ConnectionLost { device_id, reason } => {
                self.handle_loss(&device_id, DisconnectReason::ConnectionLost(reason));
            }
        }
    }

    fn handle_discovered(&self, device_id: DeviceId, name: String) {
        let (controller, is_new) = {
            let mut registry = self.registry();
            match registry.get_mut(&device_id) {
                Some(entry) if entry.lost_at.is_some() => {
                    entry.lost_at = None;
                    (Arc::clone(&entry.controller), false)
                }
                Some(_) => {
                    debug!("Controller {} already active, ignoring discovery", device_id);
                    return;
                }
                None => {
                    let controller = Arc::new(Controller::new(
                        device_id.clone(),
                        name,
                        self.config.input.touch_move_threshold,
                        self.config.input.event_channel_capacity,
                    ));
                    registry.insert(
                        device_id.clone(),
                        Entry {
                            controller: Arc::clone(&controller),
                            lost_at: None,
                        },
                    );
                    (controller, true)
                }
            }
        };

        if let Err(e) = controller.begin_connecting() {
            warn!("Controller {} cannot start connecting: {}", device_id, e);
            return;
        }

        if is_new {
            info!("Registered controller {} ({})", controller.name(), device_id);
            self.notify(ManagerEvent::Discovered(controller));
        } else {
            info!("Controller {} is back within the grace period", device_id);
        }
    }

    fn handle_connected(&self, device_id: &str) {
        let Some(controller) = self.lookup(device_id) else {
            debug!("Connected event for unknown controller {}", device_id);
            return;
        };

        match controller.mark_connected() {
            Ok(()) => self.notify(ManagerEvent::Connected(device_id.to_string())),
            Err(e) => debug!("Ignoring connected event: {}", e),
        }
    }

    fn handle_frame(&self, device_id: &str, data: &[u8], timestamp_us: u64) {
        let Some(controller) = self.lookup(device_id) else {
            return;
        };

        match controller.ingest_frame(data, timestamp_us) {
            Ok(_) => {}
            Err(DaydreamError::InvalidState { .. }) => {
                // Frame raced a disconnect
            }
            Err(e @ DaydreamError::Decode { .. }) => {
                warn!("Controller {}: {}, dropping link", device_id, e);
                self.cancel_link(device_id);
                self.handle_loss(device_id, DisconnectReason::DecodeFailure(e.to_string()));
            }
            Err(e) => warn!("Controller {}: failed to apply frame: {}", device_id, e),
        }
    }

    fn handle_loss(&self, device_id: &str, reason: DisconnectReason) {
        let controller = {
            let mut registry = self.registry();
            let Some(entry) = registry.get_mut(device_id) else {
                return;
            };
            if entry.lost_at.is_none() {
                entry.lost_at = Some(Instant::now());
            }
            Arc::clone(&entry.controller)
        };

        if controller.mark_disconnected(reason) {
            self.notify(ManagerEvent::Disconnected(device_id.to_string()));
        }
    }

    fn evict_expired(&self, now: Instant) -> Vec<DeviceId> {
        let grace = self.config.grace_period();
        let expired: Vec<(DeviceId, Arc<Controller>)> = {
            let mut registry = self.registry();
            let ids: Vec<DeviceId> = registry
                .iter()
                .filter(|(_, entry)| {
                    entry
                        .lost_at
                        .map(|lost_at| now.saturating_duration_since(lost_at) >= grace)
                        .unwrap_or(false)
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| registry.remove(&id).map(|entry| (id, entry.controller)))
                .collect()
        };

        expired
            .into_iter()
            .map(|(device_id, controller)| {
                controller.close();
                info!("Controller {} evicted after grace period", device_id);
                self.notify(ManagerEvent::Evicted(device_id.clone()));
                device_id
            })
            .collect()
    }

    /// Remove a controller for good; false if it was not registered
    fn remove(&self, device_id: &str, reason: DisconnectReason) -> bool {
        let Some(entry) = self.registry().remove(device_id) else {
            return false;
        };

        self.cancel_link(device_id);
        if entry.controller.mark_disconnected(reason) {
            self.notify(ManagerEvent::Disconnected(device_id.to_string()));
        }
        entry.controller.close();
        self.notify(ManagerEvent::Evicted(device_id.to_string()));
        true
    }

    fn cancel_link(&self, device_id: &str) {
        if let Some(token) = self.links().remove(device_id) {
            token.cancel();
        }
    }

    fn has_link(&self, device_id: &str) -> bool {
        self.links().contains_key(device_id)
    }

    /// Drop a finished link's entry unless someone already cancelled it
    fn release_link(&self, device_id: &str, token: &CancellationToken) {
        if !token.is_cancelled() {
            self.links().remove(device_id);
        }
    }
}

/// Manager for discovering and tracking Daydream controllers
pub struct ConnectionManager {
    shared: Arc<Shared>,
    event_receiver: Receiver<ManagerEvent>,
    transport: TransportHandle,
    /// Stop flag of the current scanner, if one is running
    scan_flag: Mutex<Option<Arc<AtomicBool>>>,
    /// Dispatcher running flag
    running: Arc<AtomicBool>,
    dispatcher: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Create a manager and start its dispatcher thread
    ///
    /// Discovery does not start until `start_discovery` is called.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let (event_sender, event_receiver) = bounded(config.input.event_channel_capacity);
        let (transport_sender, transport_receiver) = unbounded();

        let shared = Arc::new(Shared {
            config,
            registry: Mutex::new(HashMap::new()),
            links: Mutex::new(HashMap::new()),
            event_sender,
        });
        let running = Arc::new(AtomicBool::new(true));
        let dispatcher = Self::start_dispatcher_thread(
            Arc::clone(&shared),
            transport_receiver,
            Arc::clone(&running),
        )?;

        Ok(Self {
            shared,
            event_receiver,
            transport: TransportHandle::new(transport_sender, Instant::now()),
            scan_flag: Mutex::new(None),
            running,
            dispatcher: Some(dispatcher),
        })
    }

    /// Start scanning for controllers; a no-op while already scanning
    pub fn start_discovery(&self) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(DaydreamError::Transport("Manager has been shut down".into()));
        }

        let mut scan_flag = lock(&self.scan_flag);
        if scan_flag.is_some() {
            debug!("Discovery already running");
            return Ok(());
        }

        let flag = Arc::new(AtomicBool::new(true));
        self.start_scan_thread(Arc::clone(&flag))?;
        *scan_flag = Some(flag);

        info!("✓ Discovery started! Scanning for controllers...");
        info!("  Press the home button on your Daydream controller");
        Ok(())
    }

    /// Stop scanning; connected controllers stay connected
    pub fn stop(&self) {
        if let Some(flag) = lock(&self.scan_flag).take() {
            info!("Stopping discovery...");
            flag.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_scanning(&self) -> bool {
        lock(&self.scan_flag).is_some()
    }

    /// Disconnect every controller, close all subscriptions, and stop all
    /// threads
    pub fn shutdown(&mut self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        info!("Shutting down connection manager...");

        self.stop();

        let device_ids: Vec<DeviceId> = self.shared.registry().keys().cloned().collect();
        for device_id in device_ids {
            self.shared.remove(&device_id, DisconnectReason::Shutdown);
        }

        let links: Vec<CancellationToken> = self.shared.links().drain().map(|(_, t)| t).collect();
        for token in links {
            token.cancel();
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(dispatcher) = self.dispatcher.take() {
            if dispatcher.join().is_err() {
                error!("Dispatcher thread panicked");
            }
        }

        info!("✓ Connection manager shutdown complete");
    }

    /// Registry-level events (discovered, connected, disconnected, evicted)
    pub fn events(&self) -> &Receiver<ManagerEvent> {
        &self.event_receiver
    }

    pub fn controller(&self, device_id: &str) -> Option<Arc<Controller>> {
        self.shared.lookup(device_id)
    }

    /// All registered controllers, including those inside their grace period
    pub fn controllers(&self) -> Vec<Arc<Controller>> {
        self.shared
            .registry()
            .values()
            .map(|entry| Arc::clone(&entry.controller))
            .collect()
    }

    pub fn controller_count(&self) -> usize {
        self.shared.registry().len()
    }

    /// Disconnect a controller and remove it from the registry
    ///
    /// A later sighting of the same device creates a fresh `Controller`.
    pub fn disconnect(&self, device_id: &str) -> Result<()> {
        if self.shared.remove(device_id, DisconnectReason::Requested) {
            Ok(())
        } else {
            Err(DaydreamError::InvalidState {
                device_id: device_id.to_string(),
                status: ConnectionStatus::Disconnected,
            })
        }
    }

    /// Handle for feeding events into the dispatcher
    pub fn transport(&self) -> TransportHandle {
        self.transport.clone()
    }

    /// Apply one transport event synchronously on the calling thread
    pub fn process_event(&self, event: TransportEvent) {
        self.shared.process_event(event);
    }

    /// Evict every controller whose grace period has ended by `now`
    pub fn evict_expired(&self, now: Instant) -> Vec<DeviceId> {
        self.shared.evict_expired(now)
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    fn start_dispatcher_thread(
        shared: Arc<Shared>,
        receiver: Receiver<TransportEvent>,
        running: Arc<AtomicBool>,
    ) -> Result<JoinHandle<()>> {
        let tick = Duration::from_millis(DISPATCH_TICK_MS);

        thread::Builder::new()
            .name("dispatcher".to_string())
            .spawn(move || {
                debug!("Dispatcher thread started");

                while running.load(Ordering::SeqCst) {
                    match receiver.recv_timeout(tick) {
                        Ok(event) => shared.process_event(event),
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            warn!("Transport channel disconnected");
                            break;
                        }
                    }
                    shared.evict_expired(Instant::now());
                }

                debug!("Dispatcher thread stopped");
            })
            .map_err(|e| DaydreamError::Transport(format!("Failed to spawn dispatcher: {}", e)))
    }

    fn start_scan_thread(&self, scanning: Arc<AtomicBool>) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let transport = self.transport.clone();

        thread::Builder::new()
            .name("scanner".to_string())
            .spawn(move || {
                let rt = match Runtime::new() {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("Failed to create tokio runtime: {}", e);
                        return;
                    }
                };

                rt.block_on(async {
                    info!("Scanner thread started");

                    let discovery = &shared.config.discovery;
                    let cache_path = discovery
                        .known_devices_path
                        .clone()
                        .unwrap_or_else(default_cache_path);
                    let mut known = discovery.remember_devices.then(|| {
                        let known = KnownDevices::load(&cache_path);
                        info!("Loaded {} known controllers", known.len());
                        known
                    });
                    let retry = Duration::from_secs(discovery.scan_retry_secs);

                    while scanning.load(Ordering::SeqCst) {
                        let scan = Self::scan_for_controllers(
                            &shared,
                            &transport,
                            &scanning,
                            known.as_mut().map(|known| (known, cache_path.as_path())),
                        );
                        match scan.await {
                            Ok(()) => {
                                debug!("Scan cycle completed");
                            }
                            Err(e) => {
                                warn!("Scan error: {}, retrying in {} seconds...", e, retry.as_secs());
                                tokio::time::sleep(retry).await;
                            }
                        }
                    }

                    info!("Scanner thread exited");
                });
            })
            .map_err(|e| DaydreamError::Transport(format!("Failed to spawn scanner: {}", e)))?;

        Ok(())
    }

    /// Scan for Daydream controllers and open a link to each new one
    async fn scan_for_controllers(
        shared: &Arc<Shared>,
        transport: &TransportHandle,
        scanning: &AtomicBool,
        mut known: Option<(&mut KnownDevices, &Path)>,
    ) -> Result<()> {
        use btleplug::api::{Central, CentralEvent, Manager as _, ScanFilter};
        use btleplug::platform::Manager;

        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or(DaydreamError::NoAdapter)?;

        // Unfiltered so controllers advertising only their name still match
        adapter.start_scan(ScanFilter::default()).await?;
        let mut events = adapter.events().await?;

        while scanning.load(Ordering::SeqCst) {
            tokio::select! {
                Some(event) = events.next() => {
                    let id = match event {
                        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                        CentralEvent::ServicesAdvertisement { id, .. } => id,
                        _ => continue,
                    };

                    let peripheral = adapter.peripheral(&id).await?;
                    let Some(properties) = peripheral.properties().await? else {
                        continue;
                    };
                    if !is_daydream(&properties, &shared.config.discovery.name_prefix) {
                        continue;
                    }

                    let device_id = properties.address.to_string();
                    if shared.has_link(&device_id) {
                        continue;
                    }

                    let name = properties
                        .local_name
                        .clone()
                        .unwrap_or_else(|| "Unknown".to_string());
                    info!("✓ Found Daydream controller: {} ({})", name, device_id);

                    if let Some((known, cache_path)) = known.as_mut() {
                        known.remember(*cache_path, &device_id, properties.local_name.clone());
                    }

                    Self::spawn_link(shared, transport.clone(), peripheral, device_id, name);
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    // Periodic check of the scanning flag
                }
            }
        }

        adapter.stop_scan().await?;
        Ok(())
    }

    /// Start a link thread that connects to `peripheral` and streams frames
    fn spawn_link(
        shared: &Arc<Shared>,
        transport: TransportHandle,
        peripheral: Peripheral,
        device_id: DeviceId,
        name: String,
    ) {
        let cancel = CancellationToken::new();
        shared.links().insert(device_id.clone(), cancel.clone());

        let link_shared = Arc::clone(shared);
        let link_id = device_id.clone();
        let link_cancel = cancel.clone();

        let spawned = thread::Builder::new()
            .name(format!("link-{}", device_id))
            .spawn(move || {
                match Runtime::new() {
                    Ok(rt) => rt.block_on(Self::link_loop(
                        peripheral,
                        &link_id,
                        name,
                        &transport,
                        &link_cancel,
                        &link_shared.config,
                    )),
                    Err(e) => error!("Failed to create tokio runtime: {}", e),
                }
                link_shared.release_link(&link_id, &link_cancel);
            });

        if let Err(e) = spawned {
            warn!("Failed to spawn link thread for {}: {}", device_id, e);
            shared.release_link(&device_id, &cancel);
        }
    }

    /// Own one BLE link from connect to disconnect
    async fn link_loop(
        peripheral: Peripheral,
        device_id: &str,
        name: String,
        transport: &TransportHandle,
        cancel: &CancellationToken,
        config: &Config,
    ) {
        let discovered = TransportEvent::Discovered {
            device_id: device_id.to_string(),
            name,
        };
        if transport.send(discovered).is_err() {
            return;
        }

        let mut connection = DaydreamConnection::new(peripheral);
        let result = Self::run_link(&mut connection, device_id, transport, cancel, config).await;

        if let Err(e) = &result {
            if !cancel.is_cancelled() {
                warn!("Controller {} link error: {}", device_id, e);
                let _ = transport.send(TransportEvent::ConnectionLost {
                    device_id: device_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }

        if connection.is_connected().await.unwrap_or(false) {
            if let Err(e) = connection.disconnect().await {
                warn!("Error disconnecting controller {}: {}", device_id, e);
            }
        }
    }

    /// Returns `Ok` only when cancelled; any other exit is a lost link
    async fn run_link(
        connection: &mut DaydreamConnection,
        device_id: &str,
        transport: &TransportHandle,
        cancel: &CancellationToken,
        config: &Config,
    ) -> Result<()> {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = tokio::time::timeout(config.connect_timeout(), connection.connect()) => {
                result.map_err(|_| DaydreamError::Transport("Connection timed out".into()))??;
            }
        }

        let mut notifications = connection.subscribe().await?;
        transport.send(TransportEvent::Connected {
            device_id: device_id.to_string(),
        })?;
        info!("✓ Controller {} ready!", device_id);

        let poll = config.battery_poll_interval();
        let mut battery_timer = tokio::time::interval(poll.unwrap_or(Duration::from_secs(3600)));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                notification = notifications.next() => match notification {
                    Some(notification) if notification.uuid == INPUT_CHARACTERISTIC_UUID => {
                        transport.frame(device_id, notification.value)?;
                    }
                    Some(_) => {}
                    None => {
                        return Err(DaydreamError::Transport("Notification stream ended".into()));
                    }
                },
                _ = battery_timer.tick(), if poll.is_some() => {
                    match connection.read_battery().await {
                        Ok(Some(percent)) => transport.send(TransportEvent::Battery {
                            device_id: device_id.to_string(),
                            percent,
                        })?,
                        Ok(None) => {}
                        Err(e) => warn!("Controller {}: battery read failed: {}", device_id, e),
                    }
                }
            }
        }
    }
}

/// Implement Drop to disconnect controllers and stop threads
impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
