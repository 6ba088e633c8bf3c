//! Daydream Controller Monitor - Main Application
//!
//! Scans for Daydream controllers and logs every button, touchpad and
//! battery event until Ctrl+C.

use daydream_rs::{Config, ConnectionManager, Controller, ControllerEvent, ManagerEvent};
use log::{info, warn};
use std::sync::Arc;
use std::thread;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Daydream Controller Monitor ===");
    println!();
    println!("This application will:");
    println!("1. Scan for Daydream controllers");
    println!("2. Connect to every controller it finds");
    println!("3. Log button, touchpad and battery events");
    println!("4. Remember seen controllers in daydream_devices.json");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let config = match Config::load_default() {
        Ok(config) => {
            println!("✓ Loaded configuration from configs/default.toml");
            config
        }
        Err(e) => {
            warn!("Using built-in defaults: {}", e);
            Config::default()
        }
    };

    let manager = ConnectionManager::new(config)?;
    manager.start_discovery()?;

    for event in manager.events().iter() {
        match event {
            ManagerEvent::Discovered(controller) => watch(controller),
            ManagerEvent::Connected(device_id) => info!("Controller {} connected", device_id),
            ManagerEvent::Disconnected(device_id) => info!("Controller {} disconnected", device_id),
            ManagerEvent::Evicted(device_id) => info!("Controller {} forgotten", device_id),
        }
    }

    Ok(())
}

/// Log one controller's events on its own thread until it is evicted
fn watch(controller: Arc<Controller>) {
    let events = controller.subscribe();
    let device_id = controller.device_id().to_string();

    let spawned = thread::Builder::new()
        .name(format!("watch-{}", device_id))
        .spawn(move || {
            for event in events.iter() {
                match event {
                    ControllerEvent::Button(event) => info!("[{}] {:?}", device_id, event),
                    ControllerEvent::Touch(event) => info!("[{}] {:?}", device_id, event),
                    ControllerEvent::Battery(level) => {
                        info!("[{}] Battery Level: {:.0}%", device_id, level * 100.0)
                    }
                    ControllerEvent::StatusChanged(status) => info!("[{}] {:?}", device_id, status),
                    ControllerEvent::Disconnected(reason) => {
                        info!("[{}] Disconnected: {:?}", device_id, reason)
                    }
                    ControllerEvent::State(_) => {}
                }
            }
        });

    if let Err(e) = spawned {
        warn!("Failed to start event logger: {}", e);
    }
}
