//! Daydream connection management
//!
//! This module handles the Bluetooth link to one Daydream controller:
//! recognising it from advertisement data, connecting, locating the input
//! and battery characteristics, and disconnecting.

use btleplug::api::{Characteristic, Peripheral as _, PeripheralProperties, ValueNotification};
use btleplug::platform::Peripheral;
use futures::stream::Stream;
use log::{debug, info};
use std::pin::Pin;

use crate::daydream::constants::*;
use crate::error::{DaydreamError, Result};

/// Whether advertised properties belong to a Daydream controller
///
/// Matches on the advertised service UUID, falling back to the local name
/// since some platforms drop the service list from scan responses.
pub fn is_daydream(properties: &PeripheralProperties, name_prefix: &str) -> bool {
    if properties.services.contains(&DAYDREAM_SERVICE_UUID) {
        return true;
    }
    properties
        .local_name
        .as_deref()
        .map(|name| name.starts_with(name_prefix))
        .unwrap_or(false)
}

/// Daydream BLE connection wrapper
pub struct DaydreamConnection {
    peripheral: Peripheral,
    input_char: Option<Characteristic>,
    battery_char: Option<Characteristic>,
}

impl DaydreamConnection {
    pub fn new(peripheral: Peripheral) -> Self {
        Self {
            peripheral,
            input_char: None,
            battery_char: None,
        }
    }

    /// Connect and locate the characteristics we need
    pub async fn connect(&mut self) -> Result<()> {
        info!("Connecting to Daydream controller...");
        self.peripheral.connect().await?;

        info!("Discovering services...");
        self.peripheral.discover_services().await?;

        for char in self.peripheral.characteristics() {
            if char.uuid == INPUT_CHARACTERISTIC_UUID {
                debug!("Found input characteristic");
                self.input_char = Some(char);
            } else if char.uuid == BATTERY_LEVEL_CHARACTERISTIC_UUID
                && char.service_uuid == BATTERY_SERVICE_UUID
            {
                debug!("Found battery level characteristic");
                self.battery_char = Some(char);
            }
        }

        if self.input_char.is_none() {
            return Err(DaydreamError::Transport(
                "Input characteristic not found".into(),
            ));
        }

        info!("✓ Connected successfully!");
        Ok(())
    }

    /// Subscribe to input frames and return the notification stream
    pub async fn subscribe(
        &self,
    ) -> Result<Pin<Box<dyn Stream<Item = ValueNotification> + Send>>> {
        let input_char = self
            .input_char
            .as_ref()
            .ok_or_else(|| DaydreamError::Transport("Not connected".into()))?;

        self.peripheral.subscribe(input_char).await?;
        debug!("Subscribed to input notifications");

        Ok(self.peripheral.notifications().await?)
    }

    /// Read the battery level in percent, if the controller exposes it
    pub async fn read_battery(&self) -> Result<Option<u8>> {
        match &self.battery_char {
            Some(battery_char) => {
                let value = self.peripheral.read(battery_char).await?;
                Ok(value.first().copied())
            }
            None => Ok(None),
        }
    }

    /// Disconnect from the controller
    pub async fn disconnect(&mut self) -> Result<()> {
        info!("Disconnecting from Daydream controller...");

        if let Some(input_char) = &self.input_char {
            let _ = self.peripheral.unsubscribe(input_char).await;
        }

        self.peripheral.disconnect().await?;
        info!("✓ Disconnected successfully!");
        Ok(())
    }

    pub async fn is_connected(&self) -> Result<bool> {
        Ok(self.peripheral.is_connected().await?)
    }

    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }
}
