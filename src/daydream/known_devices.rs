//! Cache of previously seen controllers
//!
//! Every controller the scanner finds is recorded with its name and when it
//! was last seen, so rediscovery can be logged as a returning device.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::daydream::types::DeviceId;

/// Cache file name
const CACHE_FILENAME: &str = "daydream_devices.json";

/// Default cache location: next to the executable, else the current dir
pub fn default_cache_path() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            return exe_dir.join(CACHE_FILENAME);
        }
    }

    PathBuf::from(CACHE_FILENAME)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownDevice {
    pub device_id: DeviceId,

    #[serde(default)]
    pub name: Option<String>,

    /// Unix timestamp (seconds)
    #[serde(default)]
    pub last_seen: u64,

    /// How many times the scanner has found this device
    #[serde(default)]
    pub times_seen: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnownDevices {
    pub devices: HashMap<DeviceId, KnownDevice>,
}

impl KnownDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path`; a missing or unreadable file gives an empty cache
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(cache) => {
                    debug!("Loaded device cache from: {}", path.display());
                    cache
                }
                Err(e) => {
                    warn!("Failed to parse device cache: {}", e);
                    Self::new()
                }
            },
            Err(_) => {
                debug!("No existing device cache at: {}", path.display());
                Self::new()
            }
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        debug!("Saved device cache to: {}", path.display());
        Ok(())
    }

    /// Record a sighting; returns true if the device was already known
    pub fn record(&mut self, device_id: &str, name: Option<String>) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        match self.devices.get_mut(device_id) {
            Some(known) => {
                known.last_seen = now;
                known.times_seen = known.times_seen.saturating_add(1);
                if name.is_some() {
                    known.name = name;
                }
                info!("Known controller {} seen again ({} times)", device_id, known.times_seen);
                true
            }
            None => {
                info!("Caching controller: {}", device_id);
                self.devices.insert(
                    device_id.to_string(),
                    KnownDevice {
                        device_id: device_id.to_string(),
                        name,
                        last_seen: now,
                        times_seen: 1,
                    },
                );
                false
            }
        }
    }

    /// Record a sighting and write the cache to `path` straight away
    pub fn remember(&mut self, path: &Path, device_id: &str, name: Option<String>) -> bool {
        let known = self.record(device_id, name);
        if let Err(e) = self.save(path) {
            warn!("Failed to save device cache: {}", e);
        }
        known
    }

    pub fn get(&self, device_id: &str) -> Option<&KnownDevice> {
        self.devices.get(device_id)
    }

    pub fn forget(&mut self, device_id: &str) -> Option<KnownDevice> {
        self.devices.remove(device_id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_forget() {
        let mut cache = KnownDevices::new();
        assert!(cache.is_empty());

        assert!(!cache.record("AA:BB:CC:DD:EE:FF", Some("Daydream controller".to_string())));
        assert!(cache.record("AA:BB:CC:DD:EE:FF", None));
        assert_eq!(cache.len(), 1);

        let known = cache.get("AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(known.times_seen, 2);
        // A sighting without a name keeps the old one
        assert_eq!(known.name.as_deref(), Some("Daydream controller"));

        assert!(cache.forget("AA:BB:CC:DD:EE:FF").is_some());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("daydream_devices_{}.json", std::process::id()));
        let mut cache = KnownDevices::new();
        cache.record("11:22:33:44:55:66", None);
        cache.save(&path).unwrap();

        let loaded = KnownDevices::load(&path);
        assert!(loaded.get("11:22:33:44:55:66").is_some());
        let _ = fs::remove_file(&path);

        assert!(KnownDevices::load(&path).is_empty());
    }

    #[test]
    fn test_remember_saves_each_sighting() {
        let path = std::env::temp_dir().join(format!("daydream_remember_{}.json", std::process::id()));
        let mut cache = KnownDevices::new();

        assert!(!cache.remember(&path, "AA:00:00:00:00:01", Some("Daydream controller".to_string())));
        assert_eq!(KnownDevices::load(&path).len(), 1);

        assert!(cache.remember(&path, "AA:00:00:00:00:01", None));
        cache.remember(&path, "AA:00:00:00:00:02", None);
        let loaded = KnownDevices::load(&path);
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("AA:00:00:00:00:01").unwrap().times_seen, 2);
    }
}
