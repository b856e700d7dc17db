use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info};
use tokio::time::{Instant, sleep_until};

use crate::core::bluetooth::types::DiscoveredDevice;

/// Runs bounded discovery scans and keeps the device handles of the latest one
pub struct BluetoothScanner {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
}

impl BluetoothScanner {
    pub fn new(adapter: Adapter, devices: Arc<Mutex<HashMap<String, Device>>>) -> Self {
        Self { adapter, devices }
    }

    /// Scans for `duration` and returns the devices in the order they were first seen.
    ///
    /// Handles from the previous scan are dropped; only devices found by this
    /// scan can be connected to afterwards.
    pub async fn scan(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
        if let Ok(mut devices) = self.devices.lock() {
            devices.clear();
        }

        let mut found: Vec<DiscoveredDevice> = Vec::new();

        // Devices already connected to this host do not advertise
        info!("Checking for connected devices");
        for device in self.adapter.connected_devices().await? {
            self.record(&mut found, device);
        }

        info!("Starting bluetooth scan for {:?}", duration);
        let scan_stream = self.adapter.scan(&[]).await?;
        tokio::pin!(scan_stream);
        let deadline = Instant::now() + duration;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            debug!(
                                "Found device - Device: {:?}, RSSI: {:?}",
                                discovered_device.device, discovered_device.rssi
                            );
                            self.record(&mut found, discovered_device.device);
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    break;
                }
            }
        }

        info!("Scan complete, {} device(s) found", found.len());
        Ok(found)
    }

    fn record(&self, found: &mut Vec<DiscoveredDevice>, device: Device) {
        let id = device.id().to_string();
        let name = device.name().ok().filter(|n| !n.is_empty());

        if let Some(existing) = found.iter_mut().find(|d| d.address == id) {
            // Names often arrive in a later scan response
            if existing.name.is_none() && name.is_some() {
                existing.name = name;
            }
            return;
        }

        found.push(DiscoveredDevice::new(id.clone(), name));
        if let Ok(mut devices) = self.devices.lock() {
            devices.insert(id, device);
        }
    }
}
