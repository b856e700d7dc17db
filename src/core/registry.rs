//! Device registry
//! Holds the result of the latest discovery scan and resolves operator selections.

use std::time::Duration;

use log::info;

use crate::core::bluetooth::{DiscoveredDevice, Transport, TransportError};
use crate::core::errors::SessionError;

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DiscoveredDevice>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one discovery scan and replaces the current list with its result.
    ///
    /// On failure the previous list is discarded as well, so stale indices can
    /// never resolve.
    pub async fn scan<T: Transport>(
        &mut self,
        transport: &T,
        duration: Duration,
    ) -> Result<&[DiscoveredDevice], TransportError> {
        self.devices.clear();
        self.devices = transport.discover(duration).await?;
        info!("Registry holds {} device(s)", self.devices.len());
        Ok(&self.devices)
    }

    /// Returns the address of the device shown at `index`
    pub fn resolve(&self, index: usize) -> Result<&str, SessionError> {
        self.devices
            .get(index)
            .map(|device| device.address.as_str())
            .ok_or(SessionError::SelectionOutOfRange {
                index,
                len: self.devices.len(),
            })
    }

    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// One line per device, numbered by position
    pub fn listing(&self) -> Vec<String> {
        if self.devices.is_empty() {
            return vec!["[-] No devices found.".to_string()];
        }
        self.devices
            .iter()
            .enumerate()
            .map(|(i, device)| {
                format!(
                    "[{}] {} ({})",
                    i,
                    device.display_name(),
                    device.display_address()
                )
            })
            .collect()
    }
}
