//! Bluetooth connection handling
//! This module handles connecting to and disconnecting from a peripheral and
//! keeps the characteristic handles discovered on that connection.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use bluest::{Adapter, Characteristic, ConnectionEvent, Device};
use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::notification::NotificationSubscription;
use crate::core::bluetooth::transport::{LinkEventSink, TransportError};
use crate::core::bluetooth::types::{Capabilities, CharacteristicInfo, LinkEvent, ServiceInfo};

/// A live connection to one peripheral
pub struct BluestConnection {
    device: Device,
    address: String,
    characteristics: Mutex<HashMap<Uuid, Characteristic>>,
    pub(crate) subscriptions: tokio::sync::Mutex<HashMap<Uuid, NotificationSubscription>>,
    link_events: Mutex<Option<LinkEventSink>>,
    watcher: CancellationToken,
}

impl BluestConnection {
    fn new(device: Device, address: String) -> Self {
        Self {
            device,
            address,
            characteristics: Mutex::new(HashMap::new()),
            subscriptions: tokio::sync::Mutex::new(HashMap::new()),
            link_events: Mutex::new(None),
            watcher: CancellationToken::new(),
        }
    }

    /// Sink given to [`ConnectionManager::watch`], if any
    pub(crate) fn link_events(&self) -> Option<LinkEventSink> {
        self.link_events.lock().ok().and_then(|events| events.clone())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Looks up a characteristic handle found by [`BluestConnection::discover`]
    pub(crate) fn characteristic(&self, uuid: Uuid) -> Result<Characteristic, TransportError> {
        self.characteristics
            .lock()
            .map_err(|_| TransportError::UnknownCharacteristic(uuid))?
            .get(&uuid)
            .cloned()
            .ok_or(TransportError::UnknownCharacteristic(uuid))
    }

    /// Walks every service and characteristic in the order the device reports them
    pub(crate) async fn discover(&self) -> Result<Vec<ServiceInfo>, TransportError> {
        info!("Discovering services on {}...", self.address);
        let services = self
            .device
            .discover_services()
            .await
            .map_err(|e| TransportError::ServiceDiscovery(e.to_string()))?;

        let mut handles = HashMap::new();
        let mut result = Vec::with_capacity(services.len());

        for service in services {
            let mut characteristics = Vec::new();
            let discovered = service
                .discover_characteristics()
                .await
                .map_err(|e| TransportError::ServiceDiscovery(e.to_string()))?;

            for characteristic in discovered {
                let uuid = characteristic.uuid();
                let capabilities = match characteristic.properties().await {
                    Ok(props) => Capabilities {
                        read: props.read,
                        write: props.write || props.write_without_response,
                        notify: props.notify,
                        indicate: props.indicate,
                    },
                    Err(e) => {
                        warn!("Could not read properties of {}: {}", uuid, e);
                        Capabilities::default()
                    }
                };

                if handles.insert(uuid, characteristic).is_some() {
                    warn!(
                        "Characteristic {} appears in more than one service; the later one is used",
                        uuid
                    );
                }
                characteristics.push(CharacteristicInfo::new(uuid, capabilities));
            }

            result.push(ServiceInfo::new(service.uuid(), characteristics));
        }

        if let Ok(mut guard) = self.characteristics.lock() {
            *guard = handles;
        }
        info!("Found {} service(s) on {}", result.len(), self.address);
        Ok(result)
    }
}

/// Connection manager for peripherals
#[derive(Clone)]
pub struct ConnectionManager {
    adapter: Adapter,
}

impl ConnectionManager {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Connects to `device`, giving up after `timeout`
    pub async fn connect(
        &self,
        device: Device,
        address: &str,
        timeout: Duration,
    ) -> Result<BluestConnection, TransportError> {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Device details - ID: {}, Name: {:?}", address, name);

        if !device.is_connected().await {
            info!("Initiating connection to {}...", address);
            match tokio::time::timeout(timeout, self.adapter.connect_device(&device)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(TransportError::Connect {
                        address: address.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    return Err(TransportError::ConnectTimeout {
                        address: address.to_string(),
                        timeout,
                    });
                }
            }
        }

        info!("Connection to {} successful", address);
        Ok(BluestConnection::new(device, address.to_string()))
    }

    /// Reports a dropped link on `events` until the connection is closed deliberately
    pub async fn watch(
        &self,
        conn: &BluestConnection,
        events: LinkEventSink,
    ) -> Result<(), TransportError> {
        if let Ok(mut slot) = conn.link_events.lock() {
            *slot = Some(events.clone());
        }

        let adapter = self.adapter.clone();
        let device = conn.device.clone();
        let address = conn.address.clone();
        let cancel_token = conn.watcher.clone();

        tokio::spawn(async move {
            let mut connection_events = match adapter.device_connection_events(&device).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Cannot watch connection state of {}: {}", address, e);
                    return;
                }
            };

            loop {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    event = connection_events.next() => match event {
                        Some(ConnectionEvent::Disconnected) => {
                            warn!("{} disconnected", address);
                            let _ = events.send(LinkEvent::Disconnected);
                            break;
                        }
                        Some(ConnectionEvent::Connected) => {}
                        None => break,
                    },
                }
            }
            debug!("Connection watcher for {} stopped", address);
        });
        Ok(())
    }

    /// Disconnects from the peripheral
    pub async fn disconnect(&self, conn: &BluestConnection) -> Result<(), TransportError> {
        // A deliberate disconnect is not a lost link
        conn.watcher.cancel();
        let device = conn.device();
        if device.is_connected().await {
            info!("Disconnecting from device {}", conn.address());
            self.adapter
                .disconnect_device(device)
                .await
                .map_err(|e| TransportError::Connect {
                    address: conn.address().to_string(),
                    reason: e.to_string(),
                })?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", conn.address());
        }
        Ok(())
    }
}
