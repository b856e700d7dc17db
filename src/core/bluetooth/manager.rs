//! Bluetooth manager backed by the platform adapter
//! This module provides the [`Transport`] implementation used by the console.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use bluest::{Adapter, Device};
use log::{info, warn};
use uuid::Uuid;

use crate::core::bluetooth::connection::{BluestConnection, ConnectionManager};
use crate::core::bluetooth::constants::UNSUBSCRIBE_GRACE_MS;
use crate::core::bluetooth::notification::NotificationSubscription;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::transport::{
    LinkEventSink, NotificationSink, Transport, TransportError,
};
use crate::core::bluetooth::types::{DiscoveredDevice, ServiceInfo};

/// Manages Bluetooth operations
pub struct BluetoothManager {
    /// Device handles from the latest scan, keyed by address
    devices: Arc<Mutex<HashMap<String, Device>>>,
    /// Connection manager
    connection_manager: ConnectionManager,
    /// Bluetooth scanner
    scanner: BluetoothScanner,
    /// Upper bound for read/write/subscribe round-trips
    operation_timeout: Duration,
}

impl BluetoothManager {
    /// Creates a new BluetoothManager on the default adapter
    pub async fn new(operation_timeout: Duration) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let devices = Arc::new(Mutex::new(HashMap::new()));
        let connection_manager = ConnectionManager::new(adapter.clone());
        let scanner = BluetoothScanner::new(adapter, devices.clone());

        Ok(Self {
            devices,
            connection_manager,
            scanner,
            operation_timeout,
        })
    }

    async fn bounded<T: Send>(
        &self,
        operation: &'static str,
        uuid: Uuid,
        fut: impl Future<Output = Result<T, TransportError>> + Send,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| TransportError::OperationTimeout { operation, uuid })?
    }
}

#[async_trait::async_trait]
impl Transport for BluetoothManager {
    type Connection = BluestConnection;

    async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>, TransportError> {
        self.scanner
            .scan(duration)
            .await
            .map_err(|e| TransportError::Discovery(e.to_string()))
    }

    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<BluestConnection, TransportError> {
        let device = {
            let devices = self.devices.lock().map_err(|_| TransportError::Connect {
                address: address.to_string(),
                reason: "device cache unavailable".to_string(),
            })?;
            devices.get(address).cloned()
        };
        let device = device.ok_or_else(|| TransportError::Connect {
            address: address.to_string(),
            reason: "device not found in the latest scan".to_string(),
        })?;

        self.connection_manager.connect(device, address, timeout).await
    }

    async fn enumerate(&self, conn: &BluestConnection) -> Result<Vec<ServiceInfo>, TransportError> {
        conn.discover().await
    }

    async fn watch(
        &self,
        conn: &BluestConnection,
        events: LinkEventSink,
    ) -> Result<(), TransportError> {
        self.connection_manager.watch(conn, events).await
    }

    async fn read(&self, conn: &BluestConnection, uuid: Uuid) -> Result<Vec<u8>, TransportError> {
        let characteristic = conn.characteristic(uuid)?;
        self.bounded("read", uuid, async move {
            characteristic
                .read()
                .await
                .map_err(|e| TransportError::Read {
                    uuid,
                    reason: e.to_string(),
                })
        })
        .await
    }

    async fn write(
        &self,
        conn: &BluestConnection,
        uuid: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError> {
        let characteristic = conn.characteristic(uuid)?;
        self.bounded("write", uuid, async move {
            characteristic
                .write(data)
                .await
                .map_err(|e| TransportError::Write {
                    uuid,
                    reason: e.to_string(),
                })
        })
        .await
    }

    async fn subscribe(
        &self,
        conn: &BluestConnection,
        uuid: Uuid,
        sink: NotificationSink,
    ) -> Result<(), TransportError> {
        let mut subscriptions = conn.subscriptions.lock().await;
        // A registration whose stream already ended is replaced
        if subscriptions
            .get(&uuid)
            .is_some_and(NotificationSubscription::is_active)
        {
            return Ok(());
        }

        let characteristic = conn.characteristic(uuid)?;
        let subscription = NotificationSubscription::start(
            characteristic,
            sink,
            conn.link_events(),
            self.operation_timeout,
        )
        .await?;
        subscriptions.insert(uuid, subscription);
        Ok(())
    }

    async fn unsubscribe(&self, conn: &BluestConnection, uuid: Uuid) -> Result<(), TransportError> {
        let subscription = conn.subscriptions.lock().await.remove(&uuid);
        match subscription {
            Some(subscription) => subscription
                .stop(Duration::from_millis(UNSUBSCRIBE_GRACE_MS))
                .await
                .map_err(|reason| TransportError::Subscription { uuid, reason }),
            None => Ok(()),
        }
    }

    async fn disconnect(&self, conn: BluestConnection) -> Result<(), TransportError> {
        let leftovers: Vec<_> = conn.subscriptions.lock().await.drain().collect();
        for (uuid, subscription) in leftovers {
            if let Err(e) = subscription
                .stop(Duration::from_millis(UNSUBSCRIBE_GRACE_MS))
                .await
            {
                warn!("Failed to stop notifications on {} during disconnect: {}", uuid, e);
            }
        }
        self.connection_manager.disconnect(&conn).await
    }

    async fn is_connected(&self, conn: &BluestConnection) -> bool {
        conn.device().is_connected().await
    }
}
