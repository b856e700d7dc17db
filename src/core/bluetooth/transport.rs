//! Transport boundary for GATT operations
//! The session logic only talks to a peripheral through the [`Transport`] trait,
//! so the radio stack can be swapped for an in-memory one in tests.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::bluetooth::types::{DiscoveredDevice, LinkEvent, Notification, ServiceInfo};

/// Where a transport delivers inbound notifications
pub type NotificationSink = mpsc::UnboundedSender<Notification>;

/// Where a transport reports link loss and dead subscriptions for one connection
pub type LinkEventSink = mpsc::UnboundedSender<LinkEvent>;

/// Failures reported by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("connection to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    #[error("connection to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("service discovery failed: {0}")]
    ServiceDiscovery(String),

    #[error("characteristic {0} is not known on this connection")]
    UnknownCharacteristic(Uuid),

    #[error("read from {uuid} failed: {reason}")]
    Read { uuid: Uuid, reason: String },

    #[error("write to {uuid} failed: {reason}")]
    Write { uuid: Uuid, reason: String },

    #[error("subscription change for {uuid} failed: {reason}")]
    Subscription { uuid: Uuid, reason: String },

    #[error("{operation} on {uuid} timed out")]
    OperationTimeout { operation: &'static str, uuid: Uuid },

    #[error("device is not connected")]
    NotConnected,
}

impl TransportError {
    /// True for failures that invalidate the whole connection rather than one operation
    pub fn is_connection_scoped(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::Connect { .. }
                | Self::ServiceDiscovery(_)
                | Self::NotConnected
        )
    }
}

/// Abstract BLE capability consumed by the registry and the session controller.
///
/// Implementations must de-duplicate discovery results by address and keep
/// discovery order. `disconnect` is best-effort: callers log its failure and
/// move on.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Handle for one live connection
    type Connection: Send + Sync;

    async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>, TransportError>;

    async fn connect(
        &self,
        address: &str,
        timeout: Duration,
    ) -> Result<Self::Connection, TransportError>;

    async fn enumerate(&self, conn: &Self::Connection) -> Result<Vec<ServiceInfo>, TransportError>;

    /// Starts reporting [`LinkEvent`]s for `conn` into `events` until it is disconnected.
    ///
    /// A deliberate `unsubscribe` or `disconnect` is never reported.
    async fn watch(
        &self,
        conn: &Self::Connection,
        events: LinkEventSink,
    ) -> Result<(), TransportError>;

    async fn read(&self, conn: &Self::Connection, uuid: Uuid) -> Result<Vec<u8>, TransportError>;

    async fn write(
        &self,
        conn: &Self::Connection,
        uuid: Uuid,
        data: &[u8],
    ) -> Result<(), TransportError>;

    async fn subscribe(
        &self,
        conn: &Self::Connection,
        uuid: Uuid,
        sink: NotificationSink,
    ) -> Result<(), TransportError>;

    async fn unsubscribe(&self, conn: &Self::Connection, uuid: Uuid) -> Result<(), TransportError>;

    async fn disconnect(&self, conn: Self::Connection) -> Result<(), TransportError>;

    async fn is_connected(&self, conn: &Self::Connection) -> bool;
}
