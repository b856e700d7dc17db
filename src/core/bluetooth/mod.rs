//! Bluetooth functionality for the GATT console
//! This module handles all bluetooth operations including scanning,
//! connecting, and exchanging characteristic values with a peripheral.

mod connection;
mod constants;
mod manager;
mod notification;
mod scanner;
mod transport;
mod types;

// Re-export types that should be publicly accessible
pub use connection::{BluestConnection, ConnectionManager};
pub use constants::*; // Re-export all constants
pub use manager::BluetoothManager;
pub use notification::{NotificationSubscription, format_notification, spawn_notification_printer};
pub use scanner::BluetoothScanner;
pub use transport::{LinkEventSink, NotificationSink, Transport, TransportError};
pub use types::{
    Capabilities, CharacteristicInfo, DiscoveredDevice, LinkEvent, Notification, ServiceInfo,
};
