//! Defines shared data structures for the Bluetooth module.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

/// Represents a device found during a discovery scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Platform-specific identifier used to connect to the device
    pub address: String,
    /// The advertised name of the device, if available
    pub name: Option<String>,
}

impl DiscoveredDevice {
    /// Creates a new DiscoveredDevice instance
    pub fn new(address: impl Into<String>, name: Option<String>) -> Self {
        Self {
            address: address.into(),
            name,
        }
    }

    /// The name shown to the operator
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => "Unknown",
        }
    }

    /// The address shown to the operator.
    ///
    /// Platform identifiers often embed the MAC address (e.g. BlueZ object
    /// paths such as `/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF`); when one is
    /// found it is shown normalized, otherwise the raw identifier is shown.
    pub fn display_address(&self) -> String {
        extract_mac_address(&self.address).unwrap_or_else(|| self.address.clone())
    }
}

static MAC_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:_-]){5}[0-9A-Fa-f]{2}").ok());

fn extract_mac_address(device_id_str: &str) -> Option<String> {
    MAC_ADDRESS
        .as_ref()?
        .find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().replace(['_', '-'], ":").to_uppercase())
}

/// The capability set of a characteristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl Capabilities {
    pub const READ: Self = Self { read: true, write: false, notify: false, indicate: false };
    pub const WRITE: Self = Self { read: false, write: true, notify: false, indicate: false };
    pub const NOTIFY: Self = Self { read: false, write: false, notify: true, indicate: false };
    pub const INDICATE: Self = Self { read: false, write: false, notify: false, indicate: true };

    /// Union of two capability sets
    pub const fn with(self, other: Self) -> Self {
        Self {
            read: self.read || other.read,
            write: self.write || other.write,
            notify: self.notify || other.notify,
            indicate: self.indicate || other.indicate,
        }
    }

    /// True if the characteristic can be subscribed to
    pub fn can_subscribe(&self) -> bool {
        self.notify || self.indicate
    }

    /// True if the capability set intersects {READ, NOTIFY, INDICATE}
    pub fn is_actionable(&self) -> bool {
        self.read || self.can_subscribe()
    }

    pub fn is_empty(&self) -> bool {
        !(self.read || self.write || self.notify || self.indicate)
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = [
            (self.read, "read"),
            (self.write, "write"),
            (self.notify, "notify"),
            (self.indicate, "indicate"),
        ]
        .into_iter()
        .filter_map(|(set, label)| set.then_some(label))
        .collect();

        if labels.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", labels.join(", "))
        }
    }
}

/// A characteristic as reported by service enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub capabilities: Capabilities,
}

impl CharacteristicInfo {
    pub fn new(uuid: Uuid, capabilities: Capabilities) -> Self {
        Self { uuid, capabilities }
    }
}

/// A service and its characteristics, in the order the device reported them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub characteristics: Vec<CharacteristicInfo>,
}

impl ServiceInfo {
    pub fn new(uuid: Uuid, characteristics: Vec<CharacteristicInfo>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }
}

/// A value pushed by the peripheral for a subscribed characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

/// Link-level changes a transport reports for one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The peripheral dropped the connection
    Disconnected,
    /// A notify/indicate registration stopped without being cancelled
    SubscriptionEnded(Uuid),
}
