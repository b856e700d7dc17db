//! Characteristic index
//! Built once per connection. Every characteristic that can be read, notified
//! or indicated gets a dense index in discovery order; operator commands refer
//! to characteristics by that index only.

use uuid::Uuid;

use crate::core::bluetooth::{Capabilities, ServiceInfo};
use crate::core::errors::SessionError;

/// An indexed characteristic the operator can act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionableEntry {
    pub index: usize,
    pub uuid: Uuid,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, Default)]
pub struct CharacteristicIndex {
    services: Vec<ServiceInfo>,
    entries: Vec<ActionableEntry>,
}

impl CharacteristicIndex {
    pub fn build(services: Vec<ServiceInfo>) -> Self {
        let entries = services
            .iter()
            .flat_map(|service| service.characteristics.iter())
            .filter(|characteristic| characteristic.capabilities.is_actionable())
            .enumerate()
            .map(|(index, characteristic)| ActionableEntry {
                index,
                uuid: characteristic.uuid,
                capabilities: characteristic.capabilities,
            })
            .collect();

        Self { services, entries }
    }

    pub fn entries(&self) -> &[ActionableEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up an index typed by the operator
    pub fn get(&self, index: usize) -> Result<&ActionableEntry, SessionError> {
        if self.entries.is_empty() {
            return Err(SessionError::NoActionableCharacteristics);
        }
        self.entries
            .get(index)
            .ok_or(SessionError::SelectionOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// Human-readable listing of every service and characteristic.
    ///
    /// Indexed characteristics show their index, the rest show `[-]`.
    pub fn listing(&self) -> Vec<String> {
        let mut lines = vec!["[+] Available GATT Services and Characteristics:".to_string()];
        let mut next_index = 0;

        for service in &self.services {
            lines.push(format!("  [Service] {}", service.uuid));
            for characteristic in &service.characteristics {
                let marker = if characteristic.capabilities.is_actionable() {
                    let marker = format!("[{}]", next_index);
                    next_index += 1;
                    marker
                } else {
                    "[-]".to_string()
                };
                lines.push(format!(
                    "    └── {} [Char] {} ({})",
                    marker, characteristic.uuid, characteristic.capabilities
                ));
            }
        }

        if self.entries.is_empty() {
            lines.push(
                "[-] No readable or subscribable characteristics; read and subscribe are unavailable."
                    .to_string(),
            );
        }
        lines
    }
}
