//! Core functionality for the GATT console
//! This module contains the device registry, the characteristic index and the
//! session controller, plus the Bluetooth transport they run on.

pub mod bluetooth;
pub mod characteristic_index;
pub mod errors;
pub mod registry;
pub mod session;

// Re-export commonly used types
pub use characteristic_index::{ActionableEntry, CharacteristicIndex};
pub use errors::SessionError;
pub use registry::DeviceRegistry;
pub use session::{Session, SessionOutcome};
