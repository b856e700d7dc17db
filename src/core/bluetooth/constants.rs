//! Constants used throughout the application
//! This module contains the default durations used for Bluetooth operations.

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Timeout for establishing a connection in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for read/write/subscribe round-trips in seconds
pub const BLUETOOTH_OPERATION_TIMEOUT_SECS: u64 = 10;

/// How long an unsubscribe waits for its notification task to wind down, in milliseconds
pub const UNSUBSCRIBE_GRACE_MS: u64 = 500;

