//! GATT console library
//! This is the main library for the interactive BLE GATT console.

// Module declarations
pub mod app;
pub mod commands;
pub mod config;
pub mod console;
pub mod core;
pub mod logging;
pub mod state;
pub mod utils;

pub use app::App;
pub use config::ClientConfig;
