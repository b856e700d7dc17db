use std::sync::Arc;

use anyhow::Result;
use gatt_console_lib::{
    App, ClientConfig,
    console::{StdConsole, StdinSource, watch_interrupt},
    core::bluetooth::BluetoothManager,
    logging,
};
use log::{LevelFilter, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging depends on the config, so a fallback is reported once it is up
    let (config, config_error) = match ClientConfig::load_config().await {
        Ok(config) => (config, None),
        Err(e) => (ClientConfig::default(), Some(e)),
    };
    logging::init(config.level_filter().unwrap_or(LevelFilter::Warn));
    if let Some(e) = config_error {
        warn!("Using default config: {:#}", e);
    }
    info!("Starting with {:?}", config);

    let interrupt = watch_interrupt();
    let transport = Arc::new(BluetoothManager::new(config.operation_timeout()).await?);

    let console = Arc::new(StdConsole::new());
    let input = StdinSource::new(console.clone(), interrupt.clone());

    App::new(transport, input, console, config, interrupt).run().await;
    Ok(())
}
