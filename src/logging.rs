use std::io::Write;

use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};

/// Writes diagnostics to stderr so they never mix with operator output on stdout
pub struct ConsoleLogger {
    level: LevelFilter,
}

impl ConsoleLogger {
    pub fn new(level: LevelFilter) -> Self {
        Self { level }
    }

    /// Installs the logger; fails if another logger is already set
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(ConsoleLogger::new(level)))
            .map(|()| log::set_max_level(level))
    }

    fn format_record(record: &Record) -> String {
        format!(
            "[{} {:<5} {}] {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", Self::format_record(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Sets up logging at `level`, using env_logger only if the console logger cannot be installed
pub fn init(level: LevelFilter) {
    if ConsoleLogger::init(level).is_err() {
        let _ = env_logger::builder().filter_level(level).try_init();
    }
    log::info!("Logging initialized at {}", level);
}
