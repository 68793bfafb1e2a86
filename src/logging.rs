use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;

// @module: Optional stderr logger for embedders of the engine

// @struct: Timestamped, colour-coded stderr logger
pub struct StorageLogger {
    level: LevelFilter,
}

impl StorageLogger {
    // @creates: New logger with specified level
    pub fn new(level: LevelFilter) -> Self {
        StorageLogger { level }
    }

    // @returns: ANSI colour for log level
    fn colour_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

// @initializes: Global logger; fails if another logger is already installed
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(StorageLogger::new(level)))?;
    log::set_max_level(level);
    Ok(())
}

impl Log for StorageLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let now = chrono::Local::now().format("%H:%M:%S.%3f");
        let mut stderr = std::io::stderr();
        let _ = writeln!(
            stderr,
            "\x1B[{}m{} {:<5} [{}] {}\x1B[0m",
            Self::colour_for_level(record.level()),
            now,
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}
