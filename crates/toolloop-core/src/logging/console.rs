//! Console logger implementation

use super::traits::{LogLevel, Logger};

/// Environment variable holding the minimum console log level
pub const LOG_LEVEL_ENV: &str = "TOOLLOOP_LOG_LEVEL";

/// A logger that writes to stdout (info) and stderr (everything else)
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    prefix: String,
    min_level: LogLevel,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogger {
    /// Console logger with the default prefix, filtered by `TOOLLOOP_LOG_LEVEL`
    pub fn new() -> Self {
        Self::with_prefix("[toolloop]")
    }

    /// Console logger with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let min_level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(LogLevel::Info);
        Self {
            prefix: prefix.into(),
            min_level,
        }
    }

    /// Override the minimum level
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn write(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }
        match level {
            LogLevel::Info => println!("{} {}: {}", self.prefix, level, message),
            _ => eprintln!("{} {}: {}", self.prefix, level, message),
        }
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        self.write(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.write(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.write(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.write(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logger_creation() {
        let logger = ConsoleLogger::with_prefix("[stock]").with_level(LogLevel::Warn);
        assert_eq!(logger.prefix, "[stock]");
        assert!(!logger.enabled(LogLevel::Info));
        assert!(logger.enabled(LogLevel::Error));
    }

    #[test]
    fn test_console_logger_logs() {
        let logger = ConsoleLogger::new().with_level(LogLevel::Debug);
        logger.debug("debug message");
        logger.info("info message");
        logger.warn("warn message");
        logger.error("error message");
    }
}
