//! Logging abstractions
//!
//! Components take a [`SharedLogger`] in their constructors; nothing logs
//! through a global.

mod console;
mod memory;
mod noop;
mod traits;

pub use console::{ConsoleLogger, LOG_LEVEL_ENV};
pub use memory::MemoryLogger;
pub use noop::NoOpLogger;
pub use traits::{LogLevel, Logger, LoggerExt, SharedLogger};
