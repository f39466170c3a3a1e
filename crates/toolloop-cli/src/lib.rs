//! Shared setup for the toolloop programs

use std::sync::Arc;

use toolloop_core::logging::{ConsoleLogger, SharedLogger};
use toolloop_core::secrets::{EnvSecretStore, SecretStore};

/// First positional argument, or `default` when none is given
pub fn query_from_args(default: &str) -> String {
    query_or_default(std::env::args().nth(1), default)
}

fn query_or_default(arg: Option<String>, default: &str) -> String {
    arg.filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Console logger honoring `TOOLLOOP_LOG_LEVEL`
pub fn console_logger() -> SharedLogger {
    Arc::new(ConsoleLogger::new())
}

/// Credentials and overrides from the process environment
pub fn env_secrets() -> Arc<dyn SecretStore> {
    Arc::new(EnvSecretStore::new())
}
