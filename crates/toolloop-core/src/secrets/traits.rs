//! Core traits and types for secret lookup

use thiserror::Error;

/// Errors that can occur during secret lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecretStoreError {
    #[error("Secret not found: {key} (checked {store})")]
    NotFound { key: String, store: String },

    #[error("Store not available: {0}")]
    NotAvailable(String),
}

pub type SecretStoreResult<T> = Result<T, SecretStoreError>;

/// Read-only source of credentials (API keys, tracing keys)
///
/// Implementations:
/// - Environment variables (`EnvSecretStore`)
/// - In-memory for testing (`MemorySecretStore`)
/// - Chained for fallback behavior (`ChainSecretStore`)
///
/// # Example
///
/// ```
/// use toolloop_core::secrets::{SecretStore, EnvSecretStore};
///
/// let store = EnvSecretStore::new();
/// // store.get("gemini") checks GEMINI_API_KEY, then GOOGLE_API_KEY
/// ```
pub trait SecretStore: Send + Sync {
    /// Human-readable name of this store
    fn name(&self) -> &str;

    /// Whether this store can be queried at all
    fn is_available(&self) -> bool {
        true
    }

    /// Retrieve a secret by key
    ///
    /// The key can be a logical name (e.g. "gemini", "langfuse_public_key")
    /// or a direct key (e.g. "GOOGLE_API_KEY").
    fn get(&self, key: &str) -> Option<String>;

    /// Check if a secret exists
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Retrieve a secret that must be present
    fn require(&self, key: &str) -> SecretStoreResult<String> {
        self.get(key).ok_or_else(|| SecretStoreError::NotFound {
            key: key.to_string(),
            store: self.name().to_string(),
        })
    }
}
