//! Chained secret store with fallback behavior

use std::sync::Arc;

use super::traits::SecretStore;

/// Tries each store in order and returns the first match
///
/// ```
/// use std::sync::Arc;
/// use toolloop_core::secrets::{ChainSecretStore, EnvSecretStore, MemorySecretStore, SecretStore};
///
/// let overrides = Arc::new(MemorySecretStore::new().with("gemini", "from-config"));
/// let chain = ChainSecretStore::new(vec![overrides, Arc::new(EnvSecretStore::new())]);
/// assert_eq!(chain.get("gemini"), Some("from-config".to_string()));
/// ```
pub struct ChainSecretStore {
    stores: Vec<Arc<dyn SecretStore>>,
}

impl ChainSecretStore {
    pub fn new(stores: Vec<Arc<dyn SecretStore>>) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &[Arc<dyn SecretStore>] {
        &self.stores
    }

    /// Find which store has a key
    pub fn find_store(&self, key: &str) -> Option<&Arc<dyn SecretStore>> {
        self.stores
            .iter()
            .find(|store| store.is_available() && store.has(key))
    }
}

impl SecretStore for ChainSecretStore {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_available(&self) -> bool {
        self.stores.iter().any(|s| s.is_available())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.stores
            .iter()
            .filter(|store| store.is_available())
            .find_map(|store| store.get(key))
    }
}
