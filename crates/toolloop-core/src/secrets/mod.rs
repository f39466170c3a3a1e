//! Credential lookup
//!
//! API keys and tracing keys are read through a [`SecretStore`] handed to the
//! components that need them, so tests never depend on process environment.

mod chain_store;
mod env_store;
mod memory_store;
mod traits;

pub use chain_store::ChainSecretStore;
pub use env_store::EnvSecretStore;
pub use memory_store::MemorySecretStore;
pub use traits::{SecretStore, SecretStoreError, SecretStoreResult};
