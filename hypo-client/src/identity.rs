//! Durable user identity.
//!
//! The identity is a random UUID minted on first need and persisted for
//! `identity_cache_duration`. When the backend names a different
//! identity, [`IdentityStore::set_identity`] makes the backend's value
//! the one used from then on.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::config::ConfigHandle;
use crate::storage::KeyValueStore;

/// Reads and writes the persisted identity.
#[derive(Clone)]
pub struct IdentityStore {
    store: Arc<dyn KeyValueStore>,
    config: ConfigHandle,
}

impl IdentityStore {
    /// Create an identity store over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: ConfigHandle) -> Self {
        Self { store, config }
    }

    /// The persisted identity, or a freshly minted and persisted one.
    ///
    /// When no storage substrate is available a new identity is returned
    /// on every call.
    pub fn get_or_create_identity(&self) -> String {
        if let Some(identity) = self.get_identity() {
            return identity;
        }

        let identity = Uuid::new_v4().to_string();
        debug!(identity = %identity, "created new identity");
        self.set_identity(&identity);
        identity
    }

    /// The persisted identity, without creating one.
    pub fn get_identity(&self) -> Option<String> {
        let key = self.config.snapshot().identity_key();
        self.store.get(&key).filter(|identity| !identity.is_empty())
    }

    /// Persist `identity`, replacing any existing value.
    pub fn set_identity(&self, identity: &str) {
        let config = self.config.snapshot();
        self.store.set(
            &config.identity_key(),
            identity,
            config.identity_cache_duration,
        );
    }
}
