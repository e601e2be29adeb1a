//! Durable key-value storage substrates.
//!
//! Identity and assignment caching sit on a [`KeyValueStore`]. Stores are
//! synchronous and infallible from the caller's point of view: a store
//! that cannot read or write logs the problem and behaves as if the key
//! were absent.
//!
//! - [`MemoryStore`] - process-local map, the default for native clients
//! - [`FileStore`] - JSON file on disk, used by the CLI
//! - [`CookieStore`] - cookies of an [`EdgeContext`](crate::EdgeContext)
//! - [`NullStore`] - no substrate at all

mod cookie;
mod file;
mod memory;

use std::time::Duration;

pub use cookie::CookieStore;
pub use file::FileStore;
pub use memory::MemoryStore;

/// A best-effort string store with per-entry expiry.
pub trait KeyValueStore: Send + Sync {
    /// Read an unexpired value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `value`, replacing any previous one, expiring after `ttl`.
    fn set(&self, key: &str, value: &str, ttl: Duration);

    /// Delete `key` if present.
    fn remove(&self, key: &str);
}

/// Store used when no storage substrate is available.
///
/// Reads always miss and writes are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str, _ttl: Duration) {}

    fn remove(&self, _key: &str) {}
}
