pub mod assign;
pub mod config;
pub mod event;
pub mod user;

use std::sync::Arc;

use anyhow::Result;
use hypo_client::{FileStore, HttpTransport, HypoClient};
use tracing::debug;

use crate::config::{ConfigFlags, ConfigLoader};

/// Build a client over the on-disk store.
///
/// No beacon is installed: the process exits as soon as the command
/// returns, which would drop a detached delivery.
pub fn build_client(flags: &ConfigFlags) -> Result<HypoClient> {
    let config = ConfigLoader::load(flags)?;
    let store = hypo_paths::store_file();
    debug!(store = %store.display(), base_url = %config.base_url, "building client");
    Ok(HypoClient::builder()
        .config(config)
        .store(Arc::new(FileStore::new(store)))
        .transport(Arc::new(HttpTransport::new()))
        .build())
}
