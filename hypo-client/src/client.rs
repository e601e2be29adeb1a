//! The assembled client.

use std::sync::Arc;

use tracing::debug;

use crate::assignment::AssignmentClient;
use crate::cache::{Assignment, AssignmentCache};
use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, ConfigHandle, ConfigOverrides};
use crate::context::EdgeContext;
use crate::error::Result;
use crate::events::{EventOptions, EventReporter};
use crate::identity::IdentityStore;
use crate::storage::{CookieStore, KeyValueStore, MemoryStore};
use crate::transport::{Delivery, Dispatcher, HttpTransport, Transport};

/// Builder for [`HypoClient`].
///
/// Parts left unset default to a [`MemoryStore`] (a [`CookieStore`] when
/// an edge context is given), [`HttpTransport::detect`] and
/// [`SystemClock`].
#[derive(Default)]
pub struct HypoClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    edge: Option<Arc<EdgeContext>>,
}

impl HypoClientBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Apply overrides on top of the current configuration.
    #[must_use]
    pub fn overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.config = self.config.merge(overrides);
        self
    }

    /// Use `store` for identity and assignment state.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use `transport` for backend requests.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use `clock` for expiry arithmetic.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Serve one inbound request of an edge runtime.
    #[must_use]
    pub fn edge_context(mut self, edge: Arc<EdgeContext>) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Assemble the client.
    pub fn build(self) -> HypoClient {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = ConfigHandle::new(self.config);
        let store: Arc<dyn KeyValueStore> = match (self.store, &self.edge) {
            (Some(store), _) => store,
            (None, Some(edge)) => Arc::new(
                CookieStore::new(Arc::clone(edge))
                    .with_config(config.clone())
                    .with_clock(Arc::clone(&clock)),
            ),
            (None, None) => Arc::new(MemoryStore::with_clock(Arc::clone(&clock))),
        };
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::detect()));

        let identity = IdentityStore::new(Arc::clone(&store), config.clone());
        let cache = AssignmentCache::new(store, config.clone(), clock);
        let dispatcher = Dispatcher::new(transport, config.clone());

        HypoClient {
            assignments: AssignmentClient::new(
                identity.clone(),
                cache,
                dispatcher.clone(),
                config.clone(),
                self.edge.clone(),
            ),
            events: EventReporter::new(identity.clone(), dispatcher, config.clone(), self.edge),
            identity,
            config,
        }
    }
}

/// Client for experiment group assignment and event reporting.
///
/// Cloning is cheap; clones share configuration and state.
#[derive(Clone)]
pub struct HypoClient {
    config: ConfigHandle,
    identity: IdentityStore,
    assignments: AssignmentClient,
    events: EventReporter,
}

impl HypoClient {
    /// Start building a client.
    pub fn builder() -> HypoClientBuilder {
        HypoClientBuilder::new()
    }

    /// Merge `overrides` into the live configuration.
    ///
    /// Takes effect from the next operation; operations in flight keep
    /// the configuration they started with.
    pub fn init(&self, overrides: ConfigOverrides) {
        debug!("reinitialising client configuration");
        self.config.init(overrides);
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.config.snapshot()
    }

    /// The persisted identity, created if absent.
    pub fn user_id(&self) -> String {
        self.identity.get_or_create_identity()
    }

    /// Replace the persisted identity.
    pub fn set_user_id(&self, user_id: &str) {
        self.identity.set_identity(user_id);
    }

    /// Group assignment for `experiment_id`, served from cache when valid.
    pub async fn group_assignment(&self, experiment_id: &str) -> Result<Assignment> {
        self.group_assignment_with(experiment_id, false).await
    }

    /// Group assignment for `experiment_id`, bypassing the cache when
    /// `force_request` is set.
    pub async fn group_assignment_with(
        &self,
        experiment_id: &str,
        force_request: bool,
    ) -> Result<Assignment> {
        self.assignments
            .get_group_assignment(experiment_id, force_request)
            .await
    }

    /// Report `event_id` for the current identity.
    pub async fn event(&self, event_id: &str, options: EventOptions) -> Result<Delivery> {
        self.events.report_event(event_id, options).await
    }
}
