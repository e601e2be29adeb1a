//! Group assignment lookups.
//!
//! ```text
//! CacheCheck ──hit──► resolved from cache (no request, no writes)
//!     │
//!  miss / forced
//!     ▼
//!  Request ──ok──► adopt backend identity, cache, resolved
//!     │
//!  failure ──► error, nothing cached
//! ```
//!
//! Overlapping lookups for the same experiment are not coalesced; each
//! may issue its own request and the last response written wins.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::cache::{Assignment, AssignmentCache};
use crate::config::{AssignmentMethod, ClientConfig, ConfigHandle, IdentityMode};
use crate::context::EdgeContext;
use crate::error::{Error, FailureKind, Result};
use crate::identity::IdentityStore;
use crate::transport::{Dispatcher, Request, client_headers};

/// Body of the assignment endpoint's response.
#[derive(Debug, Deserialize)]
struct AssignmentResponse {
    group: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    reason_code: Option<String>,
}

/// Resolves which group the current identity is in for an experiment.
#[derive(Clone)]
pub struct AssignmentClient {
    identity: IdentityStore,
    cache: AssignmentCache,
    dispatcher: Dispatcher,
    config: ConfigHandle,
    edge: Option<Arc<EdgeContext>>,
}

impl AssignmentClient {
    /// Create an assignment client from its collaborators.
    pub fn new(
        identity: IdentityStore,
        cache: AssignmentCache,
        dispatcher: Dispatcher,
        config: ConfigHandle,
        edge: Option<Arc<EdgeContext>>,
    ) -> Self {
        Self {
            identity,
            cache,
            dispatcher,
            config,
            edge,
        }
    }

    /// The group assignment for `experiment_id`.
    ///
    /// A valid cached assignment is returned without a request unless
    /// `force_request` is set. A fresh assignment replaces the cached one.
    /// If the backend names an identity, it becomes the persisted identity.
    ///
    /// # Errors
    ///
    /// [`Error::MissingProject`] if no project is configured, otherwise
    /// the transport failure. Failures never write the cache.
    #[instrument(name = "assignment::get", skip(self))]
    pub async fn get_group_assignment(
        &self,
        experiment_id: &str,
        force_request: bool,
    ) -> Result<Assignment> {
        let config = self.config.snapshot();
        let project = config.project.clone().ok_or(Error::MissingProject)?;

        let identity = match config.identity_mode {
            IdentityMode::Eager => Some(self.identity.get_or_create_identity()),
            IdentityMode::Deferred => self.identity.get_identity(),
        };

        if !force_request
            && let Some(cached) = self.cache.lookup(experiment_id, identity.as_deref())
        {
            return Ok(cached);
        }

        let request = self.request(&config, &project, experiment_id, identity.as_deref());
        let body = self
            .dispatcher
            .send(request)
            .await?
            .into_response()
            .unwrap_or(Value::Null);

        let response: AssignmentResponse = serde_json::from_value(body).map_err(|e| {
            FailureKind::HttpError(format!("malformed assignment response: {}", e))
        })?;

        let user = match response.user.filter(|user| !user.is_empty()) {
            Some(user) => {
                if identity.as_deref() != Some(user.as_str()) {
                    info!(user = %user, "adopting identity issued by backend");
                }
                self.identity.set_identity(&user);
                Some(user)
            }
            None => identity,
        };

        debug!(group = %response.group, "assignment fetched");
        Ok(self
            .cache
            .store(experiment_id, response.group, user, response.reason_code))
    }

    fn request(
        &self,
        config: &ClientConfig,
        project: &str,
        experiment_id: &str,
        identity: Option<&str>,
    ) -> Request {
        let url = format!(
            "{}/project/{}/experiment/{}/group/assignment",
            config.trimmed_base_url(),
            urlencoding::encode(project),
            urlencoding::encode(experiment_id)
        );
        let headers = client_headers(self.edge.as_deref());

        match config.assignment_method {
            AssignmentMethod::Post => {
                let body = match identity {
                    Some(user) => json!({ "user": user }),
                    None => json!({}),
                };
                Request::post(url).headers(headers).json(body)
            }
            AssignmentMethod::Get => {
                let url = match identity {
                    Some(user) => format!("{}?uid={}", url, urlencoding::encode(user)),
                    None => url,
                };
                Request::get(url).headers(headers)
            }
        }
    }
}
