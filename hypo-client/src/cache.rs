//! Per-experiment group assignment cache.
//!
//! A cached [`Assignment`] is served only while it is unexpired and was
//! made for the current identity. Anything else is evicted on lookup.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::{Clock, expiry_after};
use crate::config::ConfigHandle;
use crate::storage::KeyValueStore;

/// A resolved group assignment for one experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// Experiment the assignment belongs to.
    pub experiment_id: String,
    /// Group (bucket) the identity was assigned to.
    pub group: String,
    /// Identity the assignment was made for.
    pub user: Option<String>,
    /// Backend explanation for the assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    /// Instant after which the assignment must be fetched again.
    pub expiration_time: DateTime<Utc>,
}

impl Assignment {
    /// Whether this record may be served to `identity` at `now`.
    pub fn is_valid_for(&self, identity: Option<&str>, now: DateTime<Utc>) -> bool {
        now < self.expiration_time && self.user.as_deref() == identity
    }
}

/// Cache of [`Assignment`]s keyed by `{prefix}-eid-{experiment}`.
#[derive(Clone)]
pub struct AssignmentCache {
    store: Arc<dyn KeyValueStore>,
    config: ConfigHandle,
    clock: Arc<dyn Clock>,
}

impl AssignmentCache {
    /// Create a cache over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, config: ConfigHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Return the cached assignment if it is valid for `identity`.
    ///
    /// Expired, mismatched or unreadable records are removed before
    /// returning `None`.
    pub fn lookup(&self, experiment_id: &str, identity: Option<&str>) -> Option<Assignment> {
        let key = self.config.snapshot().assignment_key(experiment_id);
        let raw = self.store.get(&key)?;

        let assignment = match serde_json::from_str::<Assignment>(&raw) {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!(experiment_id, "evicting unreadable cached assignment: {}", e);
                self.store.remove(&key);
                return None;
            }
        };

        if assignment.is_valid_for(identity, self.clock.now()) {
            debug!(experiment_id, group = %assignment.group, "assignment cache hit");
            Some(assignment)
        } else {
            debug!(experiment_id, "evicting stale assignment");
            self.store.remove(&key);
            None
        }
    }

    /// Cache a freshly fetched assignment, expiring after the configured
    /// assignment cache duration, and return the stored record.
    pub fn store(
        &self,
        experiment_id: &str,
        group: String,
        user: Option<String>,
        reason_code: Option<String>,
    ) -> Assignment {
        let config = self.config.snapshot();
        let ttl = config.assignment_cache_duration;
        let assignment = Assignment {
            experiment_id: experiment_id.to_string(),
            group,
            user,
            reason_code,
            expiration_time: expiry_after(self.clock.now(), ttl),
        };

        match serde_json::to_string(&assignment) {
            Ok(json) => self
                .store
                .set(&config.assignment_key(experiment_id), &json, ttl),
            Err(e) => warn!(experiment_id, "failed to serialize assignment: {}", e),
        }

        assignment
    }

    /// Drop any cached assignment for `experiment_id`.
    pub fn evict(&self, experiment_id: &str) {
        let key = self.config.snapshot().assignment_key(experiment_id);
        self.store.remove(&key);
    }
}
