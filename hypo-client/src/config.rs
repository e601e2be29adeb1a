//! Client configuration.
//!
//! [`ClientConfig`] holds the settings every component reads.
//! [`ConfigOverrides`] is the partial form accepted by
//! [`ConfigHandle::init`]. Only the fields it sets are applied.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default prefix for storage keys.
pub const DEFAULT_STORAGE_PREFIX: &str = "hypo";

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// When the assignment flow creates an identity.
///
/// With [`IdentityMode::Deferred`], a fresh client's first assignment
/// request carries an empty body and the identity returned by the backend
/// becomes the persisted one. [`IdentityMode::Eager`] sends a locally
/// minted UUID instead, which the backend may still replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    /// Create and persist an identity before the first assignment request.
    #[default]
    Eager,
    /// Never fabricate an identity; send none and adopt the backend's.
    Deferred,
}

/// HTTP wiring of the assignment endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    /// `POST` with a JSON `{ "user": ... }` body.
    #[default]
    Post,
    /// `GET` with the identity in a `uid` query parameter.
    Get,
}

/// Settings shared by every client component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Prefix for storage keys (`{prefix}-uid`, `{prefix}-eid-{experiment}`).
    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,

    /// Base URL of the assignment and event API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Project that experiments and events belong to.
    #[serde(default)]
    pub project: Option<String>,

    /// How long a persisted identity lives.
    #[serde(default = "default_identity_cache_duration", with = "humantime_serde")]
    pub identity_cache_duration: Duration,

    /// How long a cached group assignment is trusted.
    #[serde(default = "default_assignment_cache_duration", with = "humantime_serde")]
    pub assignment_cache_duration: Duration,

    /// Domain attribute for cookies written through an edge context.
    #[serde(default)]
    pub cookie_domain: Option<String>,

    /// Hard deadline for acknowledged requests.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// When an identity is created for assignment lookups.
    #[serde(default)]
    pub identity_mode: IdentityMode,

    /// HTTP wiring of the assignment endpoint.
    #[serde(default)]
    pub assignment_method: AssignmentMethod,
}

fn default_storage_prefix() -> String {
    DEFAULT_STORAGE_PREFIX.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_identity_cache_duration() -> Duration {
    Duration::from_secs(2 * 365 * 24 * 60 * 60)
}

fn default_assignment_cache_duration() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

fn default_request_timeout() -> Duration {
    Duration::from_millis(5000)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            storage_prefix: default_storage_prefix(),
            base_url: default_base_url(),
            project: None,
            identity_cache_duration: default_identity_cache_duration(),
            assignment_cache_duration: default_assignment_cache_duration(),
            cookie_domain: None,
            request_timeout: default_request_timeout(),
            identity_mode: IdentityMode::default(),
            assignment_method: AssignmentMethod::default(),
        }
    }
}

impl ClientConfig {
    /// Set the project id.
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the backend base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Apply every field set in `overrides`, keeping the rest.
    #[must_use]
    pub fn merge(self, overrides: ConfigOverrides) -> Self {
        Self {
            storage_prefix: overrides.storage_prefix.unwrap_or(self.storage_prefix),
            base_url: overrides.base_url.unwrap_or(self.base_url),
            project: overrides.project.or(self.project),
            identity_cache_duration: overrides
                .identity_cache_duration
                .unwrap_or(self.identity_cache_duration),
            assignment_cache_duration: overrides
                .assignment_cache_duration
                .unwrap_or(self.assignment_cache_duration),
            cookie_domain: overrides.cookie_domain.or(self.cookie_domain),
            request_timeout: overrides.request_timeout.unwrap_or(self.request_timeout),
            identity_mode: overrides.identity_mode.unwrap_or(self.identity_mode),
            assignment_method: overrides
                .assignment_method
                .unwrap_or(self.assignment_method),
        }
    }

    /// Storage key of the persisted identity.
    pub fn identity_key(&self) -> String {
        format!("{}-uid", self.storage_prefix)
    }

    /// Storage key of the cached assignment for `experiment_id`.
    pub fn assignment_key(&self, experiment_id: &str) -> String {
        format!("{}-eid-{}", self.storage_prefix, experiment_id)
    }

    /// Base URL without a trailing slash.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// A partial configuration; unset fields leave the current value alone.
///
/// This is also the shape of the CLI's TOML config files, so layers can
/// be merged with [`ConfigOverrides::overlay`] before being applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(default)]
    pub storage_prefix: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub identity_cache_duration: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub assignment_cache_duration: Option<Duration>,
    #[serde(default)]
    pub cookie_domain: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    #[serde(default)]
    pub identity_mode: Option<IdentityMode>,
    #[serde(default)]
    pub assignment_method: Option<AssignmentMethod>,
}

impl ConfigOverrides {
    /// Layer `overlay` on top of `self`; values set in `overlay` win.
    #[must_use]
    pub fn overlay(self, overlay: ConfigOverrides) -> Self {
        Self {
            storage_prefix: overlay.storage_prefix.or(self.storage_prefix),
            base_url: overlay.base_url.or(self.base_url),
            project: overlay.project.or(self.project),
            identity_cache_duration: overlay
                .identity_cache_duration
                .or(self.identity_cache_duration),
            assignment_cache_duration: overlay
                .assignment_cache_duration
                .or(self.assignment_cache_duration),
            cookie_domain: overlay.cookie_domain.or(self.cookie_domain),
            request_timeout: overlay.request_timeout.or(self.request_timeout),
            identity_mode: overlay.identity_mode.or(self.identity_mode),
            assignment_method: overlay.assignment_method.or(self.assignment_method),
        }
    }
}

/// Shared, initialisable handle to a [`ClientConfig`].
///
/// Cloning the handle shares the underlying config. Components read a
/// snapshot per operation.
#[derive(Debug, Clone, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<ClientConfig>>,
}

impl ConfigHandle {
    /// Wrap an initial configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Merge `overrides` into the shared configuration.
    pub fn init(&self, overrides: ConfigOverrides) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let current = std::mem::take(&mut *guard);
        *guard = current.merge(overrides);
    }

    /// A copy of the current configuration.
    pub fn snapshot(&self) -> ClientConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let config = ClientConfig::default();

        assert_eq!(config.storage_prefix, "hypo");
        assert_eq!(config.base_url, "http://localhost:5000");
        assert!(config.project.is_none());
        assert_eq!(config.assignment_cache_duration, Duration::from_secs(6 * 3600));
        assert_eq!(config.request_timeout, Duration::from_millis(5000));
        assert_eq!(config.identity_mode, IdentityMode::Eager);
        assert_eq!(config.assignment_method, AssignmentMethod::Post);
    }

    #[test]
    fn merge_keeps_unspecified_fields() {
        let config = ClientConfig::default()
            .with_base_url("https://api.example.com")
            .merge(ConfigOverrides {
                project: Some("p1".to_string()),
                ..Default::default()
            });

        assert_eq!(config.project.as_deref(), Some("p1"));
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.storage_prefix, "hypo");
    }

    #[test]
    fn init_merges_over_previous_init() {
        let handle = ConfigHandle::default();
        handle.init(ConfigOverrides {
            project: Some("p1".to_string()),
            ..Default::default()
        });
        handle.init(ConfigOverrides {
            request_timeout: Some(Duration::from_millis(10)),
            ..Default::default()
        });

        let config = handle.snapshot();
        assert_eq!(config.project.as_deref(), Some("p1"));
        assert_eq!(config.request_timeout, Duration::from_millis(10));
    }

    #[test]
    fn cloned_handles_share_config() {
        let handle = ConfigHandle::default();
        let other = handle.clone();
        handle.init(ConfigOverrides {
            storage_prefix: Some("exp".to_string()),
            ..Default::default()
        });
        assert_eq!(other.snapshot().storage_prefix, "exp");
    }

    #[test]
    fn storage_keys_use_prefix() {
        let config = ClientConfig::default();
        assert_eq!(config.identity_key(), "hypo-uid");
        assert_eq!(config.assignment_key("exp1"), "hypo-eid-exp1");
    }

    #[test]
    fn overlay_prefers_later_layer() {
        let user = ConfigOverrides {
            base_url: Some("https://user.example.com".to_string()),
            project: Some("user-project".to_string()),
            ..Default::default()
        };
        let project = ConfigOverrides {
            project: Some("repo-project".to_string()),
            ..Default::default()
        };

        let merged = user.overlay(project);
        assert_eq!(merged.base_url.as_deref(), Some("https://user.example.com"));
        assert_eq!(merged.project.as_deref(), Some("repo-project"));
    }

    #[test]
    fn overrides_parse_humantime_durations() {
        let toml_str = r#"
project = "p1"
assignment_cache_duration = "30m"
request_timeout = "250ms"
identity_mode = "deferred"
assignment_method = "get"
"#;
        let overrides: ConfigOverrides = toml::from_str(toml_str).unwrap();

        assert_eq!(overrides.assignment_cache_duration, Some(Duration::from_secs(1800)));
        assert_eq!(overrides.request_timeout, Some(Duration::from_millis(250)));
        assert_eq!(overrides.identity_mode, Some(IdentityMode::Deferred));
        assert_eq!(overrides.assignment_method, Some(AssignmentMethod::Get));
        assert!(overrides.base_url.is_none());
    }

    #[test]
    fn trimmed_base_url_drops_trailing_slash() {
        let config = ClientConfig::default().with_base_url("https://api.example.com/");
        assert_eq!(config.trimmed_base_url(), "https://api.example.com");
    }
}
