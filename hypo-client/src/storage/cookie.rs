//! Cookie-backed store over an [`EdgeContext`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use http::HeaderValue;
use http::header::SET_COOKIE;
use tracing::warn;

use super::KeyValueStore;
use crate::clock::{Clock, SystemClock, expiry_after};
use crate::config::ConfigHandle;
use crate::context::EdgeContext;

/// Cookie expiry format (RFC 1123, always GMT).
const COOKIE_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Reads cookies from the inbound request and writes `Set-Cookie` headers.
///
/// Values written during the request are remembered, so a later read in
/// the same request sees them even though the inbound header does not.
/// The `domain` attribute is read from the config on every write.
pub struct CookieStore {
    context: Arc<EdgeContext>,
    config: ConfigHandle,
    clock: Arc<dyn Clock>,
    /// `None` marks a cookie removed during this request.
    written: Mutex<HashMap<String, Option<String>>>,
}

impl CookieStore {
    /// Create a store over `context`.
    pub fn new(context: Arc<EdgeContext>) -> Self {
        Self {
            context,
            config: ConfigHandle::default(),
            clock: Arc::new(SystemClock),
            written: Mutex::new(HashMap::new()),
        }
    }

    /// Take the cookie domain from `config`.
    #[must_use]
    pub fn with_config(mut self, config: ConfigHandle) -> Self {
        self.config = config;
        self
    }

    /// Use `clock` for cookie expiry dates.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn set_cookie(&self, key: &str, encoded_value: &str, expires: DateTime<Utc>) {
        let mut cookie = format!(
            "{}={};path=/;expires={}",
            key,
            encoded_value,
            expires.format(COOKIE_DATE_FORMAT)
        );
        if let Some(domain) = self.config.snapshot().cookie_domain {
            cookie.push_str(";domain=");
            cookie.push_str(&domain);
        }

        match HeaderValue::from_str(&cookie) {
            Ok(value) => self.context.append_response_header(SET_COOKIE, value),
            Err(e) => warn!(key, "dropping cookie with invalid header value: {}", e),
        }
    }
}

impl KeyValueStore for CookieStore {
    fn get(&self, key: &str) -> Option<String> {
        if let Some(written) = self
            .written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return written.clone();
        }

        let raw = self.context.request_cookie(key)?;
        let value = urlencoding::decode(raw)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        (!value.is_empty()).then_some(value)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) {
        let expires = expiry_after(self.clock.now(), ttl);
        self.set_cookie(key, &urlencoding::encode(value), expires);
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Some(value.to_string()));
    }

    fn remove(&self, key: &str) {
        self.set_cookie(key, "", DateTime::<Utc>::UNIX_EPOCH);
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), None);
    }
}
