//! Request/response context for edge runtimes.
//!
//! On an edge worker there is no cookie jar: identity arrives in the
//! inbound `Cookie` header and must leave in outbound `Set-Cookie`
//! headers. An [`EdgeContext`] carries both sides for one request.

use std::sync::{Mutex, PoisonError};

use http::header::{COOKIE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};

/// Inbound request headers plus the response headers written so far.
#[derive(Debug, Default)]
pub struct EdgeContext {
    request_headers: HeaderMap,
    response_headers: Mutex<HeaderMap>,
}

impl EdgeContext {
    /// Wrap the headers of an inbound request.
    pub fn new(request_headers: HeaderMap) -> Self {
        Self {
            request_headers,
            response_headers: Mutex::new(HeaderMap::new()),
        }
    }

    /// Headers of the inbound request.
    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// The inbound `User-Agent`, if present and valid UTF-8.
    pub fn user_agent(&self) -> Option<&str> {
        self.request_headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
    }

    /// Raw value of cookie `name` from the inbound `Cookie` header(s).
    pub fn request_cookie(&self, name: &str) -> Option<&str> {
        self.request_headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Append a header to the outbound response.
    pub fn append_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(name, value);
    }

    /// A copy of the response headers written so far.
    pub fn response_headers(&self) -> HeaderMap {
        self.response_headers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Take the response headers, leaving none behind.
    pub fn take_response_headers(&self) -> HeaderMap {
        std::mem::take(
            &mut *self
                .response_headers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}
