//! Backend request delivery.
//!
//! A [`Transport`] performs one acknowledged round trip and may expose a
//! non-blocking [`Beacon`]. The [`Dispatcher`] sits in front of it. It
//! tries the beacon when a request prefers fire-and-forget, and otherwise
//! races the round trip against the configured request timeout.
//!
//! ```text
//!  Request ──► Dispatcher ──► beacon? ──hand-off ok──► Delivery::HandedOff
//!                  │              │
//!                  │         refused / none
//!                  ▼              ▼
//!           spawn(execute) ◄──────┘
//!                  │
//!        ┌─────────┴──────────┐
//!   response first       deadline first
//!        │                    │
//!  Delivery::Response   abort task, FailureKind::Timeout
//! ```

mod mock;
mod net;

use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

pub use mock::{BeaconedForm, MockBeacon, MockTransport};
pub use net::{HttpTransport, MAX_BEACON_BYTES, SpawnBeacon};

use crate::config::ConfigHandle;
use crate::context::EdgeContext;
use crate::error::{Error, FailureKind, Result};

/// Header naming the client platform.
pub const CLIENT_HEADER: &str = "x-hypo-client";

/// Header carrying the client library version.
pub const CLIENT_VERSION_HEADER: &str = "x-hypo-client-version";

/// Platform tag sent by native clients.
pub const PLATFORM_NATIVE: &str = "rust-native";

/// Platform tag sent when serving through an edge context.
pub const PLATFORM_EDGE: &str = "rust-edge";

/// Headers sent with every backend request.
///
/// With an edge context the inbound `User-Agent` is forwarded so the
/// backend sees the end user's agent rather than the worker's.
pub fn client_headers(edge: Option<&EdgeContext>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static(CLIENT_HEADER),
        HeaderValue::from_static(if edge.is_some() {
            PLATFORM_EDGE
        } else {
            PLATFORM_NATIVE
        }),
    );
    headers.insert(
        HeaderName::from_static(CLIENT_VERSION_HEADER),
        HeaderValue::from_static(env!("CARGO_PKG_VERSION")),
    );
    if let Some(agent) = edge
        .and_then(|ctx| ctx.request_headers().get(USER_AGENT))
        .cloned()
    {
        headers.insert(USER_AGENT, agent);
    }
    headers
}

/// A request to the backend.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// JSON body for the acknowledged path.
    pub body: Option<Value>,
    /// Form fields for fire-and-forget delivery; `Some` means the caller
    /// prefers a beacon when one is available.
    pub beacon: Option<Vec<(String, String)>>,
}

impl Request {
    /// Create a request with no headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            beacon: None,
        }
    }

    /// Create a `POST` request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Create a `GET` request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merge in a set of headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Prefer non-blocking delivery of `form` when a beacon is available.
    #[must_use]
    pub fn prefer_fire_and_forget(mut self, form: Vec<(String, String)>) -> Self {
        self.beacon = Some(form);
        self
    }

    /// Whether the caller prefers fire-and-forget delivery.
    pub fn prefers_fire_and_forget(&self) -> bool {
        self.beacon.is_some()
    }
}

/// How a request was delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// The backend answered; the parsed body (`null` when empty).
    Response(Value),
    /// A beacon accepted the request; no server acknowledgement awaited.
    HandedOff,
}

impl Delivery {
    /// The response body, if the request was acknowledged.
    pub fn into_response(self) -> Option<Value> {
        match self {
            Self::Response(value) => Some(value),
            Self::HandedOff => None,
        }
    }
}

/// Performs acknowledged round trips.
///
/// Implementations normalise every ordinary failure into a
/// [`FailureKind`]; they do not enforce the request timeout themselves.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return the parsed response body.
    async fn execute(&self, request: &Request) -> std::result::Result<Value, FailureKind>;

    /// The non-blocking delivery primitive, if this runtime has one.
    fn beacon(&self) -> Option<&dyn Beacon> {
        None
    }
}

/// A fire-and-forget delivery primitive.
pub trait Beacon: Send + Sync {
    /// Hand `form` off for delivery to `url`.
    ///
    /// Returns `false` if the hand-off was refused, in which case nothing
    /// was sent.
    fn send_beacon(&self, url: &str, form: &[(String, String)]) -> bool;
}

/// Encode form fields as `application/x-www-form-urlencoded`.
pub fn encode_form(form: &[(String, String)]) -> String {
    form.iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Sends requests through a [`Transport`] under the configured timeout.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    config: ConfigHandle,
}

impl Dispatcher {
    /// Create a dispatcher over `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: ConfigHandle) -> Self {
        Self { transport, config }
    }

    /// Deliver `request`.
    ///
    /// Ordinary failures come back as [`Error::Failure`]. A URL that does
    /// not parse is [`Error::InvalidRequest`].
    pub async fn send(&self, request: Request) -> Result<Delivery> {
        url::Url::parse(&request.url)
            .map_err(|e| Error::InvalidRequest(format!("{}: {}", request.url, e)))?;

        if let Some(form) = &request.beacon {
            match self.transport.beacon() {
                Some(beacon) if beacon.send_beacon(&request.url, form) => {
                    debug!(url = %request.url, "request handed off to beacon");
                    return Ok(Delivery::HandedOff);
                }
                Some(_) => debug!(url = %request.url, "beacon refused hand-off, sending directly"),
                None => debug!(url = %request.url, "no beacon available, sending directly"),
            }
        }

        let url = request.url.clone();
        let timeout = self.config.snapshot().request_timeout;
        let transport = Arc::clone(&self.transport);
        let mut task = tokio::spawn(async move { transport.execute(&request).await });

        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Ok(Err(_)) => Err(FailureKind::Aborted),
            Err(_) => {
                // The late result, if any, is dropped with the task.
                task.abort();
                Err(FailureKind::Timeout)
            }
        };

        match outcome {
            Ok(body) => Ok(Delivery::Response(body)),
            Err(kind) => {
                warn!(url = %url, "request failed: {}", kind);
                Err(kind.into())
            }
        }
    }
}
