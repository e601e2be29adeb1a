//! reqwest-backed transport.

use async_trait::async_trait;
use http::HeaderValue;
use http::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use super::{Beacon, Request, Transport, encode_form};
use crate::error::FailureKind;

/// Largest form body a beacon accepts, matching the browser beacon limit.
pub const MAX_BEACON_BYTES: usize = 64 * 1024;

/// Transport over a [`reqwest::Client`].
pub struct HttpTransport {
    client: Client,
    beacon: Option<SpawnBeacon>,
}

impl HttpTransport {
    /// Create a transport with no beacon.
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a transport over an existing client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            beacon: None,
        }
    }

    /// Create a transport, installing a beacon when a tokio runtime is
    /// available to run detached deliveries.
    pub fn detect() -> Self {
        let transport = Self::new();
        if Handle::try_current().is_ok() {
            transport.with_beacon()
        } else {
            transport
        }
    }

    /// Install a [`SpawnBeacon`] sharing this transport's client.
    #[must_use]
    pub fn with_beacon(mut self) -> Self {
        self.beacon = Some(SpawnBeacon::new(self.client.clone()));
        self
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> Result<Value, FailureKind> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string());
            return Err(FailureKind::HttpError(status_text));
        }

        let text = response.text().await.map_err(classify)?;
        parse_body(&text)
    }

    fn beacon(&self) -> Option<&dyn Beacon> {
        self.beacon.as_ref().map(|b| b as &dyn Beacon)
    }
}

/// Map a reqwest error onto the failure taxonomy.
fn classify(e: reqwest::Error) -> FailureKind {
    if e.is_timeout() {
        FailureKind::Timeout
    } else if e.is_body() || e.is_decode() {
        FailureKind::HttpError(format!("malformed response body: {}", e))
    } else {
        FailureKind::NetworkError(e.to_string())
    }
}

/// Parse a 2xx body; empty bodies are `null`.
fn parse_body(text: &str) -> Result<Value, FailureKind> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed)
        .map_err(|e| FailureKind::HttpError(format!("malformed response body: {}", e)))
}

/// Beacon that hands a form POST to a detached tokio task.
///
/// Delivery outcome is only logged; the caller has already moved on.
#[derive(Clone)]
pub struct SpawnBeacon {
    client: Client,
}

impl SpawnBeacon {
    /// Create a beacon sending through `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Beacon for SpawnBeacon {
    fn send_beacon(&self, url: &str, form: &[(String, String)]) -> bool {
        let body = encode_form(form);
        if body.len() > MAX_BEACON_BYTES {
            debug!(url, size = body.len(), "beacon payload too large");
            return false;
        }

        let Ok(handle) = Handle::try_current() else {
            debug!(url, "no runtime for beacon delivery");
            return false;
        };

        let request = self
            .client
            .post(url)
            .header(
                CONTENT_TYPE,
                HeaderValue::from_static("application/x-www-form-urlencoded"),
            )
            .body(body);
        let url = url.to_string();

        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %url, "beacon delivered");
                }
                Ok(response) => {
                    debug!(url = %url, status = %response.status(), "beacon rejected");
                }
                Err(e) => debug!(url = %url, "beacon delivery failed: {}", e),
            }
        });

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_body_treats_empty_as_null() {
        assert_eq!(parse_body("").unwrap(), Value::Null);
        assert_eq!(parse_body("  \n").unwrap(), Value::Null);
    }

    #[test]
    fn parse_body_parses_json() {
        let body = parse_body(r#"{"group":"B","user":"u-123"}"#).unwrap();
        assert_eq!(body, json!({"group": "B", "user": "u-123"}));
    }

    #[test]
    fn parse_body_reports_malformed_json_as_http_error() {
        let err = parse_body("<html>oops</html>").unwrap_err();
        assert!(matches!(err, FailureKind::HttpError(msg) if msg.starts_with("malformed response body")));
    }

    #[test]
    fn detect_without_runtime_has_no_beacon() {
        let transport = HttpTransport::detect();
        assert!(transport.beacon().is_none());
    }

    #[tokio::test]
    async fn detect_inside_runtime_installs_beacon() {
        let transport = HttpTransport::detect();
        assert!(transport.beacon().is_some());
    }

    #[test]
    fn beacon_refuses_without_runtime() {
        let beacon = SpawnBeacon::new(Client::new());
        let form = vec![("ev".to_string(), "click".to_string())];
        assert!(!beacon.send_beacon("http://localhost:5000/project/p/event", &form));
    }

    #[tokio::test]
    async fn beacon_refuses_oversized_payload() {
        let beacon = SpawnBeacon::new(Client::new());
        let form = vec![("ev".to_string(), "x".repeat(MAX_BEACON_BYTES + 1))];
        assert!(!beacon.send_beacon("http://localhost:5000/project/p/event", &form));
    }
}
