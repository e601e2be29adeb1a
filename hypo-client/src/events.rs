//! Analytics event reporting.
//!
//! Events prefer fire-and-forget delivery and fall back to an
//! acknowledged request. Delivery is at most once; nothing is retried.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::ConfigHandle;
use crate::context::EdgeContext;
use crate::error::{Error, Result};
use crate::identity::IdentityStore;
use crate::transport::{Delivery, Dispatcher, Request, client_headers};

/// Optional attributes of a reported event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOptions {
    /// Revenue attributed to the event.
    pub revenue: Option<f64>,
    /// Idempotency token the backend uses to drop duplicates.
    pub unique_key: Option<String>,
    /// Event time as Unix seconds, overriding the backend's receive time.
    pub unix_timestamp: Option<i64>,
}

impl EventOptions {
    /// Attach revenue.
    #[must_use]
    pub fn revenue(mut self, revenue: f64) -> Self {
        self.revenue = Some(revenue);
        self
    }

    /// Attach a deduplication key.
    #[must_use]
    pub fn unique_key(mut self, key: impl Into<String>) -> Self {
        self.unique_key = Some(key.into());
        self
    }

    /// Override the event time.
    #[must_use]
    pub fn unix_timestamp(mut self, seconds: i64) -> Self {
        self.unix_timestamp = Some(seconds);
        self
    }
}

/// JSON body of the event endpoint.
#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    revenue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unique_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    received_at: Option<i64>,
}

impl EventPayload<'_> {
    /// Short form field names used for beacon delivery.
    fn to_form(&self) -> Vec<(String, String)> {
        let mut form = Vec::with_capacity(5);
        if let Some(user) = self.user {
            form.push(("uid".to_string(), user.to_string()));
        }
        form.push(("ev".to_string(), self.event.to_string()));
        if let Some(revenue) = self.revenue {
            form.push(("rev".to_string(), revenue.to_string()));
        }
        if let Some(key) = self.unique_key {
            form.push(("k".to_string(), key.to_string()));
        }
        if let Some(t) = self.received_at {
            form.push(("t".to_string(), t.to_string()));
        }
        form
    }
}

/// Reports analytics events for the current identity.
#[derive(Clone)]
pub struct EventReporter {
    identity: IdentityStore,
    dispatcher: Dispatcher,
    config: ConfigHandle,
    edge: Option<Arc<EdgeContext>>,
}

impl EventReporter {
    /// Create a reporter from its collaborators.
    pub fn new(
        identity: IdentityStore,
        dispatcher: Dispatcher,
        config: ConfigHandle,
        edge: Option<Arc<EdgeContext>>,
    ) -> Self {
        Self {
            identity,
            dispatcher,
            config,
            edge,
        }
    }

    /// Report `event_id`.
    ///
    /// The identity is read but never created; anonymous events are sent
    /// without a user. Returns [`Delivery::HandedOff`] when a beacon took
    /// the event, otherwise the backend's acknowledgement.
    ///
    /// # Errors
    ///
    /// [`Error::MissingProject`] if no project is configured, otherwise
    /// the transport failure of the acknowledged path.
    #[instrument(name = "event::report", skip(self, options))]
    pub async fn report_event(&self, event_id: &str, options: EventOptions) -> Result<Delivery> {
        let config = self.config.snapshot();
        let project = config.project.as_deref().ok_or(Error::MissingProject)?;
        let identity = self.identity.get_identity();

        let payload = EventPayload {
            user: identity.as_deref(),
            event: event_id,
            revenue: options.revenue,
            unique_key: options.unique_key.as_deref(),
            received_at: options.unix_timestamp,
        };
        let body = serde_json::to_value(&payload)
            .map_err(|e| Error::InvalidRequest(format!("event payload: {}", e)))?;

        let url = format!(
            "{}/project/{}/event",
            config.trimmed_base_url(),
            urlencoding::encode(project)
        );
        let request = Request::post(url)
            .headers(client_headers(self.edge.as_deref()))
            .json(body)
            .prefer_fire_and_forget(payload.to_form());

        let delivery = self.dispatcher.send(request).await?;
        debug!(handed_off = matches!(delivery, Delivery::HandedOff), "event reported");
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigOverrides;
    use crate::error::FailureKind;
    use crate::storage::MemoryStore;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn reporter(transport: Arc<MockTransport>) -> (EventReporter, IdentityStore) {
        let config = ConfigHandle::default();
        config.init(ConfigOverrides {
            project: Some("p1".to_string()),
            ..Default::default()
        });
        let identity = IdentityStore::new(Arc::new(MemoryStore::new()), config.clone());
        let dispatcher = Dispatcher::new(transport, config.clone());
        (
            EventReporter::new(identity.clone(), dispatcher, config, None),
            identity,
        )
    }

    #[tokio::test]
    async fn beacon_delivery_uses_short_form_fields() {
        let transport = Arc::new(MockTransport::new().with_beacon(true));
        let (reporter, identity) = reporter(transport.clone());
        identity.set_identity("u1");

        let options = EventOptions::default()
            .revenue(9.99)
            .unique_key("order-7")
            .unix_timestamp(1_700_000_000);
        let delivery = reporter.report_event("purchase", options).await.unwrap();

        assert_eq!(delivery, Delivery::HandedOff);
        let beaconed = transport.beaconed();
        let (url, form) = &beaconed[0];
        assert_eq!(url, "http://localhost:5000/project/p1/event");
        assert_eq!(
            form,
            &vec![
                ("uid".to_string(), "u1".to_string()),
                ("ev".to_string(), "purchase".to_string()),
                ("rev".to_string(), "9.99".to_string()),
                ("k".to_string(), "order-7".to_string()),
                ("t".to_string(), "1700000000".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn fallback_sends_json_body() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_response(serde_json::Value::Null);
        let (reporter, identity) = reporter(transport.clone());
        identity.set_identity("u1");

        let delivery = reporter
            .report_event("signup", EventOptions::default().unique_key("k1"))
            .await
            .unwrap();

        assert_eq!(delivery, Delivery::Response(serde_json::Value::Null));
        assert_eq!(
            transport.requests()[0].body,
            Some(json!({"user": "u1", "event": "signup", "unique_key": "k1"}))
        );
    }

    #[tokio::test]
    async fn anonymous_event_omits_user_and_creates_no_identity() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_response(serde_json::Value::Null);
        let (reporter, identity) = reporter(transport.clone());

        reporter
            .report_event("pageview", EventOptions::default())
            .await
            .unwrap();

        assert_eq!(
            transport.requests()[0].body,
            Some(json!({"event": "pageview"}))
        );
        assert!(identity.get_identity().is_none());
    }

    #[tokio::test]
    async fn acknowledged_failure_is_surfaced() {
        let transport = Arc::new(MockTransport::new().with_beacon(false));
        transport.queue_failure(FailureKind::NetworkError("connection refused".to_string()));
        let (reporter, _) = reporter(transport.clone());

        let err = reporter
            .report_event("purchase", EventOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err.failure_kind(),
            Some(FailureKind::NetworkError(_))
        ));
        assert_eq!(transport.request_count(), 1);
    }
}
