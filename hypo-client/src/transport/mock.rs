//! Scriptable transport for tests and offline use.
//!
//! Queue responses or failures before sending; each acknowledged request
//! consumes one, in arrival order, before waiting out its delay. Every request is recorded for later inspection.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Beacon, Request, Transport};
use crate::error::FailureKind;

/// A form handed to a [`MockBeacon`].
pub type BeaconedForm = (String, Vec<(String, String)>);

/// A queued outcome and its optional per-response delay.
type Scripted = (Result<Value, FailureKind>, Option<Duration>);

/// Mock implementation of [`Transport`].
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<Request>>,
    delay: Option<Duration>,
    beacon: Option<MockBeacon>,
}

impl MockTransport {
    /// Create a transport with no queued responses and no beacon.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every acknowledged response by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Expose a beacon that accepts (`true`) or refuses every hand-off.
    #[must_use]
    pub fn with_beacon(mut self, accept: bool) -> Self {
        self.beacon = Some(MockBeacon::new(accept));
        self
    }

    /// Queue a successful response body.
    pub fn queue_response(&self, body: Value) {
        self.lock_responses().push_back((Ok(body), None));
    }

    /// Queue a response that arrives `delay` after its request, overriding
    /// the transport-wide delay.
    pub fn queue_delayed_response(&self, body: Value, delay: Duration) {
        self.lock_responses().push_back((Ok(body), Some(delay)));
    }

    /// Queue a failure.
    pub fn queue_failure(&self, kind: FailureKind) {
        self.lock_responses().push_back((Err(kind), None));
    }

    /// Requests executed so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of acknowledged requests executed so far.
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Forms handed to the beacon so far.
    pub fn beaconed(&self) -> Vec<BeaconedForm> {
        self.beacon
            .as_ref()
            .map(MockBeacon::sent)
            .unwrap_or_default()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Scripted>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &Request) -> Result<Value, FailureKind> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let (outcome, delay) = self.lock_responses().pop_front().unwrap_or_else(|| {
            (
                Err(FailureKind::HttpError(
                    "no queued response in MockTransport".to_string(),
                )),
                None,
            )
        });

        if let Some(delay) = delay.or(self.delay) {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    fn beacon(&self) -> Option<&dyn Beacon> {
        self.beacon.as_ref().map(|b| b as &dyn Beacon)
    }
}

/// Beacon that records forms instead of sending them.
#[derive(Debug, Default)]
pub struct MockBeacon {
    accept: bool,
    sent: Mutex<Vec<BeaconedForm>>,
}

impl MockBeacon {
    /// Create a beacon that accepts or refuses every hand-off.
    pub fn new(accept: bool) -> Self {
        Self {
            accept,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Forms accepted so far.
    pub fn sent(&self) -> Vec<BeaconedForm> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Beacon for MockBeacon {
    fn send_beacon(&self, url: &str, form: &[(String, String)]) -> bool {
        if self.accept {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((url.to_string(), form.to_vec()));
        }
        self.accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn responses_are_consumed_in_order() {
        let transport = MockTransport::new();
        transport.queue_response(json!({"group": "A"}));
        transport.queue_failure(FailureKind::Aborted);

        let request = Request::post("http://localhost:5000/x");
        assert_eq!(transport.execute(&request).await, Ok(json!({"group": "A"})));
        assert_eq!(transport.execute(&request).await, Err(FailureKind::Aborted));
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn per_response_delay_overrides_transport_delay() {
        let transport = MockTransport::new().with_delay(Duration::from_secs(10));
        transport.queue_delayed_response(json!(1), Duration::from_millis(5));

        let start = tokio::time::Instant::now();
        let result = transport
            .execute(&Request::post("http://localhost:5000/x"))
            .await;

        assert_eq!(result, Ok(json!(1)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn empty_queue_is_an_error() {
        let transport = MockTransport::new();
        let result = transport
            .execute(&Request::post("http://localhost:5000/x"))
            .await;
        assert!(matches!(result, Err(FailureKind::HttpError(_))));
    }

    #[test]
    fn refusing_beacon_records_nothing() {
        let beacon = MockBeacon::new(false);
        assert!(!beacon.send_beacon("http://x", &[]));
        assert!(beacon.sent().is_empty());
    }

    #[test]
    fn transport_without_beacon_exposes_none() {
        assert!(MockTransport::new().beacon().is_none());
    }
}
