//! End-to-end assignment scenarios driven by a scripted transport.

use std::sync::Arc;
use std::time::Duration;

use hypo_client::{
    AssignmentMethod, Clock, ConfigOverrides, FailureKind, HypoClient, IdentityMode, KeyValueStore,
    ManualClock, MemoryStore, MockTransport,
};
use serde_json::json;

struct Harness {
    client: HypoClient,
    transport: Arc<MockTransport>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness_with(overrides: ConfigOverrides, transport: MockTransport) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    let transport = Arc::new(transport);

    let client = HypoClient::builder()
        .overrides(ConfigOverrides {
            project: Some("p1".to_string()),
            ..Default::default()
        })
        .overrides(overrides)
        .store(store.clone())
        .transport(transport.clone())
        .clock(clock.clone())
        .build();

    Harness {
        client,
        transport,
        store,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(ConfigOverrides::default(), MockTransport::new())
}

#[tokio::test]
async fn fresh_assignment_is_cached_with_backend_identity() {
    let h = harness_with(
        ConfigOverrides {
            identity_mode: Some(IdentityMode::Deferred),
            ..Default::default()
        },
        MockTransport::new(),
    );
    h.transport
        .queue_response(json!({"group": "B", "user": "u-123", "reason_code": "RULE_3"}));

    let first = h.client.group_assignment("exp1").await.unwrap();
    assert_eq!(h.transport.requests()[0].body, Some(json!({})));
    assert_eq!(first.group, "B");
    assert_eq!(first.user.as_deref(), Some("u-123"));
    assert_eq!(first.reason_code.as_deref(), Some("RULE_3"));
    assert_eq!(
        first.expiration_time,
        h.clock.now() + chrono::Duration::hours(6)
    );
    assert_eq!(h.client.user_id(), "u-123");

    let second = h.client.group_assignment("exp1").await.unwrap();
    assert_eq!(second, first);
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn eager_mode_sends_minted_identity() {
    let h = harness();
    h.transport.queue_response(json!({"group": "A"}));

    let assignment = h.client.group_assignment("exp1").await.unwrap();

    let minted = h.client.user_id();
    assert_eq!(assignment.user.as_deref(), Some(minted.as_str()));
    assert_eq!(h.transport.requests()[0].body, Some(json!({"user": minted})));
}

#[tokio::test]
async fn request_targets_project_experiment_endpoint() {
    let h = harness();
    h.transport.queue_response(json!({"group": "A"}));

    h.client.group_assignment("checkout button").await.unwrap();

    let request = &h.transport.requests()[0];
    assert_eq!(
        request.url,
        "http://localhost:5000/project/p1/experiment/checkout%20button/group/assignment"
    );
    assert_eq!(request.headers["x-hypo-client"], "rust-native");
}

#[tokio::test]
async fn assignment_expires_after_cache_duration() {
    let h = harness_with(
        ConfigOverrides {
            assignment_cache_duration: Some(Duration::from_secs(60)),
            ..Default::default()
        },
        MockTransport::new(),
    );
    h.transport.queue_response(json!({"group": "A"}));
    h.transport.queue_response(json!({"group": "B"}));

    assert_eq!(h.client.group_assignment("exp1").await.unwrap().group, "A");
    h.clock.advance(Duration::from_secs(59));
    assert_eq!(h.client.group_assignment("exp1").await.unwrap().group, "A");
    h.clock.advance(Duration::from_secs(1));
    assert_eq!(h.client.group_assignment("exp1").await.unwrap().group, "B");
    assert_eq!(h.transport.request_count(), 2);
}

#[tokio::test]
async fn identity_change_invalidates_cached_assignment() {
    let h = harness();
    h.transport.queue_response(json!({"group": "A"}));
    h.transport.queue_response(json!({"group": "B"}));

    h.client.set_user_id("alice");
    assert_eq!(h.client.group_assignment("exp1").await.unwrap().group, "A");

    h.client.set_user_id("bob");
    let assignment = h.client.group_assignment("exp1").await.unwrap();

    assert_eq!(assignment.group, "B");
    assert_eq!(assignment.user.as_deref(), Some("bob"));
    assert_eq!(h.transport.requests()[1].body, Some(json!({"user": "bob"})));
}

#[tokio::test]
async fn forced_request_overwrites_cache() {
    let h = harness();
    h.transport.queue_response(json!({"group": "A"}));
    h.transport.queue_response(json!({"group": "B"}));

    assert_eq!(h.client.group_assignment("E42").await.unwrap().group, "A");
    let forced = h.client.group_assignment_with("E42", true).await.unwrap();
    assert_eq!(forced.group, "B");

    let cached = h.client.group_assignment("E42").await.unwrap();
    assert_eq!(cached.group, "B");
    assert_eq!(h.transport.request_count(), 2);
}

#[tokio::test]
async fn failed_request_writes_nothing() {
    let h = harness_with(
        ConfigOverrides {
            identity_mode: Some(IdentityMode::Deferred),
            ..Default::default()
        },
        MockTransport::new(),
    );
    h.transport
        .queue_failure(FailureKind::HttpError("Internal Server Error".to_string()));

    let err = h.client.group_assignment("exp1").await.unwrap_err();

    assert!(err.is_recoverable());
    assert!(h.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapping_lookups_each_request_and_last_response_wins() {
    let h = harness();
    // Whichever request is served first gets the slow answer.
    h.transport
        .queue_delayed_response(json!({"group": "A"}), Duration::from_millis(200));
    h.transport
        .queue_delayed_response(json!({"group": "B"}), Duration::from_millis(50));

    let (first, second) = tokio::join!(
        h.client.group_assignment("exp1"),
        h.client.group_assignment("exp1")
    );

    let mut groups = vec![first.unwrap().group, second.unwrap().group];
    groups.sort();
    assert_eq!(groups, ["A", "B"]);
    assert_eq!(h.transport.request_count(), 2);

    let cached = h.client.group_assignment("exp1").await.unwrap();
    assert_eq!(cached.group, "A");
    assert_eq!(h.transport.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn late_response_after_timeout_is_discarded() {
    let h = harness_with(
        ConfigOverrides {
            identity_mode: Some(IdentityMode::Deferred),
            request_timeout: Some(Duration::from_millis(10)),
            ..Default::default()
        },
        MockTransport::new().with_delay(Duration::from_millis(1000)),
    );
    h.transport
        .queue_response(json!({"group": "A", "user": "late-user"}));

    let err = h.client.group_assignment("exp1").await.unwrap_err();
    assert_eq!(err.failure_kind(), Some(&FailureKind::Timeout));

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(!h.store.contains("hypo-eid-exp1"));
    assert!(h.store.get("hypo-uid").is_none());
}

#[tokio::test]
async fn get_method_sends_identity_as_query() {
    let h = harness_with(
        ConfigOverrides {
            assignment_method: Some(AssignmentMethod::Get),
            ..Default::default()
        },
        MockTransport::new(),
    );
    h.client.set_user_id("u 1");
    h.transport.queue_response(json!({"group": "A"}));

    h.client.group_assignment("exp1").await.unwrap();

    let request = &h.transport.requests()[0];
    assert_eq!(request.method, http::Method::GET);
    assert!(request.url.ends_with("/group/assignment?uid=u%201"));
    assert!(request.body.is_none());
}

#[tokio::test]
async fn missing_project_fails_without_request() {
    let transport = Arc::new(MockTransport::new());
    let client = HypoClient::builder()
        .transport(transport.clone())
        .store(Arc::new(MemoryStore::new()))
        .build();

    let err = client.group_assignment("exp1").await.unwrap_err();

    assert!(matches!(err, hypo_client::Error::MissingProject));
    assert!(!err.is_recoverable());
    assert_eq!(transport.request_count(), 0);
}
