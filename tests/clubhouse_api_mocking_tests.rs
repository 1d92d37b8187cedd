//! Clubhouse API mocking tests
//!
//! These tests run the real reqwest client and the webhook handler against a
//! wiremock server, checking the exact requests sent to Clubhouse.

use epic_sync::clubhouse::{ClubhouseClient, ClubhouseError, ResourceClient, ResourceKey};
use epic_sync::config::ClubhouseConfig;
use epic_sync::handler::{handle_event, handle_event_with_report, parse_event, HandlerError};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "mock-token";
const TODO: i64 = 500_000_001;
const STARTED: i64 = 500_000_002;
const DONE: i64 = 500_000_003;

/// Clubhouse API mock server for deterministic testing
struct ClubhouseApiMock {
    server: MockServer,
}

impl ClubhouseApiMock {
    async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    fn client(&self) -> ClubhouseClient {
        let settings = ClubhouseConfig {
            base_url: self.server.uri(),
            ..ClubhouseConfig::default()
        };
        ClubhouseClient::new(&settings, TOKEN.to_string()).unwrap()
    }

    /// Mock an authenticated GET of a resource
    async fn mock_get(&self, resource: &str, response: Value, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v2/{resource}")))
            .and(query_param("token", TOKEN))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(response))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Mock an authenticated PUT of a partial epic payload
    async fn mock_epic_state_update(&self, epic_id: i64, state_id: i64, expected_calls: u64) {
        let payload = json!({ "epic_state_id": state_id });
        let content_length = payload.to_string().len().to_string();

        Mock::given(method("PUT"))
            .and(path(format!("/api/v2/epics/{epic_id}")))
            .and(query_param("token", TOKEN))
            .and(header("content-type", "application/json"))
            .and(header("content-length", content_length.as_str()))
            .and(body_json(payload))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": epic_id, "epic_state_id": state_id })),
            )
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    /// Fail any PUT that was not explicitly expected
    async fn forbid_other_updates(&self) {
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .with_priority(u8::MAX)
            .mount(&self.server)
            .await;
    }

    async fn mock_workflow(&self, states: Value) {
        self.mock_get("epic-workflow", json!({ "id": 1, "epic_states": states }), 1)
            .await;
    }

    async fn mock_standard_workflow(&self) {
        self.mock_workflow(json!([
            { "id": TODO, "name": "to do", "type": "unstarted" },
            { "id": STARTED, "name": "in progress", "type": "started" },
            { "id": DONE, "name": "done", "type": "done" }
        ]))
        .await;
    }
}

fn epic(id: i64, state: i64, started: u64, done: u64) -> Value {
    json!({
        "id": id,
        "name": format!("Epic {id}"),
        "epic_state_id": state,
        "stats": {
            "num_points": 5,
            "num_stories_started": started,
            "num_stories_done": done,
            "num_stories_unstarted": 2
        }
    })
}

fn event_with(action: Value) -> String {
    json!({
        "id": "595285dc-9c43-4b9c-a1e6-0cd9aff5b084",
        "changed_at": "2017-06-27T16:20:44Z",
        "primary_id": 12,
        "version": "v1",
        "member_id": "56d8a839-1c52-437f-b981-c3a15a11d6d4",
        "actions": [action],
        "references": [{
            "id": 500000010,
            "entity_type": "workflow-state",
            "name": "In Progress",
            "type": "started"
        }]
    })
    .to_string()
}

fn story_moved() -> Value {
    json!({
        "id": 12,
        "entity_type": "story",
        "action": "update",
        "name": "Wire up the webhook",
        "story_type": "feature",
        "app_url": "https://app.clubhouse.io/example/story/12",
        "changes": {
            "workflow_state_id": { "old": 1, "new": 2 }
        }
    })
}

#[tokio::test]
async fn test_fetch_sends_token_and_content_type() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_get("epics/7", epic(7, TODO, 0, 0), 1).await;

    let value = mock.client().fetch(&ResourceKey::Epic(7)).await.unwrap();

    assert_eq!(value["epic_state_id"], TODO);
}

#[tokio::test]
async fn test_update_sends_partial_payload() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_epic_state_update(7, STARTED, 1).await;

    let value = mock
        .client()
        .update(&ResourceKey::Epic(7), json!({ "epic_state_id": STARTED }))
        .await
        .unwrap();

    assert_eq!(value["epic_state_id"], STARTED);
}

#[tokio::test]
async fn test_error_status_is_reported_with_body() {
    let mock = ClubhouseApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/epics"))
        .respond_with(ResponseTemplate::new(401).set_body_string("{\"message\":\"Unauthorized\"}"))
        .mount(&mock.server)
        .await;

    let err = mock.client().fetch(&ResourceKey::Epics).await.unwrap_err();

    match err {
        ClubhouseError::UnexpectedStatus { resource, status, body } => {
            assert_eq!(resource, "epics");
            assert_eq!(status, 401);
            assert!(body.contains("Unauthorized"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let mock = ClubhouseApiMock::new().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/epic-workflow"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&mock.server)
        .await;

    let err = mock.client().fetch(&ResourceKey::EpicWorkflow).await.unwrap_err();

    assert!(matches!(err, ClubhouseError::Parse { .. }));
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error_without_token() {
    let settings = ClubhouseConfig {
        // nothing listens on the discard port
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_seconds: 2,
        ..ClubhouseConfig::default()
    };
    let client = ClubhouseClient::new(&settings, "do-not-leak".to_string()).unwrap();

    let err = client.fetch(&ResourceKey::Epics).await.unwrap_err();

    assert!(matches!(err, ClubhouseError::Transport { .. }));
    assert!(!err.to_string().contains("do-not-leak"));
}

#[tokio::test]
async fn test_story_progress_starts_epic() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_standard_workflow().await;
    mock.mock_get("epics", json!([epic(1, TODO, 3, 0)]), 1).await;
    mock.mock_get("epics/1", epic(1, TODO, 3, 0), 1).await;
    mock.mock_epic_state_update(1, STARTED, 1).await;
    mock.forbid_other_updates().await;

    let body = event_with(story_moved());
    let event = handle_event(&mock.client(), &body).await.unwrap();

    assert_eq!(event, parse_event(&body).unwrap());
    assert_eq!(
        serde_json::to_value(&event).unwrap(),
        serde_json::from_str::<Value>(&body).unwrap()
    );
}

#[tokio::test]
async fn test_started_epic_is_left_alone() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_standard_workflow().await;
    mock.mock_get("epics", json!([epic(1, STARTED, 3, 0)]), 1).await;
    mock.mock_get("epics/1", epic(1, STARTED, 3, 0), 1).await;
    mock.forbid_other_updates().await;

    let report = handle_event_with_report(&mock.client(), &event_with(story_moved()))
        .await
        .unwrap();

    assert!(report.side_effect_fired);
    assert!(report.transitions.is_empty());
}

#[tokio::test]
async fn test_both_epics_follow_their_stories() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_standard_workflow().await;
    mock.mock_get(
        "epics",
        json!([epic(1, DONE, 0, 4), epic(2, STARTED, 0, 0), epic(3, TODO, 1, 0)]),
        1,
    )
    .await;
    // listing says "done", but a fresh read is what decides
    mock.mock_get("epics/1", epic(1, TODO, 0, 4), 1).await;
    mock.mock_get("epics/2", epic(2, STARTED, 0, 0), 1).await;
    mock.mock_epic_state_update(1, STARTED, 1).await;
    mock.mock_epic_state_update(2, TODO, 1).await;
    mock.forbid_other_updates().await;

    let report = handle_event_with_report(&mock.client(), &event_with(story_moved()))
        .await
        .unwrap();

    assert_eq!(report.transitions.len(), 2);
}

#[tokio::test]
async fn test_story_creation_reads_only_the_listing() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_standard_workflow().await;
    mock.mock_get("epics", json!([epic(1, TODO, 3, 0)]), 1).await;
    mock.mock_get("epics/1", epic(1, TODO, 3, 0), 0).await;
    mock.forbid_other_updates().await;

    let body = event_with(json!({
        "id": 13,
        "entity_type": "story",
        "action": "create",
        "name": "Brand new story"
    }));
    let event = handle_event(&mock.client(), &body).await.unwrap();

    assert_eq!(event.actions[0].id, 13);
}

#[tokio::test]
async fn test_workflow_without_to_do_state_fails_before_epic_reads() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_workflow(json!([
        { "id": STARTED, "name": "in progress" },
        { "id": DONE, "name": "done" }
    ]))
    .await;
    mock.mock_get("epics", json!([epic(1, TODO, 3, 0)]), 1).await;
    mock.mock_get("epics/1", epic(1, TODO, 3, 0), 0).await;
    mock.forbid_other_updates().await;

    let err = handle_event(&mock.client(), &event_with(story_moved()))
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::Configuration { ref state_name } if state_name == "to do"));
}

#[tokio::test]
async fn test_failed_epic_listing_aborts_invocation() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_standard_workflow().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/epics"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock.server)
        .await;
    mock.forbid_other_updates().await;

    let err = handle_event(&mock.client(), &event_with(story_moved()))
        .await
        .unwrap_err();

    assert!(matches!(err, HandlerError::Transport(_)));
}

#[tokio::test]
async fn test_failed_epic_write_aborts_before_second_epic() {
    let mock = ClubhouseApiMock::new().await;
    mock.mock_standard_workflow().await;
    mock.mock_get("epics", json!([epic(1, TODO, 3, 0), epic(2, STARTED, 0, 0)]), 1)
        .await;
    mock.mock_get("epics/1", epic(1, TODO, 3, 0), 1).await;
    mock.mock_get("epics/2", epic(2, STARTED, 0, 0), 0).await;
    Mock::given(method("PUT"))
        .and(path("/api/v2/epics/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("{\"message\":\"Server error\"}"))
        .expect(1)
        .mount(&mock.server)
        .await;
    mock.forbid_other_updates().await;

    let err = handle_event(&mock.client(), &event_with(story_moved()))
        .await
        .unwrap_err();

    match err {
        HandlerError::Transport(ClubhouseError::UnexpectedStatus { resource, status, .. }) => {
            assert_eq!(resource, "epics/1");
            assert_eq!(status, 500);
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
}
