// tests/api_contract_test.rs
//! HTTP contract of the research backend client, against a mock server.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use pretty_assertions::assert_eq;
use serde_json::json;

use common::wait_until;
use research_client_lib::api::{ApiError, ResearchApi, UserConfirm};
use research_client_lib::core::{Plan, ResearchStatus, Role};
use research_client_lib::store::ResearchStore;
use research_client_lib::transport::{EventSink, ResearchTransport, StreamingTransport};
use research_client_lib::{ClientConfig, ResearchEvent, SessionController};

fn api_for(server: &MockServer) -> ResearchApi {
    ResearchApi::new(config_for(server)).expect("api should initialize")
}

fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig {
        base_url: server.base_url(),
        poll_interval: Duration::from_millis(50),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn plan_json() -> serde_json::Value {
    json!({
        "title": "Fusion outlook",
        "thought": "start broad",
        "steps": [
            { "title": "History", "description": "timeline" },
            { "title": "Funding", "description": "who pays" }
        ]
    })
}

#[tokio::test]
async fn start_posts_topic_and_locale_and_parses_snapshot() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/research/start")
            .header("content-type", "application/json")
            .json_body(json!({ "topic": "fusion", "locale": "zh-CN" }));
        then.status(200).json_body(json!({
            "messages": "Here is the plan",
            "need_plan": true,
            "plan_id": "p1",
            "status": "awaiting_confirmation",
            "current_stage": "human_feedback",
            "current_plan": plan_json()
        }));
    });

    let snapshot = api_for(&server).start("fusion").await.expect("start should succeed");

    mock.assert();
    assert_eq!(snapshot.plan_id.as_deref(), Some("p1"));
    assert_eq!(snapshot.research_status(), Some(ResearchStatus::AwaitingConfirmation));
    assert!(snapshot.is_terminal());
    assert_eq!(snapshot.plan().unwrap().steps.len(), 2);
}

#[tokio::test]
async fn confirm_plan_sends_decision_and_optional_message() {
    let server = MockServer::start();
    let modify = server.mock(|when, then| {
        when.method(POST).path("/api/research/confirm-plan").json_body(json!({
            "plan_id": "p1",
            "user_confirm": "modify",
            "message": "add costs"
        }));
        then.status(200)
            .json_body(json!({ "plan_id": "p1", "status": "plan_generated" }));
    });
    let confirm = server.mock(|when, then| {
        when.method(POST)
            .path("/api/research/confirm-plan")
            .json_body(json!({ "plan_id": "p1", "user_confirm": "confirm" }));
        then.status(200)
            .json_body(json!({ "plan_id": "p1", "status": "research_completed" }));
    });

    let api = api_for(&server);
    let modified = api
        .confirm_plan("p1", UserConfirm::Modify, Some("add costs".to_string()))
        .await
        .unwrap();
    let confirmed = api.confirm_plan("p1", UserConfirm::Confirm, None).await.unwrap();

    modify.assert();
    confirm.assert();
    assert_eq!(modified.research_status(), Some(ResearchStatus::PlanGenerated));
    assert_eq!(confirmed.research_status(), Some(ResearchStatus::ResearchCompleted));
}

#[tokio::test]
async fn status_errors_map_to_api_errors() {
    let server = MockServer::start();
    let _missing = server.mock(|when, then| {
        when.method(GET).path("/api/research/status/gone");
        then.status(404).body("plan not found");
    });
    let _garbled = server.mock(|when, then| {
        when.method(GET).path("/api/research/status/garbled");
        then.status(200).body("<html>");
    });

    let api = api_for(&server);

    let err = api.status("gone").await.unwrap_err();
    assert!(err.is_not_found());
    match err {
        ApiError::Http { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "plan not found");
        }
        other => panic!("expected http error, got {other:?}"),
    }

    let err = api.status("garbled").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
}

#[tokio::test]
async fn plan_lifecycle_endpoints() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/api/research/create-plan")
            .json_body(json!({ "topic": "fusion" }));
        then.status(200).json_body(json!({
            "id": "p9",
            "title": "Fusion outlook",
            "thought": "start broad",
            "steps": [{ "title": "History", "description": "timeline" }]
        }));
    });
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/api/research/update-plan/p9")
            .body_contains("\"title\":\"Fusion outlook, revised\"");
        then.status(200).json_body(json!({
            "id": "p9",
            "title": "Fusion outlook, revised",
            "steps": []
        }));
    });
    let start = server.mock(|when, then| {
        when.method(POST).path("/api/research/start/p9");
        then.status(200).json_body(json!({ "status": "started" }));
    });
    let progress = server.mock(|when, then| {
        when.method(GET).path("/api/research/progress/p9");
        then.status(200).json_body(json!({
            "status": "completed",
            "current_process": "writing report",
            "logs": ["step 1 done", "step 2 done"]
        }));
    });
    let report = server.mock(|when, then| {
        when.method(GET).path("/api/research/report/p9");
        then.status(200)
            .json_body(json!({ "content": "# Fusion", "format": "markdown" }));
    });
    let stop = server.mock(|when, then| {
        when.method(POST).path("/api/research/stop/p9");
        then.status(204);
    });

    let api = api_for(&server);

    let mut plan: Plan = api.create_plan("fusion").await.unwrap();
    assert_eq!(plan.id, "p9");
    assert_eq!(plan.steps.len(), 1);

    plan.title = "Fusion outlook, revised".to_string();
    let updated = api.update_plan(&plan).await.unwrap();
    assert_eq!(updated.title, "Fusion outlook, revised");

    api.start_plan("p9").await.unwrap();
    let progress_report = api.progress("p9").await.unwrap();
    assert!(progress_report.is_completed());
    assert_eq!(progress_report.logs.len(), 2);

    let final_report = api.report("p9").await.unwrap();
    assert_eq!(final_report.content, "# Fusion");
    assert_eq!(final_report.extra.get("format"), Some(&json!("markdown")));

    api.stop("p9").await.unwrap();

    create.assert();
    update.assert();
    start.assert();
    progress.assert();
    report.assert();
    stop.assert();
}

#[tokio::test]
async fn event_stream_is_decoded_into_typed_events() {
    let server = MockServer::start();
    let stream = server.mock(|when, then| {
        when.method(POST)
            .path("/api/research/start/stream")
            .query_param("mode", "messages")
            .header("accept", "text/event-stream")
            .json_body(json!({ "topic": "fusion", "locale": "zh-CN" }));
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                ": keep-alive\r\n\r\n",
                "event: started\r\ndata: {\"plan_id\":\"p1\"}\r\n\r\n",
                "event: chunk\ndata: {\"delta\":\"Thinking\"}\n\n",
                "event: heartbeat\ndata: {}\n\n",
                "event: done\ndata: {}\n\n",
            ));
    });

    let transport = StreamingTransport::new(Arc::new(api_for(&server)), "zh-CN");
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: EventSink = Arc::new(move |event| captured.lock().unwrap().push(event));

    transport.start("fusion", sink).finished().await;

    stream.assert();
    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            ResearchEvent::Started {
                plan_id: "p1".to_string()
            },
            ResearchEvent::Chunk {
                plan_id: None,
                delta: "Thinking".to_string()
            },
            ResearchEvent::Unknown {
                name: "heartbeat".to_string(),
                payload: json!({})
            },
            ResearchEvent::Done,
        ]
    );
}

#[tokio::test]
async fn snapshot_session_runs_from_start_to_completion() {
    let server = MockServer::start();
    let start = server.mock(|when, then| {
        when.method(POST).path("/api/research/start");
        then.status(200).json_body(json!({
            "messages": "Here is the plan",
            "need_plan": true,
            "plan_id": "p1",
            "status": "awaiting_confirmation",
            "current_stage": "human_feedback",
            "current_plan": plan_json()
        }));
    });
    let confirm = server.mock(|when, then| {
        when.method(POST).path("/api/research/confirm-plan");
        then.status(200).json_body(json!({
            "plan_id": "p1",
            "status": "research_completed",
            "current_stage": "research_node"
        }));
    });
    let status = server.mock(|when, then| {
        when.method(GET).path("/api/research/status/p1");
        then.status(200).json_body(json!({
            "plan_id": "p1",
            "status": "completed",
            "research_summary": "# Fusion report",
            "step_results": [{ "step": 1 }, { "step": 2 }]
        }));
    });

    let controller = SessionController::new(
        ResearchStore::new(),
        Arc::new(ResearchApi::new(config_for(&server)).unwrap()),
    );
    let notices = Arc::new(Mutex::new(Vec::new()));
    let captured = notices.clone();
    let _sub = controller.on_terminal(move |notice| {
        captured.lock().unwrap().push(notice.status);
    });

    let state = controller.start_research_snapshot("fusion").await.unwrap();
    start.assert();
    assert_eq!(state.status, ResearchStatus::AwaitingConfirmation);
    assert_eq!(state.plan_id.as_deref(), Some("p1"));
    assert!(!state.is_loading);
    assert_eq!(state.current_plan.as_ref().unwrap().steps.len(), 2);
    let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert_eq!(state.messages[1].content, "Here is the plan");
    // already paused for confirmation, nothing to poll
    assert_eq!(controller.session_key(), None);

    let state = controller.confirm_plan(UserConfirm::Confirm, None).await.unwrap();
    confirm.assert();
    assert_eq!(state.status, ResearchStatus::ResearchCompleted);
    assert!(state.is_loading);
    assert!(controller.is_connected());

    let store = controller.store().clone();
    wait_until(|| store.snapshot().status == ResearchStatus::Completed).await;
    let handle = controller.active_handle();
    assert!(handle.is_none());

    let state = store.snapshot();
    assert_eq!(state.research_summary.as_deref(), Some("# Fusion report"));
    assert_eq!(state.step_results.len(), 2);
    assert!(!state.is_loading);
    assert!(status.hits() >= 1);
    assert_eq!(
        *notices.lock().unwrap(),
        vec![ResearchStatus::AwaitingConfirmation, ResearchStatus::Completed]
    );
}

#[tokio::test]
async fn failed_start_records_error_on_the_store() {
    let server = MockServer::start();
    let _start = server.mock(|when, then| {
        when.method(POST).path("/api/research/start");
        then.status(500).body("model offline");
    });

    let controller = SessionController::new(
        ResearchStore::new(),
        Arc::new(ResearchApi::new(config_for(&server)).unwrap()),
    );
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    let _sub = controller.store().subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = controller.start_research_snapshot("fusion").await.unwrap_err();
    assert!(err.to_string().contains("500"));

    let state = controller.store().snapshot();
    assert_eq!(state.research_topic, "fusion");
    assert!(!state.is_loading);
    assert!(state.error.as_deref().unwrap().contains("model offline"));
    assert!(changes.load(Ordering::SeqCst) > 1);
}
