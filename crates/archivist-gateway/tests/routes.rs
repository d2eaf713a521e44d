// SPDX-FileCopyrightText: 2026 Archivist Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use archivist_core::types::{ArchiveEntry, Direction, InboundMessage};
use archivist_core::{
    ArchiveStore, ArchivistError, MessageHandler, PlatformClient, SessionRegistry, UserId,
};
use archivist_gateway::{AuthConfig, GatewayState, HealthState, build_router};
use archivist_resilience::{CircuitBreaker, Dispatcher, RateLimit, ThrottlePolicy};
use archivist_session::{CredentialStore, LoginCoordinator, Supervisor};
use archivist_test_utils::fixtures::profile;
use archivist_test_utils::{LoginScript, MemoryStore, MockConnector, MockPlatform, RecordingControl};

const TOKEN: &str = "operator-token";

struct Ignore;

#[async_trait]
impl MessageHandler for Ignore {
    async fn on_event(
        &self,
        _owner: UserId,
        _client: Arc<dyn PlatformClient>,
        _message: InboundMessage,
    ) -> Result<(), ArchivistError> {
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    router: Router,
    store: Arc<MemoryStore>,
    dispatcher: Arc<Dispatcher>,
    connector: Arc<MockConnector>,
    credentials: Arc<CredentialStore>,
}

fn harness(bearer_token: Option<&str>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let connector = Arc::new(MockConnector::new());
    let control = Arc::new(RecordingControl::new());
    let store = Arc::new(MemoryStore::new());
    let credentials = Arc::new(CredentialStore::new(dir.path()));
    let dispatcher = Arc::new(Dispatcher::new(
        RateLimit::default(),
        ThrottlePolicy::default(),
        CircuitBreaker::new(),
    ));
    let supervisor = Supervisor::new(
        Arc::new(SessionRegistry::new()),
        connector.clone(),
        credentials.clone(),
        store.clone(),
        control.clone(),
        Arc::new(Ignore),
        dispatcher.clone(),
    );
    let logins = LoginCoordinator::new(
        connector.clone(),
        credentials.clone(),
        store.clone(),
        control,
        supervisor.clone(),
    );
    let state = GatewayState {
        logins,
        supervisor,
        store: store.clone(),
        dispatcher: dispatcher.clone(),
        auth: AuthConfig {
            bearer_token: bearer_token.map(String::from),
        },
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render: None,
        },
    };
    Harness {
        _dir: dir,
        router: build_router(state),
        store,
        dispatcher,
        connector,
        credentials,
    }
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health_is_public() {
    let h = harness(Some(TOKEN));
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&h.router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["live_sessions"], 0);
}

#[tokio::test]
async fn metrics_are_absent_without_an_exporter() {
    let h = harness(Some(TOKEN));
    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, _) = send(&h.router, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn control_routes_require_the_token() {
    let h = harness(Some(TOKEN));

    let missing = Request::builder().uri("/v1/traffic").body(Body::empty()).unwrap();
    assert_eq!(send(&h.router, missing).await.0, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/v1/traffic")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&h.router, wrong).await.0, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&h.router, request("GET", "/v1/traffic", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blocked"], false);
}

#[tokio::test]
async fn no_configured_token_rejects_everything() {
    let h = harness(None);
    let (status, _) = send(&h.router, request("GET", "/v1/traffic", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn resume_closes_the_breaker() {
    let h = harness(Some(TOKEN));
    h.dispatcher.breaker().trip();

    let (_, body) = send(&h.router, request("GET", "/v1/traffic", None)).await;
    assert_eq!(body["blocked"], true);

    let (status, body) = send(&h.router, request("POST", "/v1/traffic/resume", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["changed"], true);
    assert!(!h.dispatcher.breaker().is_tripped());

    let (_, body) = send(&h.router, request("POST", "/v1/traffic/resume", None)).await;
    assert_eq!(body["changed"], false);
}

#[tokio::test]
async fn archive_entries_are_listed_per_contact() {
    let h = harness(Some(TOKEN));
    let now = Utc::now();
    for (contact, id) in [(2, 10), (2, 11), (3, 12)] {
        h.store
            .append_entry(&ArchiveEntry {
                owner_id: UserId(1),
                contact_id: UserId(contact),
                message_id: id,
                direction: Direction::OtherToMe,
                text: Some("hi".into()),
                forwarded: true,
                media: None,
                date: now,
                created_at: now,
            })
            .await
            .unwrap();
    }

    let (status, body) = send(&h.router, request("GET", "/v1/owners/1/archive/2", None)).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["message_id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![10, 11]);
    assert_eq!(body[0]["direction"], "other->me");
}

#[tokio::test]
async fn code_input_without_a_login_is_not_found() {
    let h = harness(Some(TOKEN));
    let input = json!({"input": "1"});
    let (status, body) = send(
        &h.router,
        request("POST", "/v1/owners/1/login/code", Some(input)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(&h.router, request("GET", "/v1/owners/1/login", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_of_an_unknown_owner_is_idle() {
    let h = harness(Some(TOKEN));
    let (status, body) = send(&h.router, request("GET", "/v1/owners/4/session", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["live"], false);
    assert_eq!(body["state"], Value::Null);
    assert_eq!(body["pending"], 0);
}

async fn wait_for_stage(router: &Router, owner: i64, stage: &str) {
    for _ in 0..200 {
        let (status, body) = send(
            router,
            request("GET", &format!("/v1/owners/{owner}/login"), None),
        )
        .await;
        if status == StatusCode::OK && body["stage"] == stage {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("login never reached {stage}");
}

#[tokio::test]
async fn login_is_driven_through_the_api() {
    let h = harness(Some(TOKEN));
    h.connector.script_login(LoginScript {
        account: profile(1, "Ann"),
        session: "tok-1".into(),
        expected_code: "24680".into(),
        two_factor: None,
        expected_password: None,
    });
    h.connector
        .register("tok-1", Arc::new(MockPlatform::new(profile(1, "Ann"))));

    let phone = json!({"phone": "+15550000001"});
    let (status, body) = send(
        &h.router,
        request("POST", "/v1/owners/1/login", Some(phone)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["stage"].is_string());

    wait_for_stage(&h.router, 1, "awaiting_code").await;

    let mut display = Value::Null;
    for digit in ["2", "4", "6", "8", "0", "submit"] {
        let input = json!({"input": digit});
        let (status, body) = send(
            &h.router,
            request("POST", "/v1/owners/1/login/code", Some(input)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        display = body["display"].clone();
    }
    assert!(display.as_str().unwrap().chars().all(|c| c == '_'));

    for _ in 0..200 {
        if h.credentials.contains(UserId(1)) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(h.credentials.contains(UserId(1)));
    assert_eq!(h.connector.transcript().code.as_deref(), Some("24680"));
}

#[tokio::test]
async fn out_of_order_password_aborts_the_login() {
    let h = harness(Some(TOKEN));
    h.connector.script_login(LoginScript {
        account: profile(1, "Ann"),
        session: "tok-1".into(),
        expected_code: "24680".into(),
        two_factor: None,
        expected_password: None,
    });

    send(
        &h.router,
        request("POST", "/v1/owners/1/login", Some(json!({}))),
    )
    .await;
    wait_for_stage(&h.router, 1, "awaiting_phone").await;

    let (status, _) = send(
        &h.router,
        request(
            "POST",
            "/v1/owners/1/login/password",
            Some(json!({"password": "early"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&h.router, request("GET", "/v1/owners/1/login", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancelling_a_login_reports_whether_one_existed() {
    let h = harness(Some(TOKEN));
    h.connector.script_login(LoginScript {
        account: profile(1, "Ann"),
        session: "tok-1".into(),
        expected_code: "24680".into(),
        two_factor: None,
        expected_password: None,
    });
    send(
        &h.router,
        request("POST", "/v1/owners/1/login", Some(json!({}))),
    )
    .await;

    let (_, body) = send(&h.router, request("DELETE", "/v1/owners/1/login", None)).await;
    assert_eq!(body["changed"], true);
    let (_, body) = send(&h.router, request("DELETE", "/v1/owners/1/login", None)).await;
    assert_eq!(body["changed"], false);
}
