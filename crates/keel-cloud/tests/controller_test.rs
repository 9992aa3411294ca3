use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use keel_cloud::controller::BUILDER_AUTH_HEADER;
use keel_cloud::{BuildHook, ConfigRequest, ControllerApi, ControllerError, HttpController};
use keel_core::ProcessTypes;
use secrecy::SecretString;
use serde_json::{Value, json};

/// Last request seen by the fake controller: (auth header, JSON body).
type Captured = Arc<Mutex<Option<(String, Value)>>>;

#[derive(Clone)]
struct Fake {
    captured: Captured,
    status: StatusCode,
    reply: Value,
}

async fn hook(
    State(fake): State<Fake>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get(BUILDER_AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    *fake.captured.lock().unwrap() = Some((auth, body));
    (fake.status, Json(fake.reply.clone()))
}

/// Serves `path` on an ephemeral port and returns the base URL.
async fn serve(path: &str, status: StatusCode, reply: Value) -> (String, Captured) {
    let captured: Captured = Arc::new(Mutex::new(None));
    let app = Router::new().route(path, post(hook)).with_state(Fake {
        captured: captured.clone(),
        status,
        reply,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), captured)
}

fn controller(base_url: &str) -> HttpController {
    HttpController::new(base_url, SecretString::from("builder-key".to_owned()))
}

fn sample_hook() -> BuildHook {
    let mut procfile = ProcessTypes::new();
    procfile.insert("web", "run-server");
    BuildHook {
        receive_user: "alice".to_owned(),
        receive_repo: "myapp".to_owned(),
        image: "myapp".to_owned(),
        sha: "4f2a9c1d".to_owned(),
        procfile,
        dockerfile: false,
    }
}

// ── Config hook ──

#[tokio::test]
async fn fetch_config_sends_key_and_returns_values() {
    let (url, captured) = serve(
        "/v1/hooks/config",
        StatusCode::OK,
        json!({"values": {"BUILDPACK_URL": "https://example.com/bp.git"}}),
    )
    .await;

    let values = controller(&url)
        .fetch_config(&ConfigRequest {
            receive_user: "alice".to_owned(),
            receive_repo: "myapp".to_owned(),
        })
        .await
        .unwrap();

    assert_eq!(
        values.get("BUILDPACK_URL").map(String::as_str),
        Some("https://example.com/bp.git")
    );

    let (auth, body) = captured.lock().unwrap().clone().unwrap();
    assert_eq!(auth, "builder-key");
    assert_eq!(body, json!({"receive_user": "alice", "receive_repo": "myapp"}));
}

#[tokio::test]
async fn fetch_config_without_values_is_empty() {
    let (url, _) = serve("/v1/hooks/config", StatusCode::OK, json!({})).await;

    let values = controller(&url)
        .fetch_config(&ConfigRequest {
            receive_user: "alice".to_owned(),
            receive_repo: "myapp".to_owned(),
        })
        .await
        .unwrap();

    assert!(values.is_empty());
}

#[tokio::test]
async fn fetch_config_rejection_keeps_body() {
    let (url, _) = serve(
        "/v1/hooks/config",
        StatusCode::FORBIDDEN,
        json!({"detail": "bad key"}),
    )
    .await;

    let err = controller(&url)
        .fetch_config(&ConfigRequest {
            receive_user: "alice".to_owned(),
            receive_repo: "myapp".to_owned(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ControllerError::Rejected { status: 403, .. }));
    assert!(err.response_body().unwrap().contains("bad key"));
}

// ── Build hook ──

#[tokio::test]
async fn publish_build_posts_hook_and_reads_release() {
    let (url, captured) = serve(
        "/v1/hooks/build",
        StatusCode::CREATED,
        json!({"release": {"version": 7}, "domains": ["myapp.example.com", "www.example.com"]}),
    )
    .await;

    let release = controller(&url).publish_build(&sample_hook()).await.unwrap();

    assert_eq!(release.version, 7);
    assert_eq!(release.domain.as_deref(), Some("myapp.example.com"));

    let (_, body) = captured.lock().unwrap().clone().unwrap();
    assert_eq!(
        body,
        json!({
            "receive_user": "alice",
            "receive_repo": "myapp",
            "image": "myapp",
            "sha": "4f2a9c1d",
            "procfile": {"web": "run-server"},
            "dockerfile": false,
        })
    );
}

#[tokio::test]
async fn publish_build_without_domains_has_no_domain() {
    let (url, _) = serve(
        "/v1/hooks/build",
        StatusCode::OK,
        json!({"release": {"version": 2}}),
    )
    .await;

    let release = controller(&url).publish_build(&sample_hook()).await.unwrap();

    assert_eq!(release.version, 2);
    assert!(release.domain.is_none());
}

#[tokio::test]
async fn publish_build_with_malformed_reply_is_a_decode_error() {
    let (url, _) = serve("/v1/hooks/build", StatusCode::OK, json!({"release": "v3"})).await;

    let err = controller(&url)
        .publish_build(&sample_hook())
        .await
        .unwrap_err();

    assert!(matches!(err, ControllerError::Decode { .. }));
}

#[tokio::test]
async fn unreachable_controller_is_a_request_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = controller(&format!("http://{addr}/"))
        .publish_build(&sample_hook())
        .await
        .unwrap_err();

    assert!(matches!(err, ControllerError::Request { .. }));
    assert!(err.response_body().is_none());
}
