//! HTTP round trips against the router with an in-process session.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use fedpharm_llm::scripted::ScriptedBackend;
use fedpharm_llm::IntelligenceService;
use fedpharm_sim::rng::SequenceSource;
use fedpharm_sim::{ActivityConfig, Session, SessionConfig, SessionHandle};
use fedpharm_web::router::build_router;
use fedpharm_web::state::AppState;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    let config = SessionConfig { activity: ActivityConfig::disabled(), ..Default::default() };
    let session = Session::new(config, Box::new(SequenceSource::constant(0.5)));
    let intelligence = IntelligenceService::new(Arc::new(ScriptedBackend::replying("### FDA Approval Status\nPhase II")));
    build_router(AppState::new(SessionHandle::spawn(session, Arc::new(intelligence))))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

#[tokio::test]
async fn test_participants_catalogue() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/participants", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body.as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Hospital", "Research Lab", "Pharmacy"]);
    assert_eq!(body[0]["wizard"]["phase"], "selecting_file");
}

#[tokio::test]
async fn test_error_statuses() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/training/start", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Not all participants have contributed yet");

    let (status, _) = send(&app, Method::POST, "/api/participants/clinic/cancel", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/participants/hospital/file",
        Some(json!({ "name": "weights.csv", "size_bytes": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Invalid file type. Please use: .bin, .model, .h5");

    let (status, _) = send(&app, Method::DELETE, "/api/collaborators/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_upload_and_train_over_http() {
    let app = app();
    for id in ["hospital", "lab", "pharmacy"] {
        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/participants/{id}/file"),
            Some(json!({ "name": "model.bin", "size_bytes": 2048 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/participants/{id}/submit"),
            Some(json!({ "version": "v2.1.0" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["wizard"]["phase"], "submitting");
    }

    tokio::time::sleep(Duration::from_secs(3)).await;

    for id in ["hospital", "lab", "pharmacy"] {
        let (status, body) = send(&app, Method::POST, &format!("/api/participants/{id}/confirm"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["tx_id"].as_str().unwrap().starts_with("0x"));
    }

    let (_, body) = send(&app, Method::GET, "/api/readiness", None).await;
    assert_eq!(body["ready"], true);

    let (status, body) = send(&app, Method::POST, "/api/training/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "running");

    tokio::time::sleep(Duration::from_secs(40)).await;

    let (_, body) = send(&app, Method::GET, "/api/session", None).await;
    assert_eq!(body["state"], "complete");
    assert_eq!(body["chart"].as_array().unwrap().len(), 20);
    assert_eq!(body["participants"][1]["upload"]["version"], "v2.1.0");

    let (_, body) = send(&app, Method::GET, "/api/intelligence", None).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["report"]["knowledge_sections"][0]["title"], "FDA Approval Status");
}

#[tokio::test]
async fn test_chat_and_collaborators() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/api/chat", Some(json!({ "message": "   " }))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, Method::POST, "/api/chat", Some(json!({ "message": "hello team" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "You");

    let (status, _) = send(&app, Method::POST, "/api/chat", Some(json!({ "role": "System", "message": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::POST, "/api/chat/summary", None).await;
    assert_eq!(body["started"], false);

    let (status, member) = send(
        &app,
        Method::POST,
        "/api/collaborators",
        Some(json!({ "name": "Dr. Lena Ortiz", "role": "Pharmacologist", "institution": "Pharmacy" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(member["last_active"], "online");

    let (_, roster) = send(&app, Method::GET, "/api/collaborators", None).await;
    assert_eq!(roster.as_array().unwrap().len(), 7);

    let uri = format!("/api/collaborators/{}", member["id"].as_str().unwrap());
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_event_stream_names_frames_by_kind() {
    use futures_util::StreamExt;

    let app = app();
    let request = Request::builder().uri("/api/events").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut frames = response.into_body().into_data_stream();

    let (status, _) = send(&app, Method::POST, "/api/chat", Some(json!({ "message": "Café ✨ results" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut received = String::new();
    let found = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(bytes)) = frames.next().await {
            received.push_str(&String::from_utf8_lossy(&bytes));
            if received.contains("event: chat\n") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    assert!(found, "no chat frame in {received:?}");
    assert!(received.contains("Café ✨ results"));
}
