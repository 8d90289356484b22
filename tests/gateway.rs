use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use palaver::chat::{ChatConfig, ChatSession};
use palaver::server::{Readiness, router};
use palaver::{Error, GenerationParams, Generator, Result};

struct Echo;

#[async_trait::async_trait]
impl Generator for Echo {
    async fn generate(&self, _: &str, _: &GenerationParams) -> Result<String> {
        Ok("OK".to_string())
    }
}

struct Failing;

#[async_trait::async_trait]
impl Generator for Failing {
    async fn generate(&self, _: &str, _: &GenerationParams) -> Result<String> {
        Err(Error::overloaded("Model is overloaded"))
    }
}

struct Slow(Duration);

#[async_trait::async_trait]
impl Generator for Slow {
    async fn generate(&self, _: &str, _: &GenerationParams) -> Result<String> {
        tokio::time::sleep(self.0).await;
        Ok("late".to_string())
    }
}

/// Tracks how many generations run at the same time.
#[derive(Clone, Default)]
struct Overlap {
    in_flight: Arc<AtomicUsize>,
    max: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Generator for Overlap {
    async fn generate(&self, _: &str, _: &GenerationParams) -> Result<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok("done".to_string())
    }
}

fn ready_app(generator: impl Generator + 'static) -> Router {
    let config = ChatConfig::new().with_model("test/echo");
    router(Readiness::ready(ChatSession::new(Box::new(generator), &config)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn status_while_initializing() {
    let app = router(Readiness::new());
    let (status, body) = send(&app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], json!(false));
    assert_eq!(body["state"], json!("initializing"));
}

#[tokio::test]
async fn every_session_endpoint_is_unavailable_before_ready() {
    let app = router(Readiness::new());

    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("initializing"));

    let (status, _) = send(&app, post_empty("/api/clear")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = send(&app, get("/api/history")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn chat_round_trip() {
    let app = ready_app(Echo);

    let (status, body) = send(&app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], json!(true));
    assert_eq!(body["model"], json!("test/echo"));

    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"response": "OK"}));

    let (status, body) = send(&app, get("/api/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"history": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "OK"}
        ]})
    );
}

#[tokio::test]
async fn empty_message_is_rejected_without_touching_history() {
    let app = ready_app(Echo);
    send(&app, post_json("/api/chat", json!({"message": "first"}))).await;

    for body in [json!({"message": ""}), json!({"message": "   "}), json!({})] {
        let (status, reply) = send(&app, post_json("/api/chat", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(reply, json!({"error": "Message is required"}));
    }

    let (_, body) = send(&app, get("/api/history")).await;
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = ready_app(Echo);
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"message\": "))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn generation_failure_is_reported_as_the_reply() {
    let app = ready_app(Failing);
    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::OK);
    let text = body["response"].as_str().unwrap();
    assert!(text.starts_with("Error generating response: "));
    assert!(text.contains("overloaded"));

    let (_, body) = send(&app, get("/api/history")).await;
    assert_eq!(body["history"][1]["content"], json!(text));
}

#[tokio::test]
async fn clear_empties_history() {
    let app = ready_app(Echo);
    send(&app, post_json("/api/chat", json!({"message": "hi"}))).await;

    let (status, body) = send(&app, post_empty("/api/clear")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let (_, body) = send(&app, get("/api/history")).await;
    assert_eq!(body, json!({"history": []}));
}

#[tokio::test]
async fn failed_load_is_an_internal_error() {
    let readiness = Readiness::new();
    readiness.set_failed(Error::model_load("inference server unreachable", "gpt2"));
    let app = router(readiness);

    let (_, body) = send(&app, get("/api/status")).await;
    assert_eq!(body["ready"], json!(false));
    assert_eq!(body["state"], json!("failed"));
    assert!(body["error"].as_str().unwrap().contains("unreachable"));

    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("failed to initialize"));
}

#[tokio::test]
async fn index_serves_the_chat_page() {
    let app = router(Readiness::new());
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let page = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(page.contains("/api/status"));
    assert!(page.contains("/api/chat"));
}

#[tokio::test]
async fn readiness_flips_while_serving() {
    let readiness = Readiness::new();
    let app = router(readiness.clone());

    let (status, _) = send(&app, post_json("/api/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    readiness.set_ready(ChatSession::new(Box::new(Echo), &ChatConfig::new()));
    let (status, body) = send(&app, post_json("/api/chat", json!({"message": "hi"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], json!("OK"));
}

#[tokio::test]
async fn abandoned_chat_still_records_both_turns() {
    let app = ready_app(Slow(Duration::from_millis(200)));
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        app.clone()
            .oneshot(post_json("/api/chat", json!({"message": "hi"}))),
    )
    .await;
    assert!(abandoned.is_err());

    let (status, body) = send(&app, get("/api/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"history": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "late"}
        ]})
    );
}

#[tokio::test]
async fn concurrent_chats_are_serialized() {
    let overlap = Overlap::default();
    let app = ready_app(overlap.clone());

    let (first, second) = tokio::join!(
        send(&app, post_json("/api/chat", json!({"message": "one"}))),
        send(&app, post_json("/api/chat", json!({"message": "two"}))),
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    assert_eq!(overlap.max.load(Ordering::SeqCst), 1);

    let (_, body) = send(&app, get("/api/history")).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 4);
    for (i, turn) in history.iter().enumerate() {
        let role = if i % 2 == 0 { "user" } else { "assistant" };
        assert_eq!(turn["role"], json!(role));
    }
    assert_eq!(history[1]["content"], json!("done"));
    assert_eq!(history[3]["content"], json!("done"));
}
