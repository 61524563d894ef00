//! Integration tests for Shopchat
//!
//! These tests run the chat session against a mock backend over HTTP

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use serde_json::{json, Value};
use shopchat::config::{BackendConfig, ImageConfig, RetryConfig};
use shopchat::{
    BackendClient, ChatSession, ImagePreprocessor, Role, SendOutcome, Settings,
};
use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_for(server: &MockServer) -> ChatSession {
    let client = BackendClient::new(&BackendConfig {
        base_url: server.uri(),
        request_timeout_ms: 5_000,
    })
    .unwrap();
    ChatSession::new(Arc::new(client), RetryConfig::default())
}

async fn chat_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/chat")
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

#[tokio::test]
async fn test_conversation_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Here are two tees for running.",
            "products": [
                {"id": "T1", "name": "Dri-fit tee", "price": "$19.99", "image_url": "https://img/t1.jpg",
                 "rating": 4.5, "review_count": 1200, "description": "Breathable"},
                {"id": "T2", "name": "Cotton tee", "price": "$9.99", "image_url": "https://img/t2.jpg",
                 "rating": null, "review_count": null, "description": "Soft"}
            ],
            "intent": "SEARCH",
            "session_id": "sess-abc"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "The Dri-fit tee is lighter.",
            "products": [],
            "intent": "SEARCH",
            "session_id": "sess-abc"
        })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    assert_eq!(
        session.send_message(Some("recommend a t-shirt for sports"), None).await,
        SendOutcome::Completed
    );
    assert_eq!(
        session.send_message(Some("compare them"), None).await,
        SendOutcome::Completed
    );

    let bodies = chat_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["session_id"], Value::Null);
    assert_eq!(bodies[0]["previous_products"], json!([]));
    assert_eq!(bodies[1]["session_id"], "sess-abc");
    assert_eq!(bodies[1]["previous_products"][0]["id"], "T1");
    assert_eq!(bodies[1]["previous_products"].as_array().unwrap().len(), 2);
    for entry in bodies[1]["history"].as_array().unwrap() {
        assert!(entry.get("products").is_none());
    }

    let state = session.snapshot();
    assert_eq!(state.session_id.as_deref(), Some("sess-abc"));
    assert_eq!(state.messages.len(), 4);
    assert!(state.messages[3].products.is_none());
}

#[tokio::test]
async fn test_cold_start_is_retried_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(503)
                .insert_header("Retry-After", "1")
                .set_body_json(json!({"detail": "Service warming up", "ready": false})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "Hi! I'm your shopping assistant.",
            "intent": "CHAT",
            "session_id": "s1"
        })))
        .mount(&server)
        .await;

    let session = session_for(&server);
    let started = Instant::now();
    let outcome = session.send_message(Some("hello"), None).await;

    assert_eq!(outcome, SendOutcome::Completed);
    assert!(started.elapsed() >= Duration::from_secs(1));

    let state = session.snapshot();
    let roles: Vec<Role> = state.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant]);
    assert!(!state.loading && !state.warming_up);
    assert_eq!(chat_bodies(&server).await.len(), 2);
}

#[tokio::test]
async fn test_validation_error_is_shown_inline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "LLM timeout"})))
        .mount(&server)
        .await;

    let session = session_for(&server);
    assert_eq!(
        session.send_message(Some("hi"), None).await,
        SendOutcome::Failed
    );

    let state = session.snapshot();
    assert_eq!(state.error.as_deref(), Some("LLM timeout"));
    let last = state.last_message().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.contains("LLM timeout"));
    assert_eq!(chat_bodies(&server).await.len(), 1);
}

#[tokio::test]
async fn test_unreachable_backend_surfaces_error() {
    let client = BackendClient::new(&BackendConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        request_timeout_ms: 2_000,
    })
    .unwrap();
    let session = ChatSession::new(Arc::new(client), RetryConfig::default());

    assert_eq!(
        session.send_message(Some("hi"), None).await,
        SendOutcome::Failed
    );
    let state = session.snapshot();
    let error = state.error.clone().unwrap();
    assert!(state.last_message().unwrap().content.contains(&error));
}

#[tokio::test]
async fn test_image_search_sends_compressed_data_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "These look similar.",
            "products": [{"id": "L1", "name": "Lego city", "price": "$39", "image_url": "x"}],
            "intent": "IMAGE_SEARCH",
            "session_id": "img"
        })))
        .mount(&server)
        .await;

    let mut raw = Vec::new();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(1600, 1200, Rgba([200, 30, 30, 128])))
        .write_to(&mut Cursor::new(&mut raw), ImageFormat::Png)
        .unwrap();
    let prepared = ImagePreprocessor::new(ImageConfig::default())
        .prepare(&raw)
        .unwrap();
    assert_eq!((prepared.width, prepared.height), (800, 600));

    let session = session_for(&server);
    session.send_message(None, Some(&prepared)).await;

    let bodies = chat_bodies(&server).await;
    let image = bodies[0]["image_base64"].as_str().unwrap();
    assert!(image.starts_with("data:image/jpeg;base64,"));
    assert_eq!(bodies[0]["message"], "Find products matching this image");
    assert!(session.snapshot().messages[1].has_products());
}

#[tokio::test]
async fn test_default_settings_point_at_local_backend() {
    let settings = Settings::default();
    assert_eq!(settings.backend.base_url, "http://localhost:8000");
}
