//! Test utilities for plate-core
//!
//! A mock collaborator server that speaks just enough of the chat completions,
//! Google Geocoding, Yelp Fusion and key proxy APIs for integration tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::MOCK_MENU;

/// Key the mock chat completions endpoint accepts
pub const MOCK_GENERATION_KEY: &str = "sk-mock-generation";
/// Key the mock geocoding endpoint accepts
pub const MOCK_PLACES_KEY: &str = "places-key";
/// Key the mock Yelp endpoints accept
pub const MOCK_DIRECTORY_KEY: &str = "yelp-mock-key";

#[derive(Clone, Default)]
struct MockState {
    chat_requests: Arc<AtomicUsize>,
}

/// Mock third-party server for testing
pub struct MockCollaboratorServer {
    addr: SocketAddr,
    state: MockState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockCollaboratorServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/v1/chat/completions", post(handle_chat))
            .route("/v1/models", get(handle_models))
            .route("/maps/api/geocode/json", get(handle_geocode))
            .route("/api/keys/:name", get(handle_key))
            .route("/v3/businesses/matches", get(handle_matches))
            .route("/v3/businesses/search", get(handle_search))
            .route("/v3/businesses/:id", get(handle_details))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL (chat completions, geocoding, key proxy)
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL for the Yelp endpoints
    pub fn yelp_url(&self) -> String {
        format!("{}/v3", self.url())
    }

    /// Number of chat completion requests received
    pub fn chat_requests(&self) -> usize {
        self.state.chat_requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockCollaboratorServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn bearer_is(headers: &HeaderMap, key: &str) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", key))
}

async fn handle_chat(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    state.chat_requests.fetch_add(1, Ordering::SeqCst);

    if !bearer_is(&headers, MOCK_GENERATION_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error"
                }
            })),
        )
            .into_response();
    }

    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": request["model"],
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": MOCK_MENU},
            "finish_reason": "stop"
        }]
    }))
    .into_response()
}

async fn handle_models() -> Json<Value> {
    Json(json!({"object": "list", "data": [{"id": "gpt-4o-mini", "object": "model"}]}))
}

async fn handle_geocode(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    if params.get("key").map(String::as_str) != Some(MOCK_PLACES_KEY) {
        return Json(json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid.",
            "results": []
        }));
    }

    let address = params.get("address").cloned().unwrap_or_default();
    if address.starts_with("Nowhere") {
        return Json(json!({"status": "ZERO_RESULTS", "results": []}));
    }

    let city = address.split(',').next().unwrap_or_default().trim().to_string();
    let mut components = vec![json!({
        "long_name": city,
        "short_name": city,
        "types": ["locality", "political"]
    })];
    if city == "Los Angeles" {
        components.push(json!({
            "long_name": "Los Angeles County",
            "short_name": "Los Angeles County",
            "types": ["administrative_area_level_2", "political"]
        }));
    }

    Json(json!({
        "status": "OK",
        "results": [{"address_components": components}]
    }))
}

async fn handle_key(Path(name): Path<String>) -> Response {
    match name.as_str() {
        "openai" => Json(json!({"key": MOCK_GENERATION_KEY})).into_response(),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("{} API key not found", name)})),
        )
            .into_response(),
    }
}

fn yelp_unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {
                "code": "TOKEN_INVALID",
                "description": "The access token provided is invalid."
            }
        })),
    )
        .into_response()
}

async fn handle_matches(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !bearer_is(&headers, MOCK_DIRECTORY_KEY) {
        return yelp_unauthorized();
    }
    let businesses = match params.get("name").map(String::as_str) {
        Some("Bestia") => json!([{"id": "bestia-los-angeles"}]),
        _ => json!([]),
    };
    Json(json!({"businesses": businesses})).into_response()
}

async fn handle_search(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !bearer_is(&headers, MOCK_DIRECTORY_KEY) {
        return yelp_unauthorized();
    }
    let businesses = match params.get("term").map(String::as_str) {
        Some("Bavel") => json!([{"id": "bavel-los-angeles"}]),
        _ => json!([]),
    };
    Json(json!({"businesses": businesses, "total": 0})).into_response()
}

async fn handle_details(headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !bearer_is(&headers, MOCK_DIRECTORY_KEY) {
        return yelp_unauthorized();
    }
    let details = match id.as_str() {
        "bestia-los-angeles" => json!({
            "id": id,
            "name": "Bestia",
            "price": "$$$",
            "categories": [{"alias": "italian", "title": "Italian"}],
            "rating": 4.5,
            "review_count": 5230,
            "url": "https://www.yelp.com/biz/bestia-los-angeles"
        }),
        "bavel-los-angeles" => json!({
            "id": id,
            "name": "Bavel",
            "price": "$$$",
            "categories": [{"alias": "mideastern", "title": "Middle Eastern"}],
            "rating": 4.5,
            "review_count": 1890,
            "url": "https://www.yelp.com/biz/bavel-los-angeles"
        }),
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": {"code": "BUSINESS_NOT_FOUND"}})),
            )
                .into_response()
        }
    };
    Json(details).into_response()
}
