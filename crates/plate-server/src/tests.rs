//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use plate_core::{
    AIClient, BudgetPlanner, BusinessInfo, Credential, MockBackend, MockDirectory, MockGeocoder,
    StaticCredentials, TaxRateTable, TaxResolver,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn keys() -> StaticCredentials {
    StaticCredentials::new().with(Credential::Generation, "sk-test")
}

fn recommender(backend: MockBackend, credentials: StaticCredentials) -> Recommender {
    let table = Arc::new(TaxRateTable::embedded().unwrap());
    let geocoder = MockGeocoder::new().with_county("Los Angeles, CA", "Los Angeles County");
    let directory = MockDirectory::new().with_business(
        "Bestia",
        BusinessInfo {
            id: Some("bestia-los-angeles".to_string()),
            name: Some("Bestia".to_string()),
            price: Some("$$$".to_string()),
            rating: Some(4.5),
            review_count: Some(5230),
            ..Default::default()
        },
    );

    Recommender::new(
        AIClient::Mock(backend),
        Arc::new(credentials),
        TaxResolver::with_geocoder(table, Arc::new(geocoder)),
        BudgetPlanner::embedded().unwrap(),
    )
    .with_directory(Arc::new(directory))
}

fn setup_test_app() -> Router {
    setup_app_with(MockBackend::new(), keys(), ServerConfig::default())
}

fn setup_app_with(
    backend: MockBackend,
    credentials: StaticCredentials,
    config: ServerConfig,
) -> Router {
    create_router(
        recommender(backend, credentials.clone()),
        Arc::new(credentials),
        None,
        config,
    )
}

async fn get_body_json(response: axum::response::Response) -> Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

fn bestia_place() -> Value {
    json!({
        "name": "Bestia",
        "formatted_address": "2121 E 7th Pl, Los Angeles, CA 90021, USA",
        "place_id": "ChIJbestia",
        "address_components": [
            { "long_name": "2121", "short_name": "2121", "types": ["street_number"] },
            { "long_name": "East 7th Place", "short_name": "E 7th Pl", "types": ["route"] },
            { "long_name": "Los Angeles", "short_name": "Los Angeles", "types": ["locality", "political"] },
            { "long_name": "Los Angeles County", "short_name": "Los Angeles County", "types": ["administrative_area_level_2", "political"] },
            { "long_name": "California", "short_name": "CA", "types": ["administrative_area_level_1", "political"] }
        ],
        "geometry": { "location": { "lat": 34.033, "lng": -118.229 } }
    })
}

fn form() -> Value {
    json!({
        "party_size": 4,
        "min_budget": 80,
        "max_budget": "$120",
        "include_tax": true,
        "tip_percent": 18,
        "family_style": true,
        "courses": ["appetizers", "entrees"],
        "preferences": ["vegetarian"]
    })
}

/// Create a session with Bestia selected, returning its ID
async fn session_with_selection(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(post_json("/api/sessions", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let id = get_body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/restaurant", id),
            &bestia_place(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    id
}

// ========== Health & Key Proxy ==========

#[tokio::test]
async fn test_health() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["generation_available"], true);
    assert_eq!(json["model"], "mock");
    assert_eq!(json["county_lookup"], true);
    assert_eq!(json["directory"], true);
}

#[tokio::test]
async fn test_health_reports_unhealthy_backend() {
    let app = setup_app_with(MockBackend::unhealthy(), keys(), ServerConfig::default());

    let response = app.oneshot(get("/api/health")).await.unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["generation_available"], false);
}

#[tokio::test]
async fn test_key_proxy() {
    let app = setup_test_app();

    let response = app.clone().oneshot(get("/api/keys/openai")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["key"], "sk-test");

    let response = app
        .clone()
        .oneshot(get("/api/keys/google-places"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        get_body_json(response).await["error"],
        "google-places API key not found"
    );
}

#[tokio::test]
async fn test_key_proxy_never_serves_directory_key() {
    let credentials = keys().with(Credential::Directory, "yelp-secret");
    let app = setup_app_with(MockBackend::new(), credentials, ServerConfig::default());

    let response = app.oneshot(get("/api/keys/yelp")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert!(!json.to_string().contains("yelp-secret"));
}

// ========== Tax & Business ==========

#[tokio::test]
async fn test_tax_rate_county() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/api/tax-rate",
            &json!({ "city": "Los Angeles", "region": "ca" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["rate"], 9.5);
    assert_eq!(json["source"]["kind"], "county");
    assert_eq!(json["label"], "Los Angeles County");
}

#[tokio::test]
async fn test_tax_rate_region_and_default() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/tax-rate",
            &json!({ "city": "Chicago", "state": "IL" }),
        ))
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["rate"], 6.25);
    assert_eq!(json["source"]["kind"], "region");

    let response = app
        .oneshot(post_json(
            "/api/tax-rate",
            &json!({ "city": "Toronto", "region": "ON" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["rate"], 9.5);
    assert_eq!(json["source"]["kind"], "default");
    assert_eq!(json["label"], "Tax rate not found");
}

#[tokio::test]
async fn test_tax_rate_requires_region() {
    let app = setup_test_app();

    let response = app
        .oneshot(post_json(
            "/api/tax-rate",
            &json!({ "city": "Chicago", "region": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_business_lookup() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/business",
            &json!({ "name": "Bestia", "address": "2121 East 7th Place", "city": "Los Angeles", "state": "CA" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["price"], "$$$");
    assert_eq!(json["review_count"], 5230);

    let response = app
        .oneshot(post_json(
            "/api/business",
            &json!({ "name": "Nowhere Diner", "city": "Los Angeles", "region": "CA" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = get_body_json(response).await;
    assert_eq!(json["error"], "Restaurant not found");
    assert!(json["details"].as_str().unwrap().contains("Nowhere Diner"));
}

#[tokio::test]
async fn test_business_lookup_unconfigured() {
    let recommender = Recommender::new(
        AIClient::mock(),
        Arc::new(keys()),
        TaxResolver::new(Arc::new(TaxRateTable::embedded().unwrap())),
        BudgetPlanner::embedded().unwrap(),
    );
    let app = create_router(recommender, Arc::new(keys()), None, ServerConfig::default());

    let response = app
        .oneshot(post_json("/api/business", &json!({ "name": "Bestia" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ========== Plan Preview ==========

#[tokio::test]
async fn test_plan_preview() {
    let backend = MockBackend::new();
    let app = setup_app_with(backend.clone(), keys(), ServerConfig::default());

    let mut body = form();
    body["name"] = json!("Bestia");
    body["city"] = json!("Los Angeles");
    body["region"] = json!("CA");

    let response = app.oneshot(post_json("/api/plan", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["tax"]["rate"], 9.5);
    assert_eq!(json["total_ceiling"], 120.0);
    assert_eq!(json["budget"]["total_spend_max"], 120.0);
    assert_eq!(json["request"]["party_size"], 4);
    assert!(json["prompt"].as_str().unwrap().contains("vegetarian"));
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_plan_rejects_bad_budget() {
    let app = setup_test_app();

    let body = json!({
        "name": "Bestia",
        "city": "Los Angeles",
        "region": "CA",
        "min_budget": 50,
        "max_budget": 0
    });
    let response = app.oneshot(post_json("/api/plan", &body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await["error"],
        "The maximum budget must be greater than zero"
    );
}

// ========== Sessions ==========

#[tokio::test]
async fn test_session_submit_and_refine() {
    let backend = MockBackend::new();
    let app = setup_app_with(backend.clone(), keys(), ServerConfig::default());
    let id = session_with_selection(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/recommendations", id),
            &form(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["tax"]["rate"], 9.5);
    assert_eq!(json["business"]["price"], "$$$");
    assert_eq!(json["formatted"]["total"], 81.6);
    assert!(json["over_budget"].is_null());
    assert!(json["content"].as_str().unwrap().contains("Cost Breakdown"));

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/refine", id),
            &json!({ "feedback": "lighter dishes" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["feedback"], "lighter dishes");
    assert!(backend
        .last_prompt()
        .unwrap()
        .contains("Additional feedback: lighter dishes"));

    let response = app
        .oneshot(get(&format!("/api/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["session_id"], id.as_str());
    assert_eq!(json["selection"]["street_address"], "2121 East 7th Place");
    assert_eq!(json["last_recommendation"]["feedback"], "lighter dishes");
}

#[tokio::test]
async fn test_select_requires_geometry() {
    let app = setup_test_app();
    let id = session_with_selection(&app).await;

    let mut place = bestia_place();
    place.as_object_mut().unwrap().remove("geometry");

    let response = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/restaurant", id),
            &place,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await["error"],
        "No place geometry found"
    );
}

#[tokio::test]
async fn test_create_session_returns_stored_state() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(post_json("/api/sessions", &json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let created = get_body_json(response).await;
    let id = created["session_id"].as_str().unwrap();

    let response = app
        .oneshot(get(&format!("/api/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stored = get_body_json(response).await;
    assert_eq!(created["created_at"], stored["created_at"]);
    assert!(created["selection"].is_null());
}

#[tokio::test]
async fn test_submit_without_selection() {
    let backend = MockBackend::new();
    let app = setup_app_with(backend.clone(), keys(), ServerConfig::default());

    let response = app
        .clone()
        .oneshot(post_json("/api/sessions", &json!({})))
        .await
        .unwrap();
    let id = get_body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/recommendations", id),
            &form(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await["error"],
        "Please select a restaurant from the suggestions list"
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn test_submit_without_generation_key() {
    let app = setup_app_with(
        MockBackend::new(),
        StaticCredentials::new(),
        ServerConfig::default(),
    );
    let id = session_with_selection(&app).await;

    let response = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/recommendations", id),
            &form(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        get_body_json(response).await["error"],
        "Please configure your OpenAI API key first"
    );
}

#[tokio::test]
async fn test_generation_failure_is_bad_gateway() {
    let app = setup_app_with(
        MockBackend::failing("Incorrect API key provided"),
        keys(),
        ServerConfig::default(),
    );
    let id = session_with_selection(&app).await;

    let response = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/recommendations", id),
            &form(),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        get_body_json(response).await["error"],
        "Failed to get recommendations: API Error: Incorrect API key provided"
    );
}

#[tokio::test]
async fn test_refine_validation() {
    let app = setup_test_app();
    let id = session_with_selection(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/sessions/{}/refine", id),
            &json!({ "feedback": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json(
            &format!("/api/sessions/{}/refine", id),
            &json!({ "feedback": "more dessert" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get_body_json(response).await["error"],
        "Submit a request before refining it"
    );
}

#[tokio::test]
async fn test_unknown_and_deleted_sessions() {
    let app = setup_test_app();

    let response = app
        .clone()
        .oneshot(get("/api/sessions/ses_missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let id = session_with_selection(&app).await;
    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/api/sessions/{}", id))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(get_body_json(response).await["success"], true);

    let response = app
        .oneshot(get(&format!("/api/sessions/{}", id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_manager() {
    let manager = SessionManager::new();
    assert!(manager.is_empty().await);

    let a = manager.create_session().await;
    let b = manager.create_session().await;
    assert_ne!(a, b);
    assert!(a.starts_with("ses_"));
    assert_eq!(manager.len().await, 2);

    let shared = manager.get(&a).await.unwrap();
    let _guard = shared.try_begin().unwrap();
    // The same session fetched again is still claimed
    let again = manager.get(&a).await.unwrap();
    assert!(again.try_begin().is_err());

    assert!(manager.delete_session(&b).await);
    assert!(!manager.delete_session(&b).await);
    assert!(manager.get(&b).await.is_none());
}

// ========== Errors ==========

#[test]
fn test_core_error_status_mapping() {
    use plate_core::Error;

    let cases = [
        (Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
        (
            Error::CredentialUnavailable("x".into()),
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        (Error::Generation("x".into()), StatusCode::BAD_GATEWAY),
        (Error::Busy("x".into()), StatusCode::CONFLICT),
        (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
        (
            Error::InvalidData("x".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];
    for (err, status) in cases {
        assert_eq!(AppError::from_core(err).status(), status);
    }
}

#[tokio::test]
async fn test_internal_errors_are_sanitized() {
    let err = AppError::from_core(plate_core::Error::InvalidData("secret path".into()));
    let json = get_body_json(err.into_response()).await;
    assert_eq!(json["error"], "An internal error occurred");
}

// ========== Auth & Middleware ==========

#[tokio::test]
async fn test_api_key_auth() {
    let config = ServerConfig {
        require_auth: true,
        api_keys: vec!["server-key".to_string()],
        ..Default::default()
    };
    let app = setup_app_with(MockBackend::new(), keys(), config);

    let response = app.clone().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/api/health")
        .header("authorization", "Bearer server-kez")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .uri("/api/health")
        .header("authorization", "Bearer server-key")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(right).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers() {
    let app = setup_test_app();

    let response = app.oneshot(get("/api/health")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("content-security-policy"));
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["alpha".to_string(), "beta-key".to_string()];
    assert!(validate_api_key("alpha", &keys));
    assert!(validate_api_key("beta-key", &keys));
    assert!(!validate_api_key("alph", &keys));
    assert!(!validate_api_key("", &keys));
    assert!(!validate_api_key("alpha", &[]));
}

#[test]
fn test_parse_list() {
    assert_eq!(
        parse_list(" https://a.example , ,https://b.example"),
        vec!["https://a.example", "https://b.example"]
    );
    assert!(parse_list("").is_empty());
}
