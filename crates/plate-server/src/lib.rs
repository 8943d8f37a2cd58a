//! Plate Web Server
//!
//! Axum-based REST API for the Plate menu recommender.
//!
//! Security features:
//! - Optional bearer API-key authentication (constant-time comparison)
//! - Restrictive CORS policy
//! - Security headers on every response
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::CorsLayer, services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, warn};

use plate_core::{AIBackend, CredentialSource, Recommender};

mod handlers;

pub use handlers::SessionManager;

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Whether requests must carry a valid API key
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Accepted API keys, sent as "Bearer <key>" in the Authorization header
    pub api_keys: Vec<String>,
}

impl ServerConfig {
    /// Configuration from `PLATE_API_KEYS` and `PLATE_ALLOWED_ORIGINS`
    ///
    /// Authentication is required whenever at least one API key is set.
    pub fn from_env() -> Self {
        let api_keys = parse_list(&std::env::var("PLATE_API_KEYS").unwrap_or_default());
        let allowed_origins =
            parse_list(&std::env::var("PLATE_ALLOWED_ORIGINS").unwrap_or_default());
        Self {
            require_auth: !api_keys.is_empty(),
            allowed_origins,
            api_keys,
        }
    }
}

/// Split a comma-separated list, dropping blank entries
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shared application state
pub struct AppState {
    pub recommender: Recommender,
    /// Credentials handed out by the key proxy endpoint
    pub keys: Arc<dyn CredentialSource>,
    pub sessions: SessionManager,
    pub config: ServerConfig,
}

/// Authentication middleware - validates the bearer API key
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        tracing::debug!(path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && bool::from(provided_bytes.ct_eq(key_bytes))
        {
            return true;
        }
    }
    false
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(
    recommender: Recommender,
    keys: Arc<dyn CredentialSource>,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> Router {
    info!(
        "Generation backend: {} (model: {})",
        recommender.ai().host(),
        recommender.ai().model()
    );
    if !recommender.tax_resolver().has_geocoder() {
        info!("County tax lookup not configured, using region rates");
    }
    if recommender.directory().is_none() {
        info!("Business directory not configured");
    }

    let state = Arc::new(AppState {
        recommender,
        keys,
        sessions: SessionManager::new(),
        config: config.clone(),
    });

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        // Key proxy
        .route("/keys/:name", get(handlers::get_key))
        // Stateless lookups
        .route("/tax-rate", post(handlers::resolve_tax_rate))
        .route("/business", post(handlers::lookup_business))
        .route("/plan", post(handlers::preview_plan))
        // Sessions
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:id",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/sessions/:id/restaurant", post(handlers::select_restaurant))
        .route(
            "/sessions/:id/recommendations",
            post(handlers::submit_recommendations),
        )
        .route("/sessions/:id/refine", post(handlers::refine_recommendations));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        // Allow specified origins
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    // CSP: scripts from same origin; the page loads the places autocomplete widget
    let csp_value = HeaderValue::from_static(
        "default-src 'self'; script-src 'self' https://maps.googleapis.com; style-src 'self' 'unsafe-inline'; img-src 'self' data: https://maps.gstatic.com; connect-src 'self' https://maps.googleapis.com; frame-ancestors 'none'"
    );

    let mut app = Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CONTENT_SECURITY_POLICY,
            csp_value,
        ));

    // Serve the form page if a directory is provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app
}

/// Start the server
pub async fn serve_with_config(
    recommender: Recommender,
    keys: Arc<dyn CredentialSource>,
    host: &str,
    port: u16,
    static_dir: Option<&str>,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("Authentication disabled (set PLATE_API_KEYS to require an API key)");
    }

    check_ai_connection(&recommender).await;

    let app = create_router(recommender, keys, static_dir, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log generation backend connection status
async fn check_ai_connection(recommender: &Recommender) {
    let client = recommender.ai();
    if recommender.generation_available().await {
        info!(
            "Generation backend reachable: {} (model: {})",
            client.host(),
            client.model()
        );
    } else {
        warn!(
            "Generation backend not responding: {} (model: {})",
            client.host(),
            client.model()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    details: Option<String>,
    internal: Option<anyhow::Error>,
}

impl AppError {
    fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            status,
            message: msg.to_string(),
            details: None,
            internal: None,
        }
    }

    pub fn bad_request(msg: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn not_found(msg: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: &str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn conflict(msg: &str) -> Self {
        Self::new(StatusCode::CONFLICT, msg)
    }

    pub fn service_unavailable(msg: &str) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, msg)
    }

    pub fn bad_gateway(msg: &str) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, msg)
    }

    /// Attach a human-readable detail string to the response body
    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map a core error to its HTTP status
    ///
    /// User-facing errors keep their message; everything else is logged and
    /// replaced by a generic one.
    pub fn from_core(err: plate_core::Error) -> Self {
        use plate_core::Error;

        let message = err.to_string();
        match err {
            Error::InvalidInput(_) => Self::bad_request(&message),
            Error::CredentialUnavailable(_) => Self::service_unavailable(&message),
            Error::Generation(_) | Error::Timeout(_) => Self::bad_gateway(&message),
            Error::Busy(_) => Self::conflict(&message),
            Error::NotFound(_) => Self::not_found(&message),
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = match self.details {
            Some(details) => Json(serde_json::json!({
                "error": self.message,
                "details": details
            })),
            None => Json(serde_json::json!({
                "error": self.message
            })),
        };

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            details: None,
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
