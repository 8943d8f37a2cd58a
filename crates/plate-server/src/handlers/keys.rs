//! Key proxy handler
//!
//! Hands browser and CLI clients the keys they need without shipping them in
//! page source. The directory key never leaves the server.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{AppError, AppState};
use plate_core::Credential;

#[derive(Debug, Serialize)]
pub struct KeyResponse {
    pub key: String,
}

/// GET /api/keys/:name - Fetch a proxied credential
pub async fn get_key(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<KeyResponse>, AppError> {
    let credential = Credential::from_proxy_name(&name)
        .ok_or_else(|| AppError::not_found(&format!("Unknown key: {}", name)))?;

    match state.keys.fetch(credential).await {
        Some(key) => {
            debug!(credential = %name, "Serving proxied key");
            Ok(Json(KeyResponse { key }))
        }
        None => {
            warn!(credential = %name, "Requested key is not configured");
            Err(AppError::internal(&format!("{} API key not found", name)))
        }
    }
}
