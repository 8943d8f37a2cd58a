//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use plate_core::AIBackend;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    /// Whether the generation backend answered a live check
    pub generation_available: bool,
    pub generation_host: String,
    pub model: String,
    pub county_lookup: bool,
    pub directory: bool,
}

/// GET /api/health - Backend availability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let ai = state.recommender.ai();

    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        generation_available: state.recommender.generation_available().await,
        generation_host: ai.host().to_string(),
        model: ai.model().to_string(),
        county_lookup: state.recommender.tax_resolver().has_geocoder(),
        directory: state.recommender.directory().is_some(),
    })
}
