//! Stateless lookup handlers: tax rate, business directory and plan preview

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{AppError, AppState};
use plate_core::{
    BusinessInfo, BusinessQuery, FormInput, Preview, RestaurantSelection, TaxResolution,
};

/// Request body for resolving a tax rate
#[derive(Debug, Deserialize)]
pub struct TaxRateRequest {
    pub city: String,
    #[serde(alias = "state")]
    pub region: String,
}

/// POST /api/tax-rate - Resolve the sales tax rate for a location
pub async fn resolve_tax_rate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaxRateRequest>,
) -> Result<Json<TaxResolution>, AppError> {
    if req.region.trim().is_empty() {
        return Err(AppError::bad_request("Region is required"));
    }

    let resolution = state
        .recommender
        .tax_resolver()
        .resolve(&req.city, &req.region)
        .await;

    Ok(Json(resolution))
}

/// POST /api/business - Look up directory details for a restaurant
pub async fn lookup_business(
    State(state): State<Arc<AppState>>,
    Json(query): Json<BusinessQuery>,
) -> Result<Json<BusinessInfo>, AppError> {
    if query.name.trim().is_empty() {
        return Err(AppError::bad_request("Restaurant name is required"));
    }

    let directory = state
        .recommender
        .directory()
        .ok_or_else(|| AppError::service_unavailable("Business directory is not configured"))?;

    match directory.lookup(&query).await {
        Ok(Some(info)) => Ok(Json(info)),
        Ok(None) => {
            info!(restaurant = %query.name, "No directory match");
            Err(AppError::not_found("Restaurant not found")
                .with_details(&format!("No directory match for {}", query.name)))
        }
        Err(e) => {
            warn!(restaurant = %query.name, "Directory lookup failed: {}", e);
            Err(AppError::bad_gateway("Failed to fetch restaurant data")
                .with_details(&e.to_string()))
        }
    }
}

/// Request body for a plan preview: restaurant fields inline with the form
#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    #[serde(flatten)]
    pub restaurant: RestaurantSelection,
    #[serde(flatten)]
    pub form: FormInput,
}

/// POST /api/plan - Resolve tax and budget and compose the prompt without generating
pub async fn preview_plan(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<Preview>, AppError> {
    let preview = state
        .recommender
        .preview(&req.restaurant, &req.form)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(preview))
}
