//! Recommendation session handlers
//!
//! A session holds the selected restaurant and the last request so that
//! refinements can reuse them. Sessions live in memory and expire after 30
//! minutes of inactivity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{AppError, AppState, SuccessResponse};
use plate_core::{
    FormInput, PlaceSelection, Recommendation, RestaurantSelection, Session, SharedSession,
};

/// Session timeout (30 minutes of inactivity)
const SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct ManagedSession {
    session: SharedSession,
    last_activity: Instant,
}

impl ManagedSession {
    fn is_expired(&self) -> bool {
        self.last_activity.elapsed() > SESSION_TIMEOUT
    }
}

/// In-memory session manager
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, ManagedSession>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new session and return its ID
    pub async fn create_session(&self) -> String {
        let mut sessions = self.sessions.write().await;

        // Clean up expired sessions while we're here
        sessions.retain(|_, s| !s.is_expired());

        // Unique ID from timestamp + current session count
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_le_bytes());
        hasher.update(sessions.len().to_le_bytes());
        let hash = hasher.finalize();
        let session_id = format!("ses_{:x}", hash)[..20].to_string();

        sessions.insert(
            session_id.clone(),
            ManagedSession {
                session: SharedSession::default(),
                last_activity: Instant::now(),
            },
        );
        session_id
    }

    /// Get a live session, marking it active
    pub async fn get(&self, session_id: &str) -> Option<SharedSession> {
        let mut sessions = self.sessions.write().await;
        let managed = sessions.get_mut(session_id).filter(|s| !s.is_expired())?;
        managed.last_activity = Instant::now();
        Some(managed.session.clone())
    }

    /// Delete a session
    pub async fn delete_session(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id).is_some()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.values().filter(|s| !s.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Session as returned by the API
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    #[serde(flatten)]
    pub session: Session,
}

async fn find_session(state: &AppState, id: &str) -> Result<SharedSession, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::not_found("Session not found or expired"))
}

/// POST /api/sessions - Start a new session
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionInfo>, AppError> {
    let session_id = state.sessions.create_session().await;
    debug!(session_id = %session_id, "Created session");

    let session = find_session(&state, &session_id).await?.lock().await.clone();
    Ok(Json(SessionInfo {
        session_id,
        session,
    }))
}

/// GET /api/sessions/:id - Current session state
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, AppError> {
    let shared = find_session(&state, &id).await?;
    let session = shared.lock().await.clone();

    Ok(Json(SessionInfo {
        session_id: id,
        session,
    }))
}

/// DELETE /api/sessions/:id - End a session
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.sessions.delete_session(&id).await {
        return Err(AppError::not_found("Session not found or expired"));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/sessions/:id/restaurant - Select a restaurant from autocomplete
pub async fn select_restaurant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(place): Json<PlaceSelection>,
) -> Result<Json<RestaurantSelection>, AppError> {
    let shared = find_session(&state, &id).await?;
    let selection = place.into_selection().map_err(AppError::from_core)?;

    let mut session = shared.try_begin().map_err(AppError::from_core)?;
    session.select(selection.clone());
    info!(
        session_id = %id,
        restaurant = %selection.name,
        city = %selection.city,
        region = %selection.region,
        "Restaurant selected"
    );

    Ok(Json(selection))
}

/// POST /api/sessions/:id/recommendations - Submit the form
pub async fn submit_recommendations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(form): Json<FormInput>,
) -> Result<Json<Recommendation>, AppError> {
    let shared = find_session(&state, &id).await?;
    let mut session = shared.try_begin().map_err(AppError::from_core)?;

    let recommendation = state
        .recommender
        .submit(&mut session, &form)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(recommendation))
}

/// Request body for refining recommendations
#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    #[serde(default)]
    pub feedback: String,
}

/// POST /api/sessions/:id/refine - Regenerate with feedback
pub async fn refine_recommendations(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RefineRequest>,
) -> Result<Json<Recommendation>, AppError> {
    let shared = find_session(&state, &id).await?;
    let mut session = shared.try_begin().map_err(AppError::from_core)?;

    let recommendation = state
        .recommender
        .refine(&mut session, &req.feedback)
        .await
        .map_err(AppError::from_core)?;

    Ok(Json(recommendation))
}
