//! Per-user recommendation session
//!
//! A session remembers the selected restaurant and the last request so that
//! refinements can reuse them. Only one submission or refinement may run on a
//! session at a time; a second one is rejected rather than queued.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::models::{RequestSpec, RestaurantSelection};
use crate::recommender::Recommendation;
use crate::tax::TaxResolution;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub selection: Option<RestaurantSelection>,
    /// Request of the last submission, without refinement feedback
    pub last_request: Option<RequestSpec>,
    pub last_tax: Option<TaxResolution>,
    pub last_recommendation: Option<Recommendation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            selection: None,
            last_request: None,
            last_tax: None,
            last_recommendation: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Select a restaurant, discarding state tied to the previous one
    pub fn select(&mut self, selection: RestaurantSelection) {
        self.selection = Some(selection);
        self.last_request = None;
        self.last_tax = None;
        self.last_recommendation = None;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A session shared between concurrent callers
#[derive(Debug, Clone, Default)]
pub struct SharedSession(Arc<Mutex<Session>>);

impl SharedSession {
    pub fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Claim the session for one request, failing fast if it is in use
    pub fn try_begin(&self) -> Result<OwnedMutexGuard<Session>> {
        self.0.clone().try_lock_owned().map_err(|_| {
            Error::Busy("A request is already in progress for this session".into())
        })
    }

    /// Wait for the session (read-only views)
    pub async fn lock(&self) -> OwnedMutexGuard<Session> {
        self.0.clone().lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(name: &str) -> RestaurantSelection {
        RestaurantSelection {
            name: name.to_string(),
            address: None,
            street_address: None,
            place_id: None,
            city: "Chicago".to_string(),
            region: "IL".to_string(),
            location: None,
        }
    }

    #[test]
    fn test_select_resets_previous_request() {
        let mut session = Session::new();
        session.last_tax = Some(TaxResolution::region(6.25));
        session.select(selection("Alinea"));

        assert_eq!(session.selection.as_ref().unwrap().name, "Alinea");
        assert!(session.last_tax.is_none());
        assert!(session.updated_at >= session.created_at);
    }

    #[tokio::test]
    async fn test_second_request_is_busy() {
        let shared = SharedSession::default();
        let guard = shared.try_begin().unwrap();

        let err = shared.try_begin().unwrap_err();
        assert!(matches!(err, Error::Busy(_)));

        drop(guard);
        assert!(shared.try_begin().is_ok());
    }
}
