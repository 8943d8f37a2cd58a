//! Integration tests for plate-core
//!
//! These tests exercise the select → submit → refine workflow against the
//! in-memory collaborators.

use std::sync::Arc;

use plate_core::{
    AIClient, BudgetPlanner, Credential, Error, FavoritesStore, FormInput, FormNumber,
    FormProfile, MockBackend, MockDirectory, MockGeocoder, PlaceSelection, RateSource,
    Recommender, Session, SharedSession, StaticCredentials, TaxRateTable, TaxResolver,
};
use plate_core::models::{BudgetMode, LatLng};
use plate_core::places::{AddressComponent, PlaceGeometry};

/// Autocomplete payload for a restaurant in Chicago
fn chicago_place() -> PlaceSelection {
    let component = |long: &str, short: &str, kind: &str| AddressComponent {
        long_name: long.to_string(),
        short_name: short.to_string(),
        types: vec![kind.to_string(), "political".to_string()],
    };
    PlaceSelection {
        name: "Girl & the Goat".to_string(),
        formatted_address: Some("809 W Randolph St, Chicago, IL 60607, USA".to_string()),
        place_id: Some("ChIJgoat".to_string()),
        address_components: vec![
            component("809", "809", "street_number"),
            component("West Randolph Street", "W Randolph St", "route"),
            component("Chicago", "Chicago", "locality"),
            component("Cook County", "Cook County", "administrative_area_level_2"),
            component("Illinois", "IL", "administrative_area_level_1"),
        ],
        geometry: Some(PlaceGeometry {
            location: LatLng {
                lat: 41.88,
                lng: -87.65,
            },
        }),
    }
}

struct Harness {
    recommender: Recommender,
    backend: MockBackend,
    geocoder: MockGeocoder,
    directory: MockDirectory,
}

fn harness(credentials: StaticCredentials) -> Harness {
    let backend = MockBackend::new();
    let geocoder = MockGeocoder::new().with_county("Chicago, IL", "Cook County");
    let directory = MockDirectory::new();
    let table = Arc::new(TaxRateTable::embedded().expect("embedded table"));

    let recommender = Recommender::new(
        AIClient::Mock(backend.clone()),
        Arc::new(credentials),
        TaxResolver::with_geocoder(table, Arc::new(geocoder.clone())),
        BudgetPlanner::embedded().expect("embedded prompt"),
    )
    .with_directory(Arc::new(directory.clone()));

    Harness {
        recommender,
        backend,
        geocoder,
        directory,
    }
}

fn keyed() -> StaticCredentials {
    StaticCredentials::new().with(Credential::Generation, "sk-test")
}

fn range_form(min: f64, max: f64) -> FormInput {
    FormInput {
        party_size: Some(FormNumber::Number(2.0)),
        min_budget: Some(FormNumber::Number(min)),
        max_budget: Some(FormNumber::Number(max)),
        include_tax: true,
        tip_percent: Some(FormNumber::Text("20".to_string())),
        family_style: true,
        courses: vec!["appetizers".to_string(), "entrees".to_string()],
        ..Default::default()
    }
}

// =============================================================================
// Workflow
// =============================================================================

#[tokio::test]
async fn test_select_submit_refine() {
    let h = harness(keyed());
    let mut session = Session::new();
    session.select(chicago_place().into_selection().unwrap());

    let first = h
        .recommender
        .submit(&mut session, &range_form(60.0, 100.0))
        .await
        .unwrap();

    assert_eq!(
        first.tax.source,
        RateSource::County {
            county: "Cook".to_string()
        }
    );
    assert_eq!(first.tax.rate, 10.25);
    assert_eq!(first.total_ceiling, 100.0);
    assert!(first.budget.food_spend_max < 100.0);
    assert!(first.prompt.contains("Girl & the Goat"));
    assert!(first.prompt.contains("Recommend 3 different appetizers"));

    let refined = h
        .recommender
        .refine(&mut session, "no shellfish please")
        .await
        .unwrap();

    assert_eq!(refined.tax, first.tax);
    assert_eq!(refined.budget, first.budget);
    assert_eq!(h.backend.calls(), 2);
    assert_eq!(h.geocoder.calls(), 1);
    assert_eq!(h.directory.calls(), 2);
}

#[tokio::test]
async fn test_nothing_leaves_without_selection() {
    let h = harness(keyed());
    let mut session = Session::new();

    let err = h
        .recommender
        .submit(&mut session, &range_form(60.0, 100.0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.geocoder.calls(), 0);
    assert_eq!(h.directory.calls(), 0);
}

#[tokio::test]
async fn test_missing_generation_key() {
    let h = harness(StaticCredentials::new().with(Credential::Places, "places"));
    let mut session = Session::new();
    session.select(chicago_place().into_selection().unwrap());

    let err = h
        .recommender
        .submit(&mut session, &range_form(60.0, 100.0))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CredentialUnavailable(_)));
    assert_eq!(h.backend.calls(), 0);
    assert_eq!(h.geocoder.calls(), 0);
}

#[tokio::test]
async fn test_reversed_range_rejected() {
    let h = harness(keyed());
    let mut session = Session::new();
    session.select(chicago_place().into_selection().unwrap());

    let err = h
        .recommender
        .submit(&mut session, &range_form(100.0, 60.0))
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Maximum budget ($60.00) must be at least the minimum budget ($100.00)"
    );
    assert!(session.last_request.is_none());
}

#[tokio::test]
async fn test_single_budget_profile() {
    let h = harness(keyed());
    let recommender = h.recommender.with_profile(FormProfile {
        course_selection: false,
        budget_mode: BudgetMode::Single,
        family_style: false,
    });
    let selection = chicago_place().into_selection().unwrap();
    let form = FormInput {
        budget: Some(FormNumber::Text("$150".to_string())),
        courses: vec!["desserts".to_string()],
        family_style: true,
        ..Default::default()
    };

    let preview = recommender.preview(&selection, &form).await.unwrap();

    assert!(preview.request.courses.is_empty());
    assert!(!preview.request.family_style);
    assert_eq!(preview.request.tip_percent, 18);
    assert_eq!(preview.plan.budget.food_spend_min, None);
    assert_eq!(preview.plan.budget.food_spend_max, 150.0);
    assert!(preview.plan.total_ceiling > 150.0);
}

#[tokio::test]
async fn test_unknown_county_uses_region_rate() {
    let h = harness(keyed());
    let mut place = chicago_place();
    for component in &mut place.address_components {
        if component.long_name == "Chicago" {
            component.long_name = "Springfield".to_string();
        }
    }
    let selection = place.into_selection().unwrap();

    let preview = h
        .recommender
        .preview(&selection, &range_form(40.0, 80.0))
        .await
        .unwrap();

    assert_eq!(preview.tax.source, RateSource::Region);
    assert_eq!(preview.tax.rate, 6.25);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_concurrent_submission_is_busy() {
    let h = harness(keyed());
    let shared = SharedSession::default();
    shared
        .lock()
        .await
        .select(chicago_place().into_selection().unwrap());

    let mut guard = shared.try_begin().unwrap();
    assert!(matches!(shared.try_begin(), Err(Error::Busy(_))));

    h.recommender
        .submit(&mut guard, &range_form(60.0, 100.0))
        .await
        .unwrap();
    drop(guard);

    assert!(shared.lock().await.last_recommendation.is_some());
}

// =============================================================================
// Favorites
// =============================================================================

#[test]
fn test_favorite_applies_tip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("favorites.json");

    let mut store = FavoritesStore::open(&path).unwrap();
    assert!(store.add(10.25, 22).unwrap());
    assert!(!store.add(10.25, 22).unwrap());

    let reopened = FavoritesStore::open(&path).unwrap();
    let favorite = reopened.get(0).unwrap();
    let form = FormInput {
        tip_percent: Some(FormNumber::Number(f64::from(favorite.tip))),
        ..range_form(50.0, 90.0)
    };
    assert_eq!(form.tip_percent, Some(FormNumber::Number(22.0)));
}
