//! Plate Core Library
//!
//! Shared functionality for the Plate menu recommender:
//! - Request validation and budget planning (food spend back-calculated from
//!   totals that include sales tax and tip)
//! - Sales tax resolution by county, region or default rate
//! - Pluggable generation backends (OpenAI-compatible, mock)
//! - Geocoding and business directory collaborators
//! - Prompt library for customizable recommendation prompts
//! - Saved tax/tip favorites

pub mod ai;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod favorites;
pub mod format;
pub mod geocode;
pub mod models;
pub mod places;
pub mod planner;
pub mod prompts;
pub mod recommender;
pub mod retry;
pub mod session;
pub mod tax;

/// Test utilities including a mock collaborator server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, OpenAICompatibleBackend};
pub use credentials::{
    credentials_from_env, Credential, CredentialSource, EnvCredentials, ProxyCredentials,
    StaticCredentials,
};
pub use directory::{
    BusinessDirectory, BusinessInfo, BusinessQuery, MockDirectory, ProxyDirectory, YelpDirectory,
};
pub use error::{Error, Result};
pub use favorites::{FavoriteCombo, FavoritesStore};
pub use format::{format_recommendations, FormattedRecommendation, LineKind};
pub use geocode::{Geocoder, GoogleGeocoder, MockGeocoder};
pub use models::{
    Budget, BudgetMode, Course, FormInput, FormNumber, FormProfile, RequestSpec, ResolvedBudget,
    RestaurantSelection,
};
pub use places::PlaceSelection;
pub use planner::{BudgetPlanner, CourseQuota, Plan};
pub use prompts::{Prompt, PromptId, PromptLibrary};
pub use recommender::{Preview, Recommendation, Recommender};
pub use retry::RetryPolicy;
pub use session::{Session, SharedSession};
pub use tax::{RateSource, TaxRateTable, TaxResolution, TaxResolver};
