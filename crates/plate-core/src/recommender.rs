//! Recommendation pipeline
//!
//! submit: validate -> generation credential -> tax rate -> directory lookup
//! -> plan -> generate -> format. Validation and the credential check happen
//! before any other network call. Directory failures are absorbed; tax
//! resolution never fails; generation failures are returned to the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::{AIBackend, AIClient};
use crate::credentials::{credentials_from_env, Credential, CredentialSource};
use crate::directory::{
    BusinessDirectory, BusinessInfo, BusinessQuery, ProxyDirectory, YelpDirectory,
};
use crate::error::{Error, Result};
use crate::format::{check_total, format_recommendations, FormattedRecommendation};
use crate::geocode::{GoogleGeocoder, GOOGLE_MAPS_BASE_URL};
use crate::models::{FormInput, FormProfile, RequestSpec, ResolvedBudget, RestaurantSelection};
use crate::planner::{BudgetPlanner, Plan};
use crate::prompts::PromptLibrary;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::tax::{TaxRateTable, TaxResolution, TaxResolver};

/// One generated set of menu recommendations
#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub content: String,
    pub formatted: FormattedRecommendation,
    pub budget: ResolvedBudget,
    pub total_ceiling: f64,
    /// How far the generated total went over the ceiling, if it did
    pub over_budget: Option<f64>,
    pub tax: TaxResolution,
    pub business: Option<BusinessInfo>,
    pub feedback: Option<String>,
    pub model: String,
    pub prompt: String,
    pub generated_at: DateTime<Utc>,
}

/// A plan computed without calling the generation backend
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub request: RequestSpec,
    pub tax: TaxResolution,
    #[serde(flatten)]
    pub plan: Plan,
}

pub struct Recommender {
    ai: AIClient,
    credentials: Arc<dyn CredentialSource>,
    tax: TaxResolver,
    directory: Option<Arc<dyn BusinessDirectory>>,
    planner: BudgetPlanner,
    profile: FormProfile,
}

impl Recommender {
    pub fn new(
        ai: AIClient,
        credentials: Arc<dyn CredentialSource>,
        tax: TaxResolver,
        planner: BudgetPlanner,
    ) -> Self {
        Self {
            ai,
            credentials,
            tax,
            directory: None,
            planner,
            profile: FormProfile::default(),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn BusinessDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_profile(mut self, profile: FormProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Wire every collaborator from the environment
    ///
    /// With `PLATE_KEY_PROXY` set, credentials and directory lookups go through
    /// that server and fetching the places key is retried; a local environment
    /// lookup is attempted once.
    pub async fn from_env() -> Result<Self> {
        let credentials = credentials_from_env();
        let proxy = std::env::var("PLATE_KEY_PROXY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let table = Arc::new(TaxRateTable::load()?);
        let policy = if proxy.is_some() {
            RetryPolicy::collaborator_init()
        } else {
            RetryPolicy::once()
        };
        let tax = match GoogleGeocoder::connect(credentials.as_ref(), &policy, GOOGLE_MAPS_BASE_URL)
            .await
        {
            Ok(geocoder) => TaxResolver::with_geocoder(table, Arc::new(geocoder)),
            Err(e) => {
                warn!("County tax lookup disabled: {}", e);
                TaxResolver::new(table)
            }
        };

        let planner = BudgetPlanner::new(&mut PromptLibrary::new())?;
        debug!(version = planner.prompt_version(), "Menu prompt loaded");
        let mut recommender = Self::new(AIClient::from_env(), credentials.clone(), tax, planner);

        match proxy {
            Some(url) => {
                recommender = recommender.with_directory(Arc::new(ProxyDirectory::new(&url)));
            }
            None => match credentials.fetch(Credential::Directory).await {
                Some(key) => {
                    recommender = recommender.with_directory(Arc::new(YelpDirectory::new(&key)));
                }
                None => info!("No directory credential, prompts will omit listing details"),
            },
        }

        Ok(recommender)
    }

    pub fn ai(&self) -> &AIClient {
        &self.ai
    }

    pub fn tax_resolver(&self) -> &TaxResolver {
        &self.tax
    }

    pub fn directory(&self) -> Option<&Arc<dyn BusinessDirectory>> {
        self.directory.as_ref()
    }

    pub fn profile(&self) -> FormProfile {
        self.profile
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialSource> {
        &self.credentials
    }

    /// Live check of the generation backend using the current credential
    pub async fn generation_available(&self) -> bool {
        match self.credentials.fetch(Credential::Generation).await {
            Some(key) => self.ai.with_api_key(&key).health_check().await,
            None => false,
        }
    }

    /// Validate, resolve tax and plan without generating anything
    pub async fn preview(
        &self,
        selection: &RestaurantSelection,
        form: &FormInput,
    ) -> Result<Preview> {
        let request = RequestSpec::from_form(selection, form, &self.profile)?;
        let tax = self
            .tax
            .resolve(&request.restaurant.city, &request.restaurant.region)
            .await;
        let plan = self.planner.plan(&request, tax.rate, None);
        Ok(Preview { request, tax, plan })
    }

    /// Submit a form for the session's selected restaurant
    pub async fn submit(&self, session: &mut Session, form: &FormInput) -> Result<Recommendation> {
        let selection = session.selection.as_ref().ok_or_else(|| {
            Error::InvalidInput("Please select a restaurant from the suggestions list".into())
        })?;
        let request = RequestSpec::from_form(selection, form, &self.profile)?;
        let api_key = self.credentials.require(Credential::Generation).await?;

        let tax = self
            .tax
            .resolve(&request.restaurant.city, &request.restaurant.region)
            .await;
        info!(
            restaurant = %request.restaurant.name,
            tax_rate = tax.rate,
            tax_source = %tax.label,
            "Submitting recommendation request"
        );

        session.last_request = Some(request.clone());
        session.last_tax = Some(tax.clone());
        session.touch();

        let recommendation = self.generate(&request, tax, &api_key).await?;
        session.last_recommendation = Some(recommendation.clone());
        Ok(recommendation)
    }

    /// Regenerate the last request with free-text feedback
    pub async fn refine(&self, session: &mut Session, feedback: &str) -> Result<Recommendation> {
        if feedback.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Please enter feedback to refine the recommendations".into(),
            ));
        }
        let (Some(request), Some(tax)) = (session.last_request.as_ref(), session.last_tax.as_ref())
        else {
            return Err(Error::InvalidInput(
                "Submit a request before refining it".into(),
            ));
        };

        let request = request.with_feedback(feedback);
        let tax = tax.clone();
        let api_key = self.credentials.require(Credential::Generation).await?;
        debug!(feedback = %feedback.trim(), "Refining recommendations");

        let recommendation = self.generate(&request, tax, &api_key).await?;
        session.last_recommendation = Some(recommendation.clone());
        session.touch();
        Ok(recommendation)
    }

    /// Listing details for a selection; failures are logged and absorbed
    pub async fn lookup_business(&self, selection: &RestaurantSelection) -> Option<BusinessInfo> {
        let directory = self.directory.as_ref()?;
        match directory.lookup(&BusinessQuery::from(selection)).await {
            Ok(Some(info)) => Some(info),
            Ok(None) => {
                info!(restaurant = %selection.name, "Restaurant not found in directory");
                None
            }
            Err(e) => {
                warn!(restaurant = %selection.name, "Directory lookup failed: {}", e);
                None
            }
        }
    }

    async fn generate(
        &self,
        request: &RequestSpec,
        tax: TaxResolution,
        api_key: &str,
    ) -> Result<Recommendation> {
        let business = self.lookup_business(&request.restaurant).await;
        let plan = self.planner.plan(request, tax.rate, business.as_ref());

        let client = self.ai.with_api_key(api_key);
        let content = client.generate(&plan.prompt).await?;

        let over_budget = check_total(&content, plan.total_ceiling);
        let formatted = format_recommendations(&content);

        Ok(Recommendation {
            content,
            formatted,
            budget: plan.budget,
            total_ceiling: plan.total_ceiling,
            over_budget,
            tax,
            business,
            feedback: request.prior_feedback.clone(),
            model: client.model().to_string(),
            prompt: plan.prompt,
            generated_at: Utc::now(),
        })
    }
}
