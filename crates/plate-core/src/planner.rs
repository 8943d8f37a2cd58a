//! Budget planning and prompt composition
//!
//! Turns a validated [`RequestSpec`] and a resolved tax rate into food-spend
//! targets and the natural-language request sent to the generation backend.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::directory::BusinessInfo;
use crate::error::Result;
use crate::models::{Budget, Course, RequestSpec, ResolvedBudget};
use crate::prompts::{Prompt, PromptId, PromptLibrary};

const NOT_AVAILABLE: &str = "Not available";

/// Marker used when the request names no courses
pub const NO_COURSE_PREFERENCE: &str = "No specific course preference";

/// Round to whole cents
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Pre-tax, pre-tip amount whose total with tax and tip equals `total`
pub fn back_calculate(total: f64, tax_rate: f64, tip_percent: u8) -> f64 {
    let multiplier = (1.0 + tax_rate / 100.0) * (1.0 + f64::from(tip_percent) / 100.0);
    round_cents(total / multiplier)
}

/// Food-spend targets for a request at the given tax rate
pub fn resolve_budget(request: &RequestSpec, tax_rate: f64) -> ResolvedBudget {
    let food = |amount: f64| {
        if request.include_tax {
            back_calculate(amount, tax_rate, request.tip_percent)
        } else {
            round_cents(amount)
        }
    };

    ResolvedBudget {
        food_spend_min: request.budget.min().map(food),
        food_spend_max: food(request.budget.max()),
        total_spend_min: request.budget.min(),
        total_spend_max: request.budget.max(),
    }
}

/// How many distinct shared dishes to suggest for a course
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseQuota {
    pub factor: f64,
    pub lower: u32,
    pub upper: u32,
}

impl CourseQuota {
    /// `clamp(ceil(party * factor), lower, upper)`
    pub fn count(&self, party_size: u32) -> u32 {
        let raw = (f64::from(party_size) * self.factor).ceil();
        (raw.min(f64::from(self.upper)) as u32).clamp(self.lower, self.upper)
    }

    /// Family-style quota for a course; drinks are ordered per person
    pub fn for_course(course: Course) -> Option<Self> {
        let (factor, lower, upper) = match course {
            Course::Appetizers => (0.7, 3, 5),
            Course::Entrees => (0.6, 3, 5),
            Course::Sides => (0.5, 2, 4),
            Course::Desserts => (0.4, 2, 3),
            Course::Drinks => return None,
        };
        Some(Self {
            factor,
            lower,
            upper,
        })
    }
}

/// Result of planning one submission or refinement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub budget: ResolvedBudget,
    /// Most the grand total (food + tax + tip) may reach
    pub total_ceiling: f64,
    pub prompt: String,
}

/// Composes menu recommendation prompts
#[derive(Debug, Clone)]
pub struct BudgetPlanner {
    prompt: Prompt,
}

impl BudgetPlanner {
    /// Planner using the library's menu recommendation prompt
    pub fn new(library: &mut PromptLibrary) -> Result<Self> {
        let prompt = library.get(PromptId::MenuRecommendation)?.clone();
        Ok(Self { prompt })
    }

    /// Planner using the compiled-in prompt only
    pub fn embedded() -> Result<Self> {
        Self::new(&mut PromptLibrary::embedded_only())
    }

    pub fn prompt_version(&self) -> u32 {
        self.prompt.metadata.version
    }

    /// Build spend targets and the prompt for a request
    pub fn plan(
        &self,
        request: &RequestSpec,
        tax_rate: f64,
        business: Option<&BusinessInfo>,
    ) -> Plan {
        let budget = resolve_budget(request, tax_rate);
        let total_ceiling = if request.include_tax {
            budget.total_spend_max
        } else {
            round_cents(
                budget.food_spend_max
                    * (1.0 + tax_rate / 100.0)
                    * (1.0 + f64::from(request.tip_percent) / 100.0),
            )
        };

        let vars = template_vars(request, tax_rate, &budget, business);
        let user = self.prompt.render_user(&vars);
        let prompt = match self.prompt.system_section() {
            Some(system) => format!("{}\n\n{}", system, user),
            None => user,
        };

        tracing::debug!(
            party_size = request.party_size,
            food_max = budget.food_spend_max,
            family_style = request.family_style,
            courses = request.courses.len(),
            "Planned menu request"
        );

        Plan {
            budget,
            total_ceiling,
            prompt,
        }
    }
}

fn template_vars(
    request: &RequestSpec,
    tax_rate: f64,
    budget: &ResolvedBudget,
    business: Option<&BusinessInfo>,
) -> HashMap<&'static str, String> {
    let restaurant = &request.restaurant;
    let price = business.and_then(|b| b.price.clone());
    let categories = business.and_then(BusinessInfo::category_titles);
    let rating = business.and_then(|b| {
        b.rating
            .map(|r| format!("{} ({} reviews)", r, b.review_count.unwrap_or(0)))
    });
    let listing_url = business.and_then(|b| b.url.clone());

    let mut vars = HashMap::new();
    vars.insert("restaurant", restaurant.name.clone());
    vars.insert("address", or_not_available(restaurant.address.clone()));
    vars.insert("city", or_not_available(non_blank(&restaurant.city)));
    vars.insert(
        "region",
        or_not_available(non_blank(&restaurant.region.to_uppercase())),
    );
    vars.insert("price_hint", price.clone().unwrap_or_else(|| "unknown".into()));
    vars.insert(
        "cuisine_hint",
        categories.clone().unwrap_or_else(|| "unknown".into()),
    );
    vars.insert("price", or_not_available(price));
    vars.insert("categories", or_not_available(categories));
    vars.insert("rating", or_not_available(rating));
    vars.insert("listing_url", or_not_available(listing_url));
    vars.insert("party_size", request.party_size.to_string());
    vars.insert("budget_directive", budget_directive(request, tax_rate, budget));
    vars.insert("courses_directive", courses_directive(request));
    vars.insert("dietary", join(request.dietary.iter().map(String::as_str)));
    vars.insert("additional", request.additional_notes.clone());
    vars.insert("feedback", request.prior_feedback.clone().unwrap_or_default());
    vars.insert("serving_directive", serving_directive(request));
    vars.insert("course_rule", course_rule(request));
    vars.insert("portion_rule", portion_rule(request));
    vars.insert("tax_rate", format_percent(tax_rate));
    vars.insert("tip_percent", request.tip_percent.to_string());
    vars.insert("food_max", format!("{:.2}", budget.food_spend_max));
    vars.insert("ceiling_directive", ceiling_directive(request, budget));
    vars
}

fn budget_directive(request: &RequestSpec, tax_rate: f64, budget: &ResolvedBudget) -> String {
    let included = format!(
        "including {}% sales tax and {}% tip",
        format_percent(tax_rate),
        request.tip_percent
    );
    match (request.budget, request.include_tax) {
        (Budget::Range { min, max }, true) => format!(
            "- Total budget range ({}): ${:.2} - ${:.2}\n  (This means the food total should be between ${:.2} and ${:.2} before tax and tip)",
            included,
            min,
            max,
            budget.food_spend_min.unwrap_or(budget.food_spend_max),
            budget.food_spend_max
        ),
        (Budget::Ceiling { max }, true) => format!(
            "- Total budget ({}): up to ${:.2}\n  (This means the food total should be at most ${:.2} before tax and tip)",
            included, max, budget.food_spend_max
        ),
        (Budget::Range { .. }, false) => format!(
            "- Budget range for food (before tax and tip): ${:.2} - ${:.2}",
            budget.food_spend_min.unwrap_or(budget.food_spend_max),
            budget.food_spend_max
        ),
        (Budget::Ceiling { .. }, false) => format!(
            "- Budget for food (before tax and tip): up to ${:.2}",
            budget.food_spend_max
        ),
    }
}

fn courses_directive(request: &RequestSpec) -> String {
    if request.courses.is_empty() {
        format!("- {}", NO_COURSE_PREFERENCE)
    } else {
        format!(
            "- Requested courses: {}",
            join(request.courses.iter().map(Course::as_str))
        )
    }
}

fn serving_directive(request: &RequestSpec) -> String {
    if !request.family_style {
        return "Please recommend individual dishes for each person, aiming to get as close to \
                the maximum budget as possible while staying within range. Ensure everyone gets \
                their requested courses."
            .to_string();
    }

    let mut lines = vec![format!(
        "For a group of {} people sharing family style:",
        request.party_size
    )];
    // Per-course counts only make sense for courses the user asked for
    for course in &request.courses {
        match CourseQuota::for_course(*course) {
            Some(quota) => lines.push(format!(
                "- Recommend {} different {} that can be shared",
                quota.count(request.party_size),
                course
            )),
            None => lines.push(format!("- Suggest {} ordered per person", course)),
        }
    }
    lines.push(
        "- Ensure dishes complement each other and provide a variety of flavors and ingredients"
            .to_string(),
    );
    lines.push("- Each dish should serve 2-4 people on average".to_string());
    lines.push(
        "- Include a mix of proteins, vegetables, and starches across the selections".to_string(),
    );
    lines.join("\n")
}

fn course_rule(request: &RequestSpec) -> String {
    if request.courses.is_empty() {
        "Choose a balanced selection of dishes that suits the restaurant".to_string()
    } else {
        format!(
            "Only include courses that were specifically requested ({})",
            join(request.courses.iter().map(Course::as_str))
        )
    }
}

fn portion_rule(request: &RequestSpec) -> String {
    if request.family_style {
        "Recommended serving size (how many people it typically serves) and the suggested \
         number of orders for the group"
            .to_string()
    } else {
        "Whether it is an individual portion".to_string()
    }
}

fn ceiling_directive(request: &RequestSpec, budget: &ResolvedBudget) -> String {
    match (request.budget, request.include_tax) {
        (Budget::Range { min, max }, true) => format!(
            "Ensure the total cost including tax and tip stays within the ${:.2} - ${:.2} range.",
            min, max
        ),
        (Budget::Ceiling { max }, true) => format!(
            "Ensure the total cost including tax and tip does not exceed ${:.2}.",
            max
        ),
        (_, false) => format!(
            "Ensure the food subtotal does not exceed ${:.2}; tax and tip are added on top of it.",
            budget.food_spend_max
        ),
    }
}

/// `7.25` -> "7.25", `9.5` -> "9.5", `6.0` -> "6"
pub fn format_percent(rate: f64) -> String {
    let formatted = format!("{:.3}", rate);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn or_not_available(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}
