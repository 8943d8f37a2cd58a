//! Data models for menu recommendation requests

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tip percentage used when the form does not carry one
pub const DEFAULT_TIP_PERCENT: u8 = 18;

/// Course tags a request can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Course {
    Appetizers,
    Entrees,
    Sides,
    Desserts,
    Drinks,
}

impl Course {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appetizers => "appetizers",
            Self::Entrees => "entrees",
            Self::Sides => "sides",
            Self::Desserts => "desserts",
            Self::Drinks => "drinks",
        }
    }

    /// All courses in menu order
    pub fn all() -> &'static [Course] {
        &[
            Self::Appetizers,
            Self::Entrees,
            Self::Sides,
            Self::Desserts,
            Self::Drinks,
        ]
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Course {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "appetizer" | "appetizers" | "starter" | "starters" => Ok(Self::Appetizers),
            "entree" | "entrees" | "main" | "mains" => Ok(Self::Entrees),
            "side" | "sides" => Ok(Self::Sides),
            "dessert" | "desserts" => Ok(Self::Desserts),
            "drink" | "drinks" | "beverage" | "beverages" => Ok(Self::Drinks),
            other => Err(format!("Unknown course: {}", other)),
        }
    }
}

/// How the budget fields of the form are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetMode {
    /// Separate minimum and maximum fields
    #[default]
    Range,
    /// One budget field, treated as a ceiling
    Single,
}

/// Which optional form fields are active
///
/// Every form variant goes through the same pipeline; fields that are
/// switched off here are ignored even if the submission carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormProfile {
    pub course_selection: bool,
    pub budget_mode: BudgetMode,
    pub family_style: bool,
}

impl Default for FormProfile {
    fn default() -> Self {
        Self {
            course_selection: true,
            budget_mode: BudgetMode::Range,
            family_style: true,
        }
    }
}

/// Budget as the user stated it (before any tax/tip adjustment)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Budget {
    Range { min: f64, max: f64 },
    Ceiling { max: f64 },
}

impl Budget {
    pub fn min(&self) -> Option<f64> {
        match self {
            Budget::Range { min, .. } => Some(*min),
            Budget::Ceiling { .. } => None,
        }
    }

    pub fn max(&self) -> f64 {
        match self {
            Budget::Range { max, .. } | Budget::Ceiling { max } => *max,
        }
    }
}

/// A numeric form field, submitted either as a JSON number or as text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormNumber {
    Number(f64),
    Text(String),
}

impl FormNumber {
    /// Parse the field, accepting a leading `$` on text values
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            FormNumber::Number(n) => *n,
            FormNumber::Text(s) => {
                let s = s.trim();
                s.strip_prefix('$').unwrap_or(s).trim().parse::<f64>().ok()?
            }
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for FormNumber {
    fn from(value: f64) -> Self {
        FormNumber::Number(value)
    }
}

impl From<&str> for FormNumber {
    fn from(value: &str) -> Self {
        FormNumber::Text(value.to_string())
    }
}

/// Raw form submission, as entered by the user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormInput {
    #[serde(default)]
    pub party_size: Option<FormNumber>,
    #[serde(default)]
    pub min_budget: Option<FormNumber>,
    #[serde(default)]
    pub max_budget: Option<FormNumber>,
    /// Single-budget forms use this field
    #[serde(default)]
    pub budget: Option<FormNumber>,
    /// Whether the budget already includes sales tax and tip
    #[serde(default)]
    pub include_tax: bool,
    #[serde(default)]
    pub tip_percent: Option<FormNumber>,
    #[serde(default)]
    pub family_style: bool,
    #[serde(default)]
    pub courses: Vec<String>,
    /// Dietary preferences (vegetarian, gluten-free, ...)
    #[serde(default)]
    pub preferences: Vec<String>,
    /// Free-text additional preferences
    #[serde(default)]
    pub additional: String,
}

/// Geographic coordinates of a selected place
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// The restaurant the user picked from place autocomplete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSelection {
    pub name: String,
    /// Formatted address as shown to the user
    #[serde(default)]
    pub address: Option<String>,
    /// Street number + route, used for directory matching
    #[serde(default)]
    pub street_address: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub city: String,
    /// Two-letter region code
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub location: Option<LatLng>,
}

/// A validated request for menu recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub restaurant: RestaurantSelection,
    pub party_size: u32,
    pub budget: Budget,
    pub include_tax: bool,
    pub tip_percent: u8,
    pub family_style: bool,
    pub courses: BTreeSet<Course>,
    pub dietary: BTreeSet<String>,
    pub additional_notes: String,
    pub prior_feedback: Option<String>,
}

impl RequestSpec {
    /// Validate a raw form submission against the active form profile
    pub fn from_form(
        restaurant: &RestaurantSelection,
        form: &FormInput,
        profile: &FormProfile,
    ) -> Result<Self> {
        if restaurant.name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "Please select a restaurant from the suggestions list".into(),
            ));
        }

        let budget = match profile.budget_mode {
            BudgetMode::Range => {
                let min = parse_budget(form.min_budget.as_ref(), "minimum budget")?;
                let max = parse_budget(form.max_budget.as_ref(), "maximum budget")?;
                if max < min {
                    return Err(Error::InvalidInput(format!(
                        "Maximum budget (${:.2}) must be at least the minimum budget (${:.2})",
                        max, min
                    )));
                }
                Budget::Range { min, max }
            }
            BudgetMode::Single => {
                let field = form.budget.as_ref().or(form.max_budget.as_ref());
                Budget::Ceiling {
                    max: parse_budget(field, "budget")?,
                }
            }
        };

        // Party size falls back to 1 like an empty number input
        let party_size = form
            .party_size
            .as_ref()
            .and_then(FormNumber::value)
            .map(f64::trunc)
            .filter(|n| *n >= 1.0)
            .map(|n| n.min(u32::MAX as f64) as u32)
            .unwrap_or(1);

        let tip_percent = match form.tip_percent.as_ref() {
            None => DEFAULT_TIP_PERCENT,
            Some(field) => {
                let tip = field.value().ok_or_else(|| {
                    Error::InvalidInput("Tip percentage must be a number".into())
                })?;
                let tip = tip.trunc();
                if !(0.0..=100.0).contains(&tip) {
                    return Err(Error::InvalidInput(
                        "Tip percentage must be between 0 and 100".into(),
                    ));
                }
                tip as u8
            }
        };

        let courses = if profile.course_selection {
            form.courses
                .iter()
                .filter(|c| !c.trim().is_empty())
                .map(|c| c.parse::<Course>().map_err(Error::InvalidInput))
                .collect::<Result<BTreeSet<_>>>()?
        } else {
            BTreeSet::new()
        };

        let dietary = form
            .preferences
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        Ok(Self {
            restaurant: restaurant.clone(),
            party_size,
            budget,
            include_tax: form.include_tax,
            tip_percent,
            family_style: profile.family_style && form.family_style,
            courses,
            dietary,
            additional_notes: form.additional.trim().to_string(),
            prior_feedback: None,
        })
    }

    /// Copy of this request carrying refinement feedback
    pub fn with_feedback(&self, feedback: &str) -> Self {
        let feedback = feedback.trim();
        Self {
            prior_feedback: (!feedback.is_empty()).then(|| feedback.to_string()),
            ..self.clone()
        }
    }
}

fn parse_budget(field: Option<&FormNumber>, name: &str) -> Result<f64> {
    let value = field
        .and_then(FormNumber::value)
        .ok_or_else(|| Error::InvalidInput(format!("Please enter a valid {}", name)))?;
    if value <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "The {} must be greater than zero",
            name
        )));
    }
    Ok(value)
}

/// Spend targets derived from the stated budget and the resolved tax rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBudget {
    /// Pre-tax, pre-tip lower bound (absent for a single budget)
    pub food_spend_min: Option<f64>,
    /// Pre-tax, pre-tip upper bound
    pub food_spend_max: f64,
    /// Lower bound as the user stated it
    pub total_spend_min: Option<f64>,
    /// Ceiling as the user stated it
    pub total_spend_max: f64,
}
