//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use plate_core::{BudgetMode, FormProfile};

/// Plate - Budget-aware menu recommendations
#[derive(Parser)]
#[command(name = "plate")]
#[command(about = "Menu recommendations that fit your budget, tax and tip included", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Favorites file (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub favorites: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Look up the sales tax rate for a city
    Tax {
        /// City name
        city: String,

        /// Two-letter region code (e.g., CA)
        region: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show the budget plan and prompt without generating recommendations
    Plan {
        #[command(flatten)]
        request: RequestArgs,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Get menu recommendations, then refine them interactively
    Recommend {
        #[command(flatten)]
        request: RequestArgs,

        /// Print the first set of recommendations and exit
        #[arg(long)]
        no_refine: bool,
    },

    /// Manage saved tax/tip combinations
    Favorites {
        #[command(subcommand)]
        action: Option<FavoritesAction>,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory containing the form page and assets
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}

/// Restaurant and form fields shared by `plan` and `recommend`
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    /// Restaurant name
    #[arg(short, long)]
    pub restaurant: String,

    /// City the restaurant is in
    #[arg(long)]
    pub city: String,

    /// Two-letter region code (e.g., CA)
    #[arg(long)]
    pub region: String,

    /// Street address, improves directory matching
    #[arg(long)]
    pub address: Option<String>,

    /// Number of people
    #[arg(short = 'n', long)]
    pub party_size: Option<String>,

    /// Minimum budget (e.g., 80 or $80)
    #[arg(long)]
    pub min: Option<String>,

    /// Maximum budget
    #[arg(long)]
    pub max: Option<String>,

    /// Use a single budget ceiling instead of a range
    #[arg(long, conflicts_with_all = ["min", "max"])]
    pub budget: Option<String>,

    /// The budget already includes sales tax and tip
    #[arg(long)]
    pub include_tax: bool,

    /// Tip percentage (default 18)
    #[arg(long, conflicts_with = "favorite")]
    pub tip: Option<String>,

    /// Take the tip percentage from a saved favorite (number from `favorites list`)
    #[arg(long)]
    pub favorite: Option<usize>,

    /// Shared dishes for the whole party
    #[arg(long)]
    pub family_style: bool,

    /// Course to include (repeatable): appetizers, entrees, sides, desserts, drinks
    #[arg(short, long = "course")]
    pub courses: Vec<String>,

    /// Dietary preference (repeatable), e.g. vegetarian
    #[arg(short, long = "diet")]
    pub dietary: Vec<String>,

    /// Anything else the recommendations should consider
    #[arg(long, default_value = "")]
    pub notes: String,
}

impl RequestArgs {
    /// Form profile implied by the flags: `--budget` selects a single ceiling
    pub fn profile(&self) -> FormProfile {
        FormProfile {
            budget_mode: if self.budget.is_some() {
                BudgetMode::Single
            } else {
                BudgetMode::Range
            },
            ..FormProfile::default()
        }
    }
}

#[derive(Subcommand)]
pub enum FavoritesAction {
    /// List saved combinations
    List,

    /// Save a tax/tip combination
    Save {
        /// Tax rate in percent
        tax: f64,

        /// Tip percentage
        tip: u8,
    },

    /// Show the tip to use from a saved combination
    Apply {
        /// Number from `favorites list`
        index: usize,
    },

    /// Remove a saved combination
    Remove {
        /// Number from `favorites list`
        index: usize,
    },
}
