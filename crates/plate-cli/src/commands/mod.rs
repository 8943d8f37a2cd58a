//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `favorites` - Saved tax/tip combinations (list, save, apply, remove)
//! - `plan` - Tax lookup and budget plan preview
//! - `recommend` - Recommendations with interactive refinement
//! - `serve` - Web server command

pub mod favorites;
pub mod plan;
pub mod recommend;
pub mod serve;

// Re-export command functions for main.rs
pub use favorites::*;
pub use plan::*;
pub use recommend::*;
pub use serve::*;

use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result};
use plate_core::{
    FavoritesStore, FormInput, FormNumber, FormProfile, Recommender, RestaurantSelection,
};

use crate::cli::RequestArgs;

/// Build the recommender from the environment with the given form profile
pub async fn build_recommender(profile: FormProfile) -> Result<Recommender> {
    let recommender = Recommender::from_env()
        .await
        .context("Failed to set up recommendation pipeline")?;
    Ok(recommender.with_profile(profile))
}

/// Open the favorites store at `path`, or the default location
pub fn open_favorites(path: Option<&Path>) -> Result<FavoritesStore> {
    let store = match path {
        Some(path) => FavoritesStore::open(path),
        None => FavoritesStore::open_default(),
    };
    store.context("Failed to open favorites")
}

/// The restaurant named on the command line
pub fn selection_from_args(args: &RequestArgs) -> RestaurantSelection {
    RestaurantSelection {
        name: args.restaurant.trim().to_string(),
        address: args.address.clone(),
        street_address: args.address.clone(),
        place_id: None,
        city: args.city.trim().to_string(),
        region: args.region.trim().to_uppercase(),
        location: None,
    }
}

/// Form fields from the command line; `--favorite` supplies the tip
pub fn form_from_args(args: &RequestArgs, favorites: &FavoritesStore) -> Result<FormInput> {
    let tip_percent = match args.favorite {
        Some(number) => {
            let favorite = favorites.get(favorite_index(number)?)?;
            Some(FormNumber::Number(f64::from(favorite.tip)))
        }
        None => args.tip.as_deref().map(FormNumber::from),
    };

    Ok(FormInput {
        party_size: args.party_size.as_deref().map(FormNumber::from),
        min_budget: args.min.as_deref().map(FormNumber::from),
        max_budget: args.max.as_deref().map(FormNumber::from),
        budget: args.budget.as_deref().map(FormNumber::from),
        include_tax: args.include_tax,
        tip_percent,
        family_style: args.family_style,
        courses: args.courses.clone(),
        preferences: args.dietary.clone(),
        additional: args.notes.clone(),
    })
}

/// Convert a 1-based number shown by `favorites list` to a store index
pub fn favorite_index(number: usize) -> Result<usize> {
    number
        .checked_sub(1)
        .context("Favorites are numbered from 1")
}

/// Price highlight markers: bold green on a terminal, nothing otherwise
pub fn price_markers() -> (&'static str, &'static str) {
    if std::io::stdout().is_terminal() {
        ("\x1b[1;32m", "\x1b[0m")
    } else {
        ("", "")
    }
}
