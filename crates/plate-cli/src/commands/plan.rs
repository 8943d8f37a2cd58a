//! Tax lookup and plan preview commands

use anyhow::Result;
use plate_core::{FavoritesStore, Recommender, TaxResolution};

use super::{form_from_args, selection_from_args};
use crate::cli::RequestArgs;

pub async fn cmd_tax(
    recommender: &Recommender,
    city: &str,
    region: &str,
    json: bool,
) -> Result<()> {
    let resolution = recommender.tax_resolver().resolve(city, region).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
    } else {
        print_tax(city, region, &resolution);
    }
    Ok(())
}

fn print_tax(city: &str, region: &str, resolution: &TaxResolution) {
    println!("📍 {}, {}", city, region.to_uppercase());
    println!("   {}", resolution);
    if !resolution.is_precise() {
        println!("   (county rate not available, totals may be off by a little)");
    }
}

pub async fn cmd_plan(
    recommender: &Recommender,
    favorites: &FavoritesStore,
    args: &RequestArgs,
    json: bool,
) -> Result<()> {
    let selection = selection_from_args(args);
    let form = form_from_args(args, favorites)?;
    let preview = recommender.preview(&selection, &form).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    let budget = &preview.plan.budget;
    println!("🍽  {} ({}, {})", selection.name, selection.city, selection.region);
    println!("   {}", preview.tax);
    println!(
        "   Party of {}, tip {}%",
        preview.request.party_size, preview.request.tip_percent
    );
    match budget.food_spend_min {
        Some(min) => println!("   Food spend: ${:.2} - ${:.2}", min, budget.food_spend_max),
        None => println!("   Food spend: up to ${:.2}", budget.food_spend_max),
    }
    println!(
        "   Grand total ceiling: ${:.2}",
        preview.plan.total_ceiling
    );
    println!();
    println!("{}", preview.plan.prompt);
    Ok(())
}
