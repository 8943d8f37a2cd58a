//! Recommendation command with an interactive refinement loop

use std::io::{self, BufRead, Write};

use anyhow::Result;
use plate_core::{FavoritesStore, Recommendation, Recommender, Session};
use tracing::debug;

use super::{form_from_args, price_markers, selection_from_args};
use crate::cli::RequestArgs;

/// Submit the request, then read refinement feedback from `input` line by line
///
/// A blank line or end of input finishes. Failed refinements are reported and
/// the loop continues with the previous request.
pub async fn cmd_recommend<R: BufRead>(
    recommender: &Recommender,
    favorites: &FavoritesStore,
    args: &RequestArgs,
    input: R,
    refine: bool,
) -> Result<()> {
    let mut session = Session::new();
    session.select(selection_from_args(args));
    let form = form_from_args(args, favorites)?;

    println!("⏳ Getting recommendations for {}...", args.restaurant.trim());
    let recommendation = recommender.submit(&mut session, &form).await?;
    print_recommendation(&recommendation);

    if !refine {
        return Ok(());
    }

    let mut lines = input.lines();
    loop {
        print!("\nRefine (e.g. \"more vegetarian dishes\", blank to finish): ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else { break };
        let feedback = line?;
        if feedback.trim().is_empty() {
            break;
        }

        debug!(feedback = %feedback.trim(), "Refining");
        match recommender.refine(&mut session, &feedback).await {
            Ok(recommendation) => print_recommendation(&recommendation),
            Err(e) if e.is_user_facing() => eprintln!("⚠️  {}", e),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn print_recommendation(recommendation: &Recommendation) {
    let budget = &recommendation.budget;

    println!();
    println!("   {}", recommendation.tax);
    match budget.food_spend_min {
        Some(min) => println!(
            "   Food spend target: ${:.2} - ${:.2}",
            min, budget.food_spend_max
        ),
        None => println!("   Food spend target: up to ${:.2}", budget.food_spend_max),
    }
    if let Some(business) = &recommendation.business {
        if let Some(categories) = business.category_titles() {
            println!("   {}", categories);
        }
    }
    println!();
    println!("{}", recommendation.formatted.render(price_markers()));

    if let Some(over) = recommendation.over_budget {
        println!();
        println!(
            "⚠️  The stated total is ${:.2} over your ${:.2} ceiling",
            over, recommendation.total_ceiling
        );
    }
}
