//! Plate CLI - Budget-aware menu recommendations
//!
//! Usage:
//!   plate tax "Los Angeles" CA                          Look up the sales tax rate
//!   plate plan -r Bestia --city "Los Angeles" ...       Preview the budget plan
//!   plate recommend -r Bestia --city "Los Angeles" ...  Get and refine recommendations
//!   plate favorites save 9.5 18                         Save a tax/tip combination
//!   plate serve --port 3000                             Start web server

mod cli;
mod commands;


use std::io;

use anyhow::Result;
use clap::Parser;
use plate_core::FormProfile;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Tax { city, region, json } => {
            let recommender = commands::build_recommender(FormProfile::default()).await?;
            commands::cmd_tax(&recommender, &city, &region, json).await
        }
        Commands::Plan { request, json } => {
            let store = commands::open_favorites(cli.favorites.as_deref())?;
            let recommender = commands::build_recommender(request.profile()).await?;
            commands::cmd_plan(&recommender, &store, &request, json).await
        }
        Commands::Recommend { request, no_refine } => {
            let store = commands::open_favorites(cli.favorites.as_deref())?;
            let recommender = commands::build_recommender(request.profile()).await?;
            let stdin = io::stdin();
            commands::cmd_recommend(&recommender, &store, &request, stdin.lock(), !no_refine)
                .await
        }
        Commands::Favorites { action } => {
            let mut store = commands::open_favorites(cli.favorites.as_deref())?;
            match action {
                None | Some(FavoritesAction::List) => commands::cmd_favorites_list(&store),
                Some(FavoritesAction::Save { tax, tip }) => {
                    commands::cmd_favorites_save(&mut store, tax, tip)
                }
                Some(FavoritesAction::Apply { index }) => {
                    commands::cmd_favorites_apply(&store, index)
                }
                Some(FavoritesAction::Remove { index }) => {
                    commands::cmd_favorites_remove(&mut store, index)
                }
            }
        }
        Commands::Serve {
            port,
            host,
            static_dir,
        } => commands::cmd_serve(&host, port, static_dir.as_deref()).await,
    }
}
