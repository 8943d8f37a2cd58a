//! Server command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use plate_core::{EnvCredentials, Recommender};
use plate_server::ServerConfig;

pub async fn cmd_serve(host: &str, port: u16, static_dir: Option<&Path>) -> Result<()> {
    println!("🚀 Starting Plate web server...");
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }

    let config = ServerConfig::from_env();
    if config.require_auth {
        println!(
            "   🔑 API keys: {} configured (PLATE_API_KEYS)",
            config.api_keys.len()
        );
    } else {
        println!();
        println!("   ⚠️  Authentication DISABLED - set PLATE_API_KEYS before exposing to a network");
    }
    if !config.allowed_origins.is_empty() {
        println!(
            "   🌐 Allowed origins: {} (PLATE_ALLOWED_ORIGINS)",
            config.allowed_origins.join(", ")
        );
    }
    println!();

    let recommender = Recommender::from_env()
        .await
        .context("Failed to set up recommendation pipeline")?;
    let static_dir = static_dir.map(|p| p.to_string_lossy().to_string());

    plate_server::serve_with_config(
        recommender,
        Arc::new(EnvCredentials),
        host,
        port,
        static_dir.as_deref(),
        config,
    )
    .await
}
