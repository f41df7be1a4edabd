//! Run one update-check cycle from files and print the enriched response.
//!
//! Usage:
//!   gp-translation-updater plugin <request.json> <response.json>
//!   gp-translation-updater theme <request.json> <response.json> <themes.json>
//!
//! `themes.json` maps each installed theme's stylesheet to its headers.
//!
//! Optional environment variables:
//! - GP_UPDATER_PLUGINS_API_URL / GP_UPDATER_THEMES_API_URL
//! - GP_UPDATER_API_VERSION (defaults to 1.1)
//! - GP_UPDATER_TIMEOUT_SECS (defaults to 10)
//! - GP_UPDATER_DEV_MODE (allow local servers, skip TLS verification)

use anyhow::{Context, Result};
use gp_translation_updater::{Config, PluginsUpdater, StaticThemeRegistry, ThemesUpdater};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gp_translation_updater=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (kind, request_path, response_path) = match args.as_slice() {
        [kind, request, response, ..] => (kind.as_str(), Path::new(request), Path::new(response)),
        _ => anyhow::bail!(
            "Usage: gp-translation-updater <plugin|theme> <request.json> <response.json> [themes.json]"
        ),
    };

    let config = Config::from_env()?;
    if config.dev.allow_local_destinations {
        info!("Development mode: local GlotPress servers allowed");
    }

    let request = read_json(request_path)?;
    let response = read_json(response_path)?;

    let enriched = match kind {
        "plugin" => {
            let updater = PluginsUpdater::plugins(&config)?;
            let url = config.plugins_api_url.clone();
            let session = updater.on_outbound_request(&url, &request);
            info!("Collected {} plugin(s)", session.len());
            updater.on_inbound_response(&url, session, response).await
        }
        "theme" => {
            let themes_path = args
                .get(3)
                .context("Theme runs need a themes.json describing installed themes")?;
            let registry = StaticThemeRegistry::from_value(&read_json(Path::new(themes_path))?);
            let updater = ThemesUpdater::themes(&config, Arc::new(registry))?;
            let url = config.themes_api_url.clone();
            let session = updater.on_outbound_request(&url, &request);
            info!("Collected {} theme(s)", session.len());
            updater.on_inbound_response(&url, session, response).await
        }
        other => anyhow::bail!("Unknown package kind '{}', expected plugin or theme", other),
    };

    println!("{}", serde_json::to_string_pretty(&enriched)?);
    Ok(())
}
