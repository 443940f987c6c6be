//! Build one trend report from scraper snapshots and print it as JSON.
//!
//! Environment (a `.env` file is honoured):
//! - `TREND_RSS_SNAPSHOT`        JSON array of RSS items
//! - `TREND_COMMUNITY_SNAPSHOT`  JSON array of community posts
//! - `TREND_CONFIG_PATH`         config file (else `config/trends.toml`, `config/trends.json`)
//! - `TREND_WINDOW_DAYS`         optional look-back window ending now
//! - `TREND_MAX_TOPICS`, `TREND_MAX_ITEMS`  optional report truncation

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_engine::ingest::JsonSnapshotProvider;
use trend_engine::{Origin, ReportLimits, RunOptions, SourceProvider, TrendConfig, TrendEngine, Window};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trend=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = TrendConfig::load_default()?;
    let engine = TrendEngine::new(&config).context("invalid trend configuration")?;

    let mut providers: Vec<Box<dyn SourceProvider>> = Vec::new();
    if let Ok(p) = std::env::var("TREND_RSS_SNAPSHOT") {
        providers.push(Box::new(JsonSnapshotProvider::new("rss-snapshot", Origin::Rss, p)));
    }
    if let Ok(p) = std::env::var("TREND_COMMUNITY_SNAPSHOT") {
        providers.push(Box::new(JsonSnapshotProvider::new(
            "community-snapshot",
            Origin::Community,
            p,
        )));
    }
    if providers.is_empty() {
        tracing::warn!("no snapshots configured; set TREND_RSS_SNAPSHOT and/or TREND_COMMUNITY_SNAPSHOT");
    }

    let now = Utc::now();
    let window = env_parse::<i64>("TREND_WINDOW_DAYS")
        .map(|d| Window::trailing_days(now, d))
        .transpose()
        .context("TREND_WINDOW_DAYS")?;
    let opts = RunOptions {
        window,
        limits: ReportLimits {
            max_topics: env_parse("TREND_MAX_TOPICS"),
            max_items: env_parse("TREND_MAX_ITEMS"),
        },
    };

    let outcome = engine.run_providers(&providers, now, &opts).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
