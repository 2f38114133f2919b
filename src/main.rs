use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod config;
mod db;
mod http;
mod keys;
mod scoreboard;
mod scoring;

use config::Config;
use db::models::SeasonType;
use db::Database;
use scoreboard::{EspnScoreboard, ScoreboardCache, SystemClock, TtlPolicy};
use scoring::ComputeEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // Build scoreboard client with its adaptive response cache
    let cache = ScoreboardCache::new(
        TtlPolicy {
            live: Duration::from_secs(config.cache_ttl_live_secs),
            idle: Duration::from_secs(config.cache_ttl_idle_secs),
        },
        Arc::new(SystemClock),
    );
    let scoreboard = Arc::new(EspnScoreboard::new(&config.scoreboard_api_url, cache)?);

    let engine = Arc::new(ComputeEngine::new(db.clone(), scoreboard));
    let season = SeasonType::parse_or_reg(&config.season);

    // Scheduled season driver: periodically sweep all weeks, skipping any
    // that already have a persisted result. The timer doubles as the
    // retry mechanism for weeks that were not yet final or failed.
    {
        let engine = engine.clone();
        let year = config.season_year;
        let max_weeks = config.max_weeks;
        let every = Duration::from_secs(config.compute_interval_secs);
        info!(
            "Season driver: {}-{} weeks 1..={} every {:?}",
            year, season, max_weeks, every
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let computed = engine.run_season(year, season, max_weeks).await;
                if !computed.is_empty() {
                    info!("Scheduled run computed {} week(s)", computed.len());
                }
            }
        });
    }

    // Run the trigger/read API (blocks until shutdown)
    let state = http::AppState {
        db,
        engine,
        default_year: config.season_year,
        default_season: season,
        default_week: config.default_week,
        max_weeks: config.max_weeks,
    };
    let app = http::router(state);
    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
