use async_trait::async_trait;
use thiserror::Error;

use crate::db::models::{Event, SeasonType};

/// The scoreboard query failed before yielding a usable event list.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("scoreboard request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("scoreboard returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Trait that every scoreboard source must implement.
#[async_trait]
pub trait ScoreboardProvider: Send + Sync {
    /// Return the full slate of events for one (year, week, season) query.
    /// No retry logic lives here; callers decide whether to try again.
    async fn fetch_week(
        &self,
        year: i32,
        week: u8,
        season: SeasonType,
    ) -> Result<Vec<Event>, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}
