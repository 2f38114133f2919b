use clap::Parser;

/// Weekly pick'em winner computation service
#[derive(Parser, Debug, Clone)]
#[command(name = "pickem-scorer", version, about)]
pub struct Config {
    /// HTTP listen address for the trigger/read API
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "pickem.db")]
    pub database_path: String,

    /// Scoreboard API base URL
    #[arg(
        long,
        env = "SCOREBOARD_API_URL",
        default_value = "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard"
    )]
    pub scoreboard_api_url: String,

    /// Default season year for the scheduled driver and on-demand defaults
    #[arg(long, env = "SEASON_YEAR", default_value = "2025")]
    pub season_year: i32,

    /// Default season type: pre | reg | post
    #[arg(long, env = "SEASON", default_value = "reg")]
    pub season: String,

    /// Week used for on-demand computes when no week is given
    #[arg(long, env = "DEFAULT_WEEK", default_value = "1")]
    pub default_week: u8,

    /// Highest week number the season driver will attempt
    #[arg(long, env = "MAX_WEEKS", default_value = "18")]
    pub max_weeks: u8,

    /// Seconds between scheduled season-driver runs
    #[arg(long, env = "COMPUTE_INTERVAL_SECS", default_value = "3600")]
    pub compute_interval_secs: u64,

    /// Scoreboard cache TTL while any game is live (seconds)
    #[arg(long, env = "CACHE_TTL_LIVE_SECS", default_value = "20")]
    pub cache_ttl_live_secs: u64,

    /// Scoreboard cache TTL while the slate is idle (seconds)
    #[arg(long, env = "CACHE_TTL_IDLE_SECS", default_value = "90")]
    pub cache_ttl_idle_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.season.as_str(), "pre" | "reg" | "post") {
            anyhow::bail!("season must be one of: pre, reg, post");
        }
        if !(1..=30).contains(&self.max_weeks) {
            anyhow::bail!("max_weeks must be between 1 and 30");
        }
        if self.default_week == 0 || self.default_week > self.max_weeks {
            anyhow::bail!("default_week must be between 1 and max_weeks");
        }
        if self.compute_interval_secs == 0 {
            anyhow::bail!("compute_interval_secs must be positive");
        }
        Ok(())
    }
}
