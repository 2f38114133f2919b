use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::db::models::{Competitor, Event, GameState, SeasonType, Side};

use super::cache::ScoreboardCache;
use super::provider::{FetchError, ScoreboardProvider};
use super::wire::{ScoreboardResponse, WireCompetitor, WireEvent};

/// Scoreboard provider backed by ESPN's public site API.
pub struct EspnScoreboard {
    http: Client,
    base_url: String,
    cache: ScoreboardCache,
}

impl EspnScoreboard {
    pub fn new(base_url: &str, cache: ScoreboardCache) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(EspnScoreboard {
            http,
            base_url: base_url.to_string(),
            cache,
        })
    }
}

#[async_trait]
impl ScoreboardProvider for EspnScoreboard {
    fn name(&self) -> &str {
        "espn"
    }

    async fn fetch_week(
        &self,
        year: i32,
        week: u8,
        season: SeasonType,
    ) -> Result<Vec<Event>, FetchError> {
        let key = (year, week, season.code());
        if let Some(events) = self.cache.get(key) {
            debug!("Scoreboard cache hit for {}-{} W{}", year, season, week);
            return Ok(events);
        }

        let url = format!(
            "{}?year={}&week={}&seasontype={}",
            self.base_url,
            year,
            week,
            season.code()
        );
        debug!("Fetching scoreboard from {}", url);

        let resp = self.http.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status()));
        }

        let raw: ScoreboardResponse = resp.json().await?;
        let events = into_events(raw);
        self.cache.put(key, events.clone());
        Ok(events)
    }
}

/// Map a wire response into domain events, dropping only records that
/// lack an id. Missing pieces degrade rather than fail: no competition
/// means an empty competitor list, unknown state means not-final.
pub(crate) fn into_events(raw: ScoreboardResponse) -> Vec<Event> {
    raw.events
        .unwrap_or_default()
        .into_iter()
        .filter_map(into_event)
        .collect()
}

fn into_event(wire: WireEvent) -> Option<Event> {
    let id = wire.id?;
    let date = wire
        .date
        .as_deref()
        .and_then(parse_kickoff)
        .unwrap_or(DateTime::UNIX_EPOCH);

    let competition = wire.competitions.and_then(|mut c| {
        if c.is_empty() {
            None
        } else {
            Some(c.swap_remove(0))
        }
    });

    let (state, competitors) = match competition {
        Some(comp) => {
            let state = comp
                .status
                .and_then(|s| s.kind)
                .and_then(|k| k.state)
                .map(|s| parse_state(&s))
                .unwrap_or(GameState::Pre);
            let competitors = comp
                .competitors
                .unwrap_or_default()
                .into_iter()
                .map(into_competitor)
                .collect();
            (state, competitors)
        }
        None => (GameState::Pre, Vec::new()),
    };

    Some(Event {
        id,
        date,
        state,
        competitors,
    })
}

fn into_competitor(wire: WireCompetitor) -> Competitor {
    let team = wire
        .team
        .and_then(|t| t.short_display_name.or(t.display_name));
    let side = match wire.home_away.as_deref() {
        Some("home") => Some(Side::Home),
        Some("away") => Some(Side::Away),
        _ => None,
    };
    Competitor {
        team,
        side,
        score: wire.score.as_ref().and_then(parse_score),
        winner: wire.winner.unwrap_or(false),
    }
}

fn parse_state(state: &str) -> GameState {
    match state {
        "pre" => GameState::Pre,
        "post" => GameState::Post,
        _ => GameState::In,
    }
}

fn parse_score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// ESPN kickoff timestamps usually omit seconds; accept both forms.
fn parse_kickoff(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_response() -> ScoreboardResponse {
        serde_json::from_str(
            r#"{
              "events": [
                {
                  "id": "401547001",
                  "date": "2025-09-07T17:00Z",
                  "competitions": [{
                    "status": { "type": { "state": "post" } },
                    "competitors": [
                      { "homeAway": "home", "winner": true, "score": "24",
                        "team": { "displayName": "Buffalo Bills", "shortDisplayName": "Bills" } },
                      { "homeAway": "away", "winner": false, "score": 17,
                        "team": { "shortDisplayName": "Jets" } }
                    ]
                  }]
                },
                {
                  "id": "401547002",
                  "date": "2025-09-07T20:25:00Z",
                  "competitions": [{
                    "status": { "type": { "state": "in" } },
                    "competitors": [
                      { "homeAway": "home",
                        "team": { "shortDisplayName": "Chiefs" } },
                      { "homeAway": "away", "score": "3",
                        "team": { "shortDisplayName": "Ravens" } }
                    ]
                  }]
                },
                { "id": "401547003" }
              ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_final_event() {
        let events = into_events(sample_response());
        assert_eq!(events.len(), 3);

        let final_game = &events[0];
        assert_eq!(final_game.state, GameState::Post);
        assert_eq!(
            final_game.date,
            Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap()
        );
        assert_eq!(final_game.winning_team(), Some("Bills"));

        let home = final_game.competitor(Side::Home).unwrap();
        assert_eq!(home.score, Some(24), "string scores must parse");
        let away = final_game.competitor(Side::Away).unwrap();
        assert_eq!(away.score, Some(17), "numeric scores must parse");
    }

    #[test]
    fn test_parse_in_progress_event_degrades() {
        let events = into_events(sample_response());
        let live = &events[1];
        assert_eq!(live.state, GameState::In);
        assert_eq!(live.winning_team(), None);
        assert_eq!(
            live.competitor(Side::Home).unwrap().score,
            None,
            "missing scores stay absent"
        );
    }

    #[test]
    fn test_event_without_competition_data() {
        let events = into_events(sample_response());
        let bare = &events[2];
        assert_eq!(bare.state, GameState::Pre);
        assert!(bare.competitors.is_empty());
        assert_eq!(bare.date, DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_empty_response() {
        let raw: ScoreboardResponse = serde_json::from_str("{}").unwrap();
        assert!(into_events(raw).is_empty());
    }

    #[test]
    fn test_parse_kickoff_forms() {
        assert!(parse_kickoff("2025-09-07T17:00Z").is_some());
        assert!(parse_kickoff("2025-09-07T17:00:00Z").is_some());
        assert!(parse_kickoff("yesterday").is_none());
    }
}
