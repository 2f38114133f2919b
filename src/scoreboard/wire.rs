//! Wire shapes for the scoreboard API response.
//!
//! Everything is optional: upstream omits fields freely (scores before
//! kickoff, winner flags until the game settles) and sends scores as
//! strings or numbers depending on the endpoint revision. Mapping into
//! the clean domain types happens in [`super::espn`].

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize, Default)]
pub struct ScoreboardResponse {
    pub events: Option<Vec<WireEvent>>,
}

#[derive(Debug, Deserialize)]
pub struct WireEvent {
    pub id: Option<String>,
    /// Kickoff, ISO 8601 — often without seconds ("2025-09-07T17:00Z").
    pub date: Option<String>,
    pub competitions: Option<Vec<WireCompetition>>,
}

#[derive(Debug, Deserialize)]
pub struct WireCompetition {
    pub competitors: Option<Vec<WireCompetitor>>,
    pub status: Option<WireStatus>,
}

#[derive(Debug, Deserialize)]
pub struct WireStatus {
    #[serde(rename = "type")]
    pub kind: Option<WireStatusType>,
}

#[derive(Debug, Deserialize)]
pub struct WireStatusType {
    /// "pre" | "in" | "post"
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireCompetitor {
    #[serde(rename = "homeAway")]
    pub home_away: Option<String>,
    pub team: Option<WireTeam>,
    /// String or number on the wire.
    pub score: Option<Value>,
    pub winner: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct WireTeam {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(rename = "shortDisplayName")]
    pub short_display_name: Option<String>,
}
