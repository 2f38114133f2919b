use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Season phase, encoded as the scoreboard API's `seasontype` codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeasonType {
    Pre,
    Reg,
    Post,
}

impl SeasonType {
    /// Wire code used by the scoreboard query: 1=pre, 2=regular, 3=post.
    pub fn code(self) -> u8 {
        match self {
            SeasonType::Pre => 1,
            SeasonType::Reg => 2,
            SeasonType::Post => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SeasonType::Pre => "pre",
            SeasonType::Reg => "reg",
            SeasonType::Post => "post",
        }
    }

    /// Unknown season strings fall back to the regular season, matching
    /// the upstream trigger's behaviour.
    pub fn parse_or_reg(s: &str) -> SeasonType {
        match s.to_lowercase().as_str() {
            "pre" => SeasonType::Pre,
            "post" => SeasonType::Post,
            _ => SeasonType::Reg,
        }
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a game stands in its lifecycle: scheduled, underway, or final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Pre,
    In,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

/// One competitor in a game as reported by the scoreboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Competitor {
    /// Team display name; absent when the upstream record is incomplete.
    pub team: Option<String>,
    /// Home/away tag; absent on malformed records.
    pub side: Option<Side>,
    /// Final or running score; absent before kickoff.
    pub score: Option<i64>,
    /// Declared-winner flag, set on at most one competitor once final.
    pub winner: bool,
}

/// One game on a week's slate.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    /// Kickoff time.
    pub date: DateTime<Utc>,
    pub state: GameState,
    /// Both sides of the game. Empty when the upstream response carried
    /// no competition data for this event.
    pub competitors: Vec<Competitor>,
}

impl Event {
    pub fn competitor(&self, side: Side) -> Option<&Competitor> {
        self.competitors.iter().find(|c| c.side == Some(side))
    }

    /// The declared winner's team name, if this event has one.
    pub fn winning_team(&self) -> Option<&str> {
        self.competitors
            .iter()
            .find(|c| c.winner)
            .and_then(|c| c.team.as_deref())
    }
}

/// Keys in a pick document that are bookkeeping, not game picks.
pub const RESERVED_PICK_KEYS: &[&str] = &[
    "tieBreaker",
    "displayName",
    "locked",
    "submittedAt",
    "lastEditedAt",
];

/// One user's raw pick document for one week: event id → picked team
/// name, plus the reserved bookkeeping keys above.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PickEntry(pub Map<String, Value>);

impl PickEntry {
    /// Wrap a JSON object; anything else becomes an empty entry.
    pub fn from_json(value: Value) -> PickEntry {
        match value {
            Value::Object(map) => PickEntry(map),
            _ => PickEntry::default(),
        }
    }

    /// The actual game picks: reserved keys and non-string values are
    /// excluded from consideration.
    pub fn game_picks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(k, _)| !RESERVED_PICK_KEYS.contains(&k.as_str()))
            .filter_map(|(k, v)| v.as_str().map(|pick| (k.as_str(), pick)))
    }

    /// Numeric tiebreaker guess. Tolerates numbers and numeric strings;
    /// anything else reads as missing.
    pub fn tie_breaker(&self) -> Option<f64> {
        match self.0.get("tieBreaker") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Display name embedded in the document by older clients.
    pub fn display_name(&self) -> Option<&str> {
        self.0.get("displayName").and_then(|v| v.as_str())
    }

    pub fn locked(&self) -> bool {
        self.0
            .get("locked")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// One user's computed line for one week. `tb_diff`/`tb_over` are set
/// only for entries that reached tiebreak resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingEntry {
    pub uid: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    pub wins: u32,
    #[serde(rename = "tieBreaker")]
    pub tie_breaker: Option<f64>,
    #[serde(rename = "tbDiff")]
    pub tb_diff: Option<f64>,
    #[serde(rename = "tbOver")]
    pub tb_over: bool,
}

/// A weekly winner, persisted with the display name current at compute
/// time so readers don't need a second lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnerRef {
    pub uid: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

/// Persisted outcome of one scored week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyResult {
    pub year: i32,
    pub season: String,
    pub week: u8,
    #[serde(rename = "lastGameTotal")]
    pub last_game_total: Option<i64>,
    #[serde(rename = "computedAt")]
    pub computed_at: DateTime<Utc>,
    pub standings: Vec<StandingEntry>,
    pub winners: Vec<WinnerRef>,
}

/// One user's cumulative season stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    #[serde(rename = "weeksPlayed")]
    pub weeks_played: u32,
    #[serde(rename = "totalWins")]
    pub total_wins: u32,
    #[serde(rename = "bestWeekWins")]
    pub best_week_wins: u32,
    /// Week label ("W3") → that week's correct-pick count. Presence of a
    /// label also records that the week has been applied to this user.
    #[serde(rename = "weeklyWins")]
    pub weekly_wins: BTreeMap<String, u32>,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}
