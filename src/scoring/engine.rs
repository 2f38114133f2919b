use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::db::models::{PickEntry, SeasonType, StandingEntry, WeeklyResult, WinnerRef};
use crate::db::Database;
use crate::keys;
use crate::scoreboard::{FetchError, ScoreboardProvider};

use super::{finality, tally, winners};

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("scoreboard fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("persistence failed: {0}")]
    Persistence(#[source] anyhow::Error),
}

/// Outcome of a single-week computation. `NotFinal` is an expected,
/// retryable state while games are still being played, not a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum WeekOutcome {
    NotFinal,
    Computed { week: u8, winners: Vec<WinnerRef> },
}

/// Coordinates one week end to end: fetch the slate, gate on finality,
/// tally every user's picks, resolve winners, persist the result and
/// fold it into the season ledger.
pub struct ComputeEngine {
    db: Database,
    scoreboard: Arc<dyn ScoreboardProvider>,
}

impl ComputeEngine {
    pub fn new(db: Database, scoreboard: Arc<dyn ScoreboardProvider>) -> Self {
        ComputeEngine { db, scoreboard }
    }

    pub async fn compute_week(
        &self,
        year: i32,
        season: SeasonType,
        week: u8,
    ) -> Result<WeekOutcome, ComputeError> {
        let events = self.scoreboard.fetch_week(year, week, season).await?;
        if !finality::all_final(&events) {
            debug!(
                "{}-{} W{}: slate not final yet ({} events)",
                year,
                season,
                week,
                events.len()
            );
            return Ok(WeekOutcome::NotFinal);
        }

        // Winner team per event. An event contributes only when it has a
        // declared winner with a resolvable team name.
        let winners_by_event: HashMap<String, String> = events
            .iter()
            .filter_map(|e| e.winning_team().map(|team| (e.id.clone(), team.to_string())))
            .collect();

        let display_names = self
            .db
            .load_display_names()
            .map_err(ComputeError::Persistence)?;

        let key = keys::weekly_key(year, season.as_str(), week);
        let legacy_key = keys::legacy_weekly_key(year, week);
        let pick_rows = self
            .db
            .load_pick_entries(&key, &legacy_key)
            .map_err(ComputeError::Persistence)?;

        let mut by_user: BTreeMap<String, HashMap<String, PickEntry>> = BTreeMap::new();
        for row in pick_rows {
            by_user
                .entry(row.uid)
                .or_default()
                .insert(row.entry_key, row.entry);
        }

        let mut standings = Vec::with_capacity(by_user.len());
        for (uid, entries) in &by_user {
            let Some(entry) = keys::resolve_week_entry(entries, &key, &legacy_key) else {
                continue;
            };
            let display_name = display_names
                .get(uid)
                .filter(|n| !n.is_empty())
                .cloned()
                .or_else(|| {
                    entry
                        .display_name()
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                })
                .or_else(|| Some("Unknown".to_string()));
            standings.push(StandingEntry {
                uid: uid.clone(),
                display_name,
                wins: tally::correct_picks(&winners_by_event, entry),
                tie_breaker: entry.tie_breaker(),
                tb_diff: None,
                tb_over: false,
            });
        }

        let last_game_total = winners::last_game_total(&events);
        let resolution = winners::resolve(&standings, last_game_total);
        let winners_out: Vec<WinnerRef> = resolution
            .winners
            .iter()
            .map(|w| WinnerRef {
                uid: w.uid.clone(),
                display_name: w.display_name.clone(),
            })
            .collect();

        // Full standings are persisted; tiebreak diagnostics exist only on
        // the entries that reached resolution.
        let enriched_by_uid: HashMap<&str, &StandingEntry> = resolution
            .enriched
            .iter()
            .map(|e| (e.uid.as_str(), e))
            .collect();
        let standings_out: Vec<StandingEntry> = standings
            .iter()
            .map(|s| {
                enriched_by_uid
                    .get(s.uid.as_str())
                    .map(|e| (*e).clone())
                    .unwrap_or_else(|| s.clone())
            })
            .collect();

        let result = WeeklyResult {
            year,
            season: season.as_str().to_string(),
            week,
            last_game_total,
            computed_at: Utc::now(),
            standings: standings_out,
            winners: winners_out.clone(),
        };
        self.db
            .upsert_weekly_result(&key, &result)
            .map_err(ComputeError::Persistence)?;
        self.db
            .apply_week_to_ledger(
                &keys::season_key(year, season.as_str()),
                &keys::week_label(week),
                &result.standings,
            )
            .map_err(ComputeError::Persistence)?;

        info!(
            "{} computed: {} players, total {:?}, {} winner(s)",
            key,
            result.standings.len(),
            last_game_total,
            winners_out.len()
        );
        Ok(WeekOutcome::Computed {
            week,
            winners: winners_out,
        })
    }

    /// Bulk driver: weeks ascending, skipping any week that already has a
    /// persisted result. A failed week is logged and does not abort the
    /// remaining weeks.
    pub async fn run_season(
        &self,
        year: i32,
        season: SeasonType,
        max_weeks: u8,
    ) -> Vec<(u8, Vec<WinnerRef>)> {
        let mut computed = Vec::new();
        for week in 1..=max_weeks {
            let id = keys::weekly_key(year, season.as_str(), week);
            match self.db.weekly_result_exists(&id) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    error!("Week {} existence check failed: {}", week, e);
                    continue;
                }
            }
            match self.compute_week(year, season, week).await {
                Ok(WeekOutcome::Computed { week, winners }) => computed.push((week, winners)),
                Ok(WeekOutcome::NotFinal) => {}
                Err(e) => error!("Week {} compute failed: {}", week, e),
            }
        }
        computed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Competitor, Event, GameState, Side};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;

    struct StubScoreboard {
        events: Vec<Event>,
    }

    #[async_trait]
    impl ScoreboardProvider for StubScoreboard {
        fn name(&self) -> &str {
            "stub"
        }

        async fn fetch_week(
            &self,
            _year: i32,
            _week: u8,
            _season: SeasonType,
        ) -> Result<Vec<Event>, FetchError> {
            Ok(self.events.clone())
        }
    }

    struct DownScoreboard;

    #[async_trait]
    impl ScoreboardProvider for DownScoreboard {
        fn name(&self) -> &str {
            "down"
        }

        async fn fetch_week(
            &self,
            _year: i32,
            _week: u8,
            _season: SeasonType,
        ) -> Result<Vec<Event>, FetchError> {
            Err(FetchError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    fn final_game(id: &str, hour: u32, home: (&str, i64), away: (&str, i64)) -> Event {
        Event {
            id: id.into(),
            date: Utc.with_ymd_and_hms(2025, 9, 7, hour, 0, 0).unwrap(),
            state: GameState::Post,
            competitors: vec![
                Competitor {
                    team: Some(home.0.into()),
                    side: Some(Side::Home),
                    score: Some(home.1),
                    winner: home.1 > away.1,
                },
                Competitor {
                    team: Some(away.0.into()),
                    side: Some(Side::Away),
                    score: Some(away.1),
                    winner: away.1 > home.1,
                },
            ],
        }
    }

    fn live_game(id: &str, hour: u32) -> Event {
        Event {
            id: id.into(),
            date: Utc.with_ymd_and_hms(2025, 9, 7, hour, 0, 0).unwrap(),
            state: GameState::In,
            competitors: vec![],
        }
    }

    /// Two finished games; the late one totals 44.
    fn finished_slate() -> Vec<Event> {
        vec![
            final_game("g1", 13, ("Bills", 24), ("Jets", 10)),
            final_game("g2", 20, ("Chiefs", 24), ("Lions", 20)),
        ]
    }

    fn engine_with(events: Vec<Event>) -> (ComputeEngine, Database) {
        let db = Database::open(":memory:").unwrap();
        let engine = ComputeEngine::new(db.clone(), Arc::new(StubScoreboard { events }));
        (engine, db)
    }

    #[tokio::test]
    async fn test_not_final_week_performs_no_writes() {
        let mut events = finished_slate();
        events.push(live_game("g3", 21));
        let (engine, db) = engine_with(events);
        db.save_pick_entry(
            "u1",
            "2025-reg-W1",
            &PickEntry::from_json(json!({ "g1": "Bills" })),
        )
        .unwrap();

        let outcome = engine
            .compute_week(2025, SeasonType::Reg, 1)
            .await
            .unwrap();

        assert_eq!(outcome, WeekOutcome::NotFinal);
        assert!(!db.weekly_result_exists("2025-reg-W1").unwrap());
        assert!(db.load_season_leaderboard("2025-reg").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compute_week_end_to_end() {
        let (engine, db) = engine_with(finished_slate());
        db.upsert_user("u1", "Alice").unwrap();
        db.upsert_user("u2", "Bob").unwrap();

        // u1 and u2 both go 2-for-2; u1's tiebreaker stays under the
        // actual total of 44 while u2 goes over.
        db.save_pick_entry(
            "u1",
            "2025-reg-W1",
            &PickEntry::from_json(json!({ "g1": "Bills", "g2": "Chiefs", "tieBreaker": 41 })),
        )
        .unwrap();
        // u2 still submits under the legacy key form.
        db.save_pick_entry(
            "u2",
            "2025-W1",
            &PickEntry::from_json(json!({ "g1": "Bills", "g2": "Chiefs", "tieBreaker": 45 })),
        )
        .unwrap();

        let outcome = engine
            .compute_week(2025, SeasonType::Reg, 1)
            .await
            .unwrap();

        let WeekOutcome::Computed { week, winners } = outcome else {
            panic!("expected a computed week");
        };
        assert_eq!(week, 1);
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].uid, "u1");
        assert_eq!(winners[0].display_name.as_deref(), Some("Alice"));

        let stored = db.get_weekly_result("2025-reg-W1").unwrap().unwrap();
        assert_eq!(stored.last_game_total, Some(44));
        assert_eq!(stored.standings.len(), 2);
        let u2 = stored.standings.iter().find(|s| s.uid == "u2").unwrap();
        assert_eq!(u2.wins, 2);
        assert!(u2.tb_over);

        let board = db.load_season_leaderboard("2025-reg").unwrap();
        assert_eq!(board["u1"].total_wins, 2);
        assert_eq!(board["u2"].weekly_wins["W1"], 2);
    }

    #[tokio::test]
    async fn test_recompute_does_not_double_count_ledger() {
        let (engine, db) = engine_with(finished_slate());
        db.upsert_user("u1", "Alice").unwrap();
        db.save_pick_entry(
            "u1",
            "2025-reg-W1",
            &PickEntry::from_json(json!({ "g1": "Bills", "tieBreaker": 41 })),
        )
        .unwrap();

        engine.compute_week(2025, SeasonType::Reg, 1).await.unwrap();
        engine.compute_week(2025, SeasonType::Reg, 1).await.unwrap();

        let board = db.load_season_leaderboard("2025-reg").unwrap();
        assert_eq!(board["u1"].weeks_played, 1);
        assert_eq!(board["u1"].total_wins, 1);
    }

    #[tokio::test]
    async fn test_display_name_fallback_chain() {
        let (engine, db) = engine_with(finished_slate());
        // u1 has no users row but an embedded name; u2 has neither.
        db.save_pick_entry(
            "u1",
            "2025-reg-W1",
            &PickEntry::from_json(json!({ "g1": "Bills", "displayName": "Cara" })),
        )
        .unwrap();
        db.save_pick_entry(
            "u2",
            "2025-reg-W1",
            &PickEntry::from_json(json!({ "g1": "Jets" })),
        )
        .unwrap();

        engine.compute_week(2025, SeasonType::Reg, 1).await.unwrap();

        let stored = db.get_weekly_result("2025-reg-W1").unwrap().unwrap();
        let name = |uid: &str| {
            stored
                .standings
                .iter()
                .find(|s| s.uid == uid)
                .unwrap()
                .display_name
                .clone()
        };
        assert_eq!(name("u1").as_deref(), Some("Cara"));
        assert_eq!(name("u2").as_deref(), Some("Unknown"));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates() {
        let db = Database::open(":memory:").unwrap();
        let engine = ComputeEngine::new(db, Arc::new(DownScoreboard));

        let err = engine
            .compute_week(2025, SeasonType::Reg, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ComputeError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_run_season_skips_persisted_weeks() {
        let (engine, db) = engine_with(finished_slate());
        db.save_pick_entry(
            "u1",
            "2025-reg-W1",
            &PickEntry::from_json(json!({ "g1": "Bills", "tieBreaker": 41 })),
        )
        .unwrap();

        engine.compute_week(2025, SeasonType::Reg, 1).await.unwrap();
        let board_before = db.load_season_leaderboard("2025-reg").unwrap();

        // Weeks 1 and 2: week 1 already persisted, so only week 2 computes.
        let computed = engine.run_season(2025, SeasonType::Reg, 2).await;
        assert_eq!(computed.len(), 1);
        assert_eq!(computed[0].0, 2);

        // Week 1's ledger contribution was applied exactly once, and week 2
        // (no picks for u1) added nothing.
        let board_after = db.load_season_leaderboard("2025-reg").unwrap();
        assert_eq!(board_after["u1"], board_before["u1"]);
        assert_eq!(board_after["u1"].weeks_played, 1);
    }

    #[tokio::test]
    async fn test_run_season_survives_fetch_failures() {
        let db = Database::open(":memory:").unwrap();
        let engine = ComputeEngine::new(db, Arc::new(DownScoreboard));

        let computed = engine.run_season(2025, SeasonType::Reg, 3).await;
        assert!(computed.is_empty());
    }
}
