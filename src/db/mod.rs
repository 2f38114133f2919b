use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub mod models;
use models::{LedgerRecord, PickEntry, StandingEntry, WeeklyResult};

/// Thread-safe SQLite handle (single connection behind a mutex).
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// One stored pick row: a user's document for one weekly key.
#[derive(Debug, Clone)]
pub struct PickRow {
    pub uid: String,
    pub entry_key: String,
    pub entry: PickEntry,
}

impl Database {
    /// Open (or create) the SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run schema migrations (idempotent).
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────────────

    pub fn upsert_user(&self, uid: &str, display_name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (uid, display_name) VALUES (?1, ?2)
             ON CONFLICT(uid) DO UPDATE SET display_name=excluded.display_name",
            params![uid, display_name],
        )?;
        Ok(())
    }

    /// All known display names, keyed by uid.
    pub fn load_display_names(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT uid, display_name FROM users")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<String, String>>>()?;
        Ok(rows)
    }

    // ── Picks ────────────────────────────────────────────────────────────────

    /// Write a user's pick document for one weekly key.
    ///
    /// The first submission timestamp is preserved across resubmissions;
    /// `lastEditedAt` always moves. Both are mirrored into the stored
    /// document so readers see the same bookkeeping keys the web client
    /// writes.
    pub fn save_pick_entry(&self, uid: &str, entry_key: &str, entry: &PickEntry) -> Result<()> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(
                "SELECT submitted_at FROM picks WHERE uid=?1 AND entry_key=?2",
                params![uid, entry_key],
                |row| row.get(0),
            )
            .optional()?;
        let submitted_at = existing.unwrap_or_else(|| now.to_rfc3339());

        let mut doc = entry.0.clone();
        doc.insert("submittedAt".into(), Value::String(submitted_at.clone()));
        doc.insert("lastEditedAt".into(), Value::String(now.to_rfc3339()));

        conn.execute(
            "INSERT INTO picks (uid, entry_key, document, submitted_at, last_edited_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(uid, entry_key) DO UPDATE SET
                document=excluded.document,
                last_edited_at=excluded.last_edited_at",
            params![
                uid,
                entry_key,
                Value::Object(doc).to_string(),
                submitted_at,
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load every user's pick rows stored under either weekly key form.
    /// Rows with unparseable documents are skipped with a warning.
    pub fn load_pick_entries(&self, key: &str, legacy_key: &str) -> Result<Vec<PickRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT uid, entry_key, document FROM picks
             WHERE entry_key IN (?1, ?2) ORDER BY uid",
        )?;
        let raw = stmt
            .query_map(params![key, legacy_key], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rows = Vec::with_capacity(raw.len());
        for (uid, entry_key, document) in raw {
            match serde_json::from_str::<Value>(&document) {
                Ok(value @ Value::Object(_)) => rows.push(PickRow {
                    uid,
                    entry_key,
                    entry: PickEntry::from_json(value),
                }),
                _ => warn!("Skipping malformed pick document for {uid} ({entry_key})"),
            }
        }
        Ok(rows)
    }

    // ── Weekly results ───────────────────────────────────────────────────────

    pub fn weekly_result_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM weekly_results WHERE id=?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Merge-style upsert keyed by the composite id. Writing identical
    /// content twice leaves the stored row equivalent; new content
    /// updates the computed columns in place.
    pub fn upsert_weekly_result(&self, id: &str, result: &WeeklyResult) -> Result<()> {
        let standings = serde_json::to_string(&result.standings)
            .context("Failed to serialize standings")?;
        let winners =
            serde_json::to_string(&result.winners).context("Failed to serialize winners")?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO weekly_results
                (id, year, season, week, last_game_total, computed_at, standings, winners)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                last_game_total=excluded.last_game_total,
                computed_at=excluded.computed_at,
                standings=excluded.standings,
                winners=excluded.winners",
            params![
                id,
                result.year,
                result.season,
                result.week,
                result.last_game_total,
                result.computed_at,
                standings,
                winners,
            ],
        )?;
        Ok(())
    }

    pub fn get_weekly_result(&self, id: &str) -> Result<Option<WeeklyResult>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT year, season, week, last_game_total, computed_at, standings, winners
             FROM weekly_results WHERE id=?1",
            params![id],
            map_weekly_result,
        )
        .optional()
        .context("Failed to read weekly result")
    }

    /// All computed weeks for one season, ascending by week number.
    pub fn list_weekly_results(&self, year: i32, season: &str) -> Result<Vec<WeeklyResult>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT year, season, week, last_game_total, computed_at, standings, winners
             FROM weekly_results WHERE year=?1 AND season=?2 ORDER BY week ASC",
        )?;
        let results = stmt
            .query_map(params![year, season], map_weekly_result)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(results)
    }

    // ── Season ledger ────────────────────────────────────────────────────────

    /// Fold one week's standings into the cumulative season ledger.
    ///
    /// Idempotent per (user, week): a week label already present in the
    /// user's history means the week was applied before, and that user
    /// is skipped rather than double-counted.
    pub fn apply_week_to_ledger(
        &self,
        season_id: &str,
        week_label: &str,
        standings: &[StandingEntry],
    ) -> Result<()> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        for s in standings {
            let existing: Option<LedgerRecord> = conn
                .query_row(
                    "SELECT weeks_played, total_wins, best_week_wins, weekly_wins, display_name
                     FROM season_leaderboard WHERE season_id=?1 AND uid=?2",
                    params![season_id, &s.uid],
                    map_ledger_record,
                )
                .optional()?;

            let mut rec = existing.unwrap_or_default();
            if rec.weekly_wins.contains_key(week_label) {
                debug!(
                    "Ledger {}: {} already applied for {}, skipping",
                    season_id, week_label, s.uid
                );
                continue;
            }

            rec.weeks_played += 1;
            rec.total_wins += s.wins;
            rec.best_week_wins = rec.best_week_wins.max(s.wins);
            rec.weekly_wins.insert(week_label.to_string(), s.wins);
            if let Some(name) = s.display_name.as_deref().filter(|n| !n.is_empty()) {
                rec.display_name = Some(name.to_string());
            }

            conn.execute(
                "INSERT INTO season_leaderboard
                    (season_id, uid, weeks_played, total_wins, best_week_wins,
                     weekly_wins, display_name, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(season_id, uid) DO UPDATE SET
                    weeks_played=excluded.weeks_played,
                    total_wins=excluded.total_wins,
                    best_week_wins=excluded.best_week_wins,
                    weekly_wins=excluded.weekly_wins,
                    display_name=excluded.display_name,
                    updated_at=excluded.updated_at",
                params![
                    season_id,
                    &s.uid,
                    rec.weeks_played,
                    rec.total_wins,
                    rec.best_week_wins,
                    serde_json::to_string(&rec.weekly_wins)?,
                    rec.display_name,
                    now,
                ],
            )?;
        }
        Ok(())
    }

    /// All ledger records for one season, keyed by uid.
    pub fn load_season_leaderboard(&self, season_id: &str) -> Result<BTreeMap<String, LedgerRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT uid, weeks_played, total_wins, best_week_wins, weekly_wins, display_name
             FROM season_leaderboard WHERE season_id=?1 ORDER BY uid",
        )?;
        let rows = stmt
            .query_map(params![season_id], |row| {
                let uid: String = row.get(0)?;
                let weekly_wins: String = row.get(4)?;
                Ok((
                    uid,
                    LedgerRecord {
                        weeks_played: row.get(1)?,
                        total_wins: row.get(2)?,
                        best_week_wins: row.get(3)?,
                        weekly_wins: serde_json::from_str(&weekly_wins).unwrap_or_default(),
                        display_name: row.get(5)?,
                    },
                ))
            })?
            .collect::<rusqlite::Result<BTreeMap<String, LedgerRecord>>>()?;
        Ok(rows)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_weekly_result(row: &rusqlite::Row) -> rusqlite::Result<WeeklyResult> {
    let standings: String = row.get(5)?;
    let winners: String = row.get(6)?;
    Ok(WeeklyResult {
        year: row.get(0)?,
        season: row.get(1)?,
        week: row.get(2)?,
        last_game_total: row.get(3)?,
        computed_at: row.get(4)?,
        standings: serde_json::from_str(&standings).unwrap_or_default(),
        winners: serde_json::from_str(&winners).unwrap_or_default(),
    })
}

fn map_ledger_record(row: &rusqlite::Row) -> rusqlite::Result<LedgerRecord> {
    let weekly_wins: String = row.get(3)?;
    Ok(LedgerRecord {
        weeks_played: row.get(0)?,
        total_wins: row.get(1)?,
        best_week_wins: row.get(2)?,
        weekly_wins: serde_json::from_str(&weekly_wins).unwrap_or_default(),
        display_name: row.get(4)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    uid          TEXT PRIMARY KEY,
    display_name TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS picks (
    uid            TEXT NOT NULL,
    entry_key      TEXT NOT NULL,
    document       TEXT NOT NULL,
    submitted_at   TEXT NOT NULL,
    last_edited_at TEXT NOT NULL,
    PRIMARY KEY (uid, entry_key)
);

CREATE TABLE IF NOT EXISTS weekly_results (
    id              TEXT PRIMARY KEY,
    year            INTEGER NOT NULL,
    season          TEXT    NOT NULL,
    week            INTEGER NOT NULL,
    last_game_total INTEGER,
    computed_at     TEXT    NOT NULL,
    standings       TEXT    NOT NULL,
    winners         TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS season_leaderboard (
    season_id      TEXT    NOT NULL,
    uid            TEXT    NOT NULL,
    weeks_played   INTEGER NOT NULL DEFAULT 0,
    total_wins     INTEGER NOT NULL DEFAULT 0,
    best_week_wins INTEGER NOT NULL DEFAULT 0,
    weekly_wins    TEXT    NOT NULL DEFAULT '{}',
    display_name   TEXT,
    updated_at     TEXT    NOT NULL,
    PRIMARY KEY (season_id, uid)
);

CREATE INDEX IF NOT EXISTS idx_picks_entry_key ON picks(entry_key);
CREATE INDEX IF NOT EXISTS idx_weekly_results_season ON weekly_results(year, season);
"#;
