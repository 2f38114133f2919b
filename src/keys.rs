//! Composite document keys for weekly and seasonal artifacts.

use std::collections::HashMap;

/// `"2025-reg-W3"` — the key form used for pick entries and weekly results.
pub fn weekly_key(year: i32, season: &str, week: u8) -> String {
    format!("{year}-{season}-W{week}")
}

/// `"2025-W3"` — the pre-season-type key form still present in old pick
/// documents. Migration shim: read as a lookup fallback, never written.
pub fn legacy_weekly_key(year: i32, week: u8) -> String {
    format!("{year}-W{week}")
}

/// `"2025-reg"` — season ledger document key.
pub fn season_key(year: i32, season: &str) -> String {
    format!("{year}-{season}")
}

/// `"W3"` — per-week label inside a season ledger record.
pub fn week_label(week: u8) -> String {
    format!("W{week}")
}

/// Pick the entry for a week out of a user's keyed documents: the
/// composite key wins, the legacy key is consulted as a fallback.
pub fn resolve_week_entry<'a, T>(
    entries: &'a HashMap<String, T>,
    key: &str,
    legacy_key: &str,
) -> Option<&'a T> {
    entries.get(key).or_else(|| entries.get(legacy_key))
}
