use crate::db::models::{Event, Side, StandingEntry};

/// Combined final score of the week's last game, the tiebreak target.
///
/// "Last" is by kickoff time under a stable ascending sort, so two games
/// kicking off together resolve by their original slate order. Missing
/// scores count as zero; an event with no competition data yields `None`.
pub fn last_game_total(events: &[Event]) -> Option<i64> {
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by_key(|e| e.date);
    let last = *sorted.last()?;
    if last.competitors.is_empty() {
        return None;
    }
    let score = |side| last.competitor(side).and_then(|c| c.score).unwrap_or(0);
    Some(score(Side::Home) + score(Side::Away))
}

/// Output of tiebreak resolution: the winning subset, plus the full
/// max-wins candidate set with tiebreak diagnostics attached.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub winners: Vec<StandingEntry>,
    pub enriched: Vec<StandingEntry>,
}

/// Price Is Right tiebreak over the max-wins candidates: closest guess
/// without going over wins; if every candidate went over, the smallest
/// overage wins. Ties on distance share the win.
///
/// A missing or unparseable tiebreaker counts as over with an infinite
/// distance, so it can only win when nobody has a finite overage. A
/// missing actual total behaves as zero, making every positive guess
/// over and handing the win to the smallest guess.
pub fn resolve(standings: &[StandingEntry], last_game_total: Option<i64>) -> Resolution {
    if standings.is_empty() {
        return Resolution {
            winners: vec![],
            enriched: vec![],
        };
    }

    let max_wins = standings.iter().map(|s| s.wins).max().unwrap_or(0);
    let total = last_game_total.unwrap_or(0) as f64;

    let enriched: Vec<StandingEntry> = standings
        .iter()
        .filter(|s| s.wins == max_wins)
        .map(|s| {
            let mut entry = s.clone();
            match s.tie_breaker {
                Some(tb) => {
                    let diff = total - tb;
                    entry.tb_diff = Some(diff.abs());
                    entry.tb_over = diff < 0.0;
                }
                None => {
                    entry.tb_diff = Some(f64::INFINITY);
                    entry.tb_over = true;
                }
            }
            entry
        })
        .collect();

    let non_over: Vec<&StandingEntry> = enriched.iter().filter(|s| !s.tb_over).collect();
    let pool: Vec<&StandingEntry> = if non_over.is_empty() {
        enriched.iter().collect()
    } else {
        non_over
    };

    let min_diff = pool
        .iter()
        .filter_map(|s| s.tb_diff)
        .fold(f64::INFINITY, f64::min);
    let winners = pool
        .into_iter()
        .filter(|s| s.tb_diff == Some(min_diff))
        .cloned()
        .collect();

    Resolution { winners, enriched }
}
