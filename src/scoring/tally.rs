use std::collections::HashMap;

use crate::db::models::PickEntry;

/// Count how many of a user's picks name the recorded winner.
///
/// Only events present in `winners_by_event` can score; an event with no
/// declared winner contributes nothing no matter what was picked.
/// Matching is exact on the team display name.
pub fn correct_picks(winners_by_event: &HashMap<String, String>, entry: &PickEntry) -> u32 {
    entry
        .game_picks()
        .filter(|(event_id, pick)| {
            winners_by_event
                .get(*event_id)
                .map(|winner| winner == pick)
                .unwrap_or(false)
        })
        .count() as u32
}
