use crate::db::models::{Event, GameState};

/// Whether every game on the slate has gone final.
///
/// An empty slate is never final: no events means an upstream hiccup or
/// an out-of-range week, and the week must not be scored on it.
pub fn all_final(events: &[Event]) -> bool {
    !events.is_empty() && events.iter().all(|e| e.state == GameState::Post)
}
