//! Response cache for scoreboard queries.
//!
//! The TTL adapts to slate state: short while any game is live so final
//! whistles are picked up quickly, longer when everything is pre-game or
//! settled. The clock is injected so expiry is testable without waiting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::db::models::{Event, GameState};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// TTL selection per cached response.
#[derive(Debug, Clone, Copy)]
pub struct TtlPolicy {
    /// Applied while at least one game in the response is in progress.
    pub live: Duration,
    /// Applied while the slate is idle (pre-game or final).
    pub idle: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        TtlPolicy {
            live: Duration::from_secs(20),
            idle: Duration::from_secs(90),
        }
    }
}

impl TtlPolicy {
    fn for_events(&self, events: &[Event]) -> Duration {
        if events.iter().any(|e| e.state == GameState::In) {
            self.live
        } else {
            self.idle
        }
    }
}

struct CacheSlot {
    stored_at: Instant,
    ttl: Duration,
    events: Vec<Event>,
}

/// Per-(year, week, season-code) scoreboard response cache.
#[derive(Clone)]
pub struct ScoreboardCache {
    inner: Arc<Mutex<HashMap<(i32, u8, u8), CacheSlot>>>,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
}

impl ScoreboardCache {
    pub fn new(policy: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        ScoreboardCache {
            inner: Arc::new(Mutex::new(HashMap::new())),
            policy,
            clock,
        }
    }

    /// Serve a cached slate if it is still fresh.
    pub fn get(&self, key: (i32, u8, u8)) -> Option<Vec<Event>> {
        let inner = self.inner.lock().unwrap();
        let slot = inner.get(&key)?;
        if self.clock.now().duration_since(slot.stored_at) < slot.ttl {
            Some(slot.events.clone())
        } else {
            None
        }
    }

    /// Store a slate, picking the TTL from its live/idle state.
    pub fn put(&self, key: (i32, u8, u8), events: Vec<Event>) {
        let ttl = self.policy.for_events(&events);
        debug!(
            "Scoreboard cache: {:?} cached for {:?} ({} events)",
            key,
            ttl,
            events.len()
        );
        let mut inner = self.inner.lock().unwrap();
        inner.insert(
            key,
            CacheSlot {
                stored_at: self.clock.now(),
                ttl,
                events,
            },
        );
    }
}
