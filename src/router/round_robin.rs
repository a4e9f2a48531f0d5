use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;

use crate::error::Error;
use crate::router::require_candidates;
use crate::router::Clock;
use crate::router::Outcome;
use crate::router::Router;
use crate::router::SystemClock;

/// Picks the candidate never selected before, or the one selected longest
/// ago. `record` is a no-op; selection order is the only state this
/// policy tracks.
pub struct RoundRobinRouter {
    last_selected: Mutex<HashMap<String, Instant>>,
    clock: Arc<dyn Clock>,
}

impl RoundRobinRouter {
    pub fn new() -> RoundRobinRouter {
        RoundRobinRouter::with_clock(Arc::new(SystemClock))
    }

    /// Like [`RoundRobinRouter::new`], but with an injectable [`Clock`] so
    /// selection order can be pinned deterministically in tests.
    pub fn with_clock(clock: Arc<dyn Clock>) -> RoundRobinRouter {
        RoundRobinRouter {
            last_selected: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

impl Default for RoundRobinRouter {
    fn default() -> RoundRobinRouter {
        RoundRobinRouter::new()
    }
}

impl Router for RoundRobinRouter {
    fn get_uri<'a>(&self, candidates: &'a [String]) -> Result<&'a str, Error> {
        require_candidates(candidates)?;
        let mut last_selected = self.last_selected.lock().expect("round-robin lock was poisoned");
        let mut oldest: Option<(&str, Instant)> = None;
        let mut chosen: Option<&'a str> = None;
        for candidate in candidates {
            match last_selected.get(candidate.as_str()) {
                None => {
                    chosen = Some(candidate);
                    break;
                }
                Some(&at) => {
                    if oldest.map(|(_, oldest_at)| at < oldest_at).unwrap_or(true) {
                        oldest = Some((candidate, at));
                    }
                }
            }
        }
        let chosen = chosen.or_else(|| oldest.map(|(uri, _)| uri)).expect("candidates is non-empty");
        last_selected.insert(chosen.to_string(), self.clock.now());
        Ok(chosen)
    }

    fn record(&self, _uri: &str, _outcome: Outcome) {
        // selection timestamp already updated in get_uri
    }
}
