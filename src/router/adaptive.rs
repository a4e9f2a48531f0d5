use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use crate::error::Error;
use crate::router::require_candidates;
use crate::router::Outcome;
use crate::router::Router;

/// Per-URI ring buffer of the last `recency` outcomes.
struct History {
    timings: Vec<Duration>,
    errors: Vec<bool>,
    offset: usize,
}

impl History {
    fn new(recency: usize) -> History {
        History {
            timings: vec![Duration::from_secs(0); recency],
            errors: vec![false; recency],
            offset: 0,
        }
    }

    fn record(&mut self, elapsed: Duration, is_error: bool) {
        self.timings[self.offset] = elapsed;
        self.errors[self.offset] = is_error;
        self.offset = (self.offset + 1) % self.timings.len();
    }

    fn error_count(&self) -> usize {
        self.errors.iter().filter(|&&e| e).count()
    }

    fn median_latency(&self) -> Duration {
        let mut sorted = self.timings.clone();
        sorted.sort();
        sorted[sorted.len() / 2]
    }
}

/// Sorts candidates by `(errorCount asc, medianLatency asc)` using each
/// URI's ring buffer of recent outcomes; URIs with no history yet sort as
/// if they had zero errors and zero latency.
pub struct AdaptiveRouter {
    recency: usize,
    history: RwLock<HashMap<String, History>>,
}

impl AdaptiveRouter {
    pub fn new(recency: usize) -> AdaptiveRouter {
        AdaptiveRouter {
            recency: recency.max(1),
            history: RwLock::new(HashMap::new()),
        }
    }
}

impl Router for AdaptiveRouter {
    fn get_uri<'a>(&self, candidates: &'a [String]) -> Result<&'a str, Error> {
        require_candidates(candidates)?;
        let history = self.history.read().expect("adaptive router lock was poisoned");
        let empty = History::new(self.recency);
        let mut ranked: Vec<&'a String> = candidates.iter().collect();
        ranked.sort_by(|a, b| {
            let a = history.get(a.as_str()).unwrap_or(&empty);
            let b = history.get(b.as_str()).unwrap_or(&empty);
            a.error_count()
                .cmp(&b.error_count())
                .then_with(|| a.median_latency().cmp(&b.median_latency()))
        });
        Ok(ranked[0])
    }

    fn record(&self, uri: &str, outcome: Outcome) {
        let mut history = self.history.write().expect("adaptive router lock was poisoned");
        let entry = history
            .entry(uri.to_string())
            .or_insert_with(|| History::new(self.recency));
        entry.record(outcome.elapsed, outcome.is_failure());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(millis: u64, is_error: bool) -> Outcome {
        Outcome::new(Duration::from_millis(millis), Some(if is_error { 500 } else { 200 }), is_error)
    }

    #[test]
    fn rejects_empty_candidates() {
        let router = AdaptiveRouter::new(1);
        assert!(router.get_uri(&[]).is_err());
    }

    #[test]
    fn fewer_errors_wins() {
        let router = AdaptiveRouter::new(1);
        router.record("a", outcome(1, false));
        router.record("b", outcome(1, true));
        let candidates = vec!["a".to_string(), "b".to_string()];
        assert_eq!(router.get_uri(&candidates).unwrap(), "a");
    }

    #[test]
    fn equal_errors_break_tie_by_median_latency() {
        let router = AdaptiveRouter::new(1);
        router.record("a", outcome(1, false));
        router.record("c", outcome(1000, false));
        let candidates = vec!["c".to_string(), "a".to_string()];
        assert_eq!(router.get_uri(&candidates).unwrap(), "a");
    }

    #[test]
    fn unseen_candidates_start_with_zero_errors_and_latency() {
        let router = AdaptiveRouter::new(1);
        router.record("a", outcome(50, false));
        let candidates = vec!["a".to_string(), "never-seen".to_string()];
        assert_eq!(router.get_uri(&candidates).unwrap(), "never-seen");
    }
}
