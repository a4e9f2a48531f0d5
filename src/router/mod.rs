//! Node selection policies (§4.E).

mod adaptive;
mod round_robin;

pub use adaptive::AdaptiveRouter;
pub use round_robin::RoundRobinRouter;

use std::time::Instant;

use crate::error::Error;
use crate::error::ErrorKind;

/// Source of "now" for [`RoundRobinRouter`], injectable so its selection
/// order can be pinned in tests instead of depending on real elapsed time
/// (§9 "injectable RNG / clock" determinism requirement).
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock, backed by `Instant::now()`.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Outcome of a single request, fed back into a [`Router`] after the call.
#[derive(Clone, Copy, Debug)]
pub struct Outcome {
    pub elapsed: std::time::Duration,
    pub status_code: Option<u16>,
    pub is_error: bool,
}

impl Outcome {
    pub fn new(elapsed: std::time::Duration, status_code: Option<u16>, is_error: bool) -> Outcome {
        Outcome {
            elapsed,
            status_code,
            is_error,
        }
    }

    /// A call counts as an error when the transport failed or the status
    /// code falls outside `[200, 400)`.
    pub fn is_failure(&self) -> bool {
        self.is_error
            || !matches!(self.status_code, Some(code) if (200..400).contains(&code))
    }
}

/// A node-selection policy: pick one candidate, then later record how it
/// performed.
pub trait Router: Send + Sync {
    /// Pick one URI out of `candidates`. Fails with `InvalidArgument` when
    /// `candidates` is empty.
    fn get_uri<'a>(&self, candidates: &'a [String]) -> Result<&'a str, Error>;

    /// Record the outcome of a call made against `uri`.
    fn record(&self, uri: &str, outcome: Outcome);
}

pub(crate) fn require_candidates(candidates: &[String]) -> Result<(), Error> {
    if candidates.is_empty() {
        return Err(ErrorKind::InvalidArgument("candidate list is empty".into()).into());
    }
    Ok(())
}
