//! Bounded retry with exponential backoff and node rotation (§4.G).
//!
//! Grounded in `solr-http-retry.go`/`solr_http_retry.go`: only `NotFound`
//! short-circuits the loop; every other error (including `ClientError`
//! for a non-404 4xx) is retried up to the attempt budget — preserved
//! bug-for-bug, see `DESIGN.md`.

use std::thread;
use std::time::Duration;

use prometheus::Counter;
use prometheus::Registry;
use slog::Logger;

use crate::error::Error;
use crate::error::ErrorKind;

lazy_static! {
    static ref RETRY_ATTEMPTS_COUNT: Counter = Counter::new(
        "cluster_search_client_retry_attempts",
        "Number of retry attempts issued across all operations"
    ).expect("Failed to create cluster_search_client_retry_attempts counter");

    static ref RETRY_HEALED_COUNT: Counter = Counter::new(
        "cluster_search_client_retry_healed",
        "Number of operations that succeeded only after at least one retry"
    ).expect("Failed to create cluster_search_client_retry_healed counter");
}

/// Attempts to register metrics with the Registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(RETRY_ATTEMPTS_COUNT.clone())) {
        debug!(logger, "Failed to register RETRY_ATTEMPTS_COUNT"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(RETRY_HEALED_COUNT.clone())) {
        debug!(logger, "Failed to register RETRY_HEALED_COUNT"; "error" => ?err);
    }
}

pub struct Retrier {
    retries: u32,
    backoff: Duration,
    logger: Logger,
}

impl Retrier {
    pub fn new(retries: u32, backoff: Duration, logger: Logger) -> Retrier {
        Retrier { retries, backoff, logger }
    }

    /// Run `attempt`, which is given the zero-based attempt number and the
    /// candidate index to use (`i mod candidates.len()`), up to the retry
    /// budget. Returns immediately on `NotFound`; sleeps with doubling
    /// backoff between any other failure.
    pub fn run<T>(&self, candidates_len: usize, mut attempt: impl FnMut(u32, usize) -> Result<T, Error>) -> Result<T, Error> {
        if candidates_len == 0 {
            return Err(ErrorKind::InvalidArgument("candidate list is empty".into()).into());
        }
        let mut backoff = self.backoff;
        let mut last_error = None;
        for i in 0..self.retries {
            if i > 0 {
                RETRY_ATTEMPTS_COUNT.inc();
            }
            match attempt(i, (i as usize) % candidates_len) {
                Ok(value) => {
                    if i > 0 {
                        RETRY_HEALED_COUNT.inc();
                        info!(self.logger, "Operation healed after retries"; "attempt" => i);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if matches!(error.kind(), ErrorKind::NotFound) {
                        return Err(error);
                    }
                    debug!(self.logger, "Retrying after error"; "attempt" => i, "error" => %error);
                    last_error = Some(error);
                    if i + 1 < self.retries {
                        thread::sleep(backoff);
                        backoff *= 2;
                    }
                }
            }
        }
        Err(last_error.expect("retries is at least 1 so an error was recorded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::Discard;
    use slog::Logger as SlogLogger;
    use std::cell::RefCell;

    fn test_logger() -> Logger {
        SlogLogger::root(Discard, o!())
    }

    #[test]
    fn empty_candidates_fails_without_attempting() {
        let retrier = Retrier::new(3, Duration::from_millis(0), test_logger());
        let calls = RefCell::new(0);
        let result: Result<(), Error> = retrier.run(0, |_, _| {
            *calls.borrow_mut() += 1;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn not_found_short_circuits_after_one_attempt() {
        let retrier = Retrier::new(5, Duration::from_millis(0), test_logger());
        let calls = RefCell::new(0);
        let result: Result<(), Error> = retrier.run(2, |_, _| {
            *calls.borrow_mut() += 1;
            Err(ErrorKind::NotFound.into())
        });
        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn persistently_failing_server_is_called_exactly_retries_times() {
        let retrier = Retrier::new(4, Duration::from_millis(0), test_logger());
        let calls = RefCell::new(0);
        let result: Result<(), Error> = retrier.run(2, |_, _| {
            *calls.borrow_mut() += 1;
            Err(ErrorKind::Transport.into())
        });
        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 4);
    }

    #[test]
    fn succeeds_after_transient_failure() {
        let retrier = Retrier::new(3, Duration::from_millis(0), test_logger());
        let calls = RefCell::new(0);
        let result = retrier.run(1, |attempt, _| {
            *calls.borrow_mut() += 1;
            if attempt == 0 {
                Err(ErrorKind::Transport.into())
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(*calls.borrow(), 2);
    }
}
