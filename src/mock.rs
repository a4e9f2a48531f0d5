//! Test doubles for the crate's trait boundaries (§4.L), grounded in
//! `coordinator::mock::MockBackend`'s "proxy synchronized access to mock
//! attributes" shape.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use crossbeam_channel::bounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use rand::rngs::mock::StepRng;

use crate::coordination::CoordinationBackend;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::http::client::RawResponse;
use crate::http::client::Transport;
use crate::router::Clock;

/// An in-memory [`CoordinationBackend`]: data and children are set
/// directly by the test, and `fire(path)` wakes any watch previously
/// armed on that path.
#[derive(Default)]
pub struct MockCoordinationBackend {
    data: Mutex<HashMap<String, Vec<u8>>>,
    children: Mutex<HashMap<String, Vec<String>>>,
    watches: Mutex<HashMap<String, Sender<()>>>,
}

impl MockCoordinationBackend {
    pub fn new() -> MockCoordinationBackend {
        MockCoordinationBackend::default()
    }

    pub fn set_data(&self, path: impl Into<String>, body: Vec<u8>) {
        self.data.lock().unwrap().insert(path.into(), body);
    }

    pub fn set_children(&self, path: impl Into<String>, children: Vec<String>) {
        self.children.lock().unwrap().insert(path.into(), children);
    }

    /// Wake whichever watch is currently armed on `path`, if any.
    pub fn fire(&self, path: &str) {
        if let Some(sender) = self.watches.lock().unwrap().remove(path) {
            let _ = sender.send(());
        }
    }

    fn arm(&self, path: &str) -> Receiver<()> {
        let (sender, receiver) = bounded(1);
        self.watches.lock().unwrap().insert(path.to_string(), sender);
        receiver
    }
}

impl CoordinationBackend for MockCoordinationBackend {
    fn get_data(&self, path: &str) -> Result<(Vec<u8>, i32), Error> {
        self.data
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .map(|body| (body, 0))
            .ok_or_else(|| ErrorKind::NotFound.into())
    }

    fn get_children(&self, path: &str) -> Result<Vec<String>, Error> {
        self.children
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ErrorKind::NotFound.into())
    }

    fn get_data_w(&self, path: &str) -> Result<(Vec<u8>, i32, Receiver<()>), Error> {
        let (body, version) = self.get_data(path)?;
        Ok((body, version, self.arm(path)))
    }

    fn get_children_w(&self, path: &str) -> Result<(Vec<String>, Receiver<()>), Error> {
        let children = self.get_children(path)?;
        Ok((children, self.arm(path)))
    }
}

/// A scripted [`Transport`]: each call pops the next queued response (or
/// error) regardless of which operation or URL it came from.
pub struct MockTransport {
    responses: Mutex<Vec<Result<RawResponse, ErrorKind>>>,
}

impl MockTransport {
    pub fn new(responses: Vec<Result<RawResponse, ErrorKind>>) -> MockTransport {
        MockTransport { responses: Mutex::new(responses) }
    }

    fn next(&self) -> Result<RawResponse, Error> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("MockTransport ran out of scripted responses");
        }
        match responses.remove(0) {
            Ok(raw) => Ok(raw),
            Err(kind) => Err(kind.into()),
        }
    }
}

impl Transport for MockTransport {
    fn post_json(&self, _url: &str, _query: &[(String, String)], _body: &[u8], _auth: Option<(&str, &str)>) -> Result<RawResponse, Error> {
        self.next()
    }

    fn post_form(&self, _url: &str, _form: &[(String, String)], _auth: Option<(&str, &str)>) -> Result<RawResponse, Error> {
        self.next()
    }
}

/// A [`Clock`] whose `now()` only advances when the test tells it to, so
/// [`crate::router::RoundRobinRouter`]'s selection order can be pinned
/// instead of depending on how fast the test happens to run.
pub struct MockClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl MockClock {
    pub fn new() -> MockClock {
        MockClock { base: Instant::now(), offset_nanos: AtomicU64::new(0) }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_nanos.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }
}

impl Default for MockClock {
    fn default() -> MockClock {
        MockClock::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.base + Duration::from_nanos(self.offset_nanos.load(Ordering::Relaxed))
    }
}

/// A deterministic stand-in for `rand::thread_rng()`: same inputs always
/// produce the same permutation, so shuffle order can be asserted on
/// directly instead of just checked for "is a permutation".
pub fn deterministic_rng() -> StepRng {
    StepRng::new(0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_coordination_backend_reports_not_found_for_unset_paths() {
        let backend = MockCoordinationBackend::new();
        assert!(backend.get_data("missing").is_err());
        assert!(backend.get_children("missing").is_err());
    }

    #[test]
    fn mock_coordination_backend_fires_armed_watch() {
        let backend = MockCoordinationBackend::new();
        backend.set_data("state.json", b"{}".to_vec());
        let (_body, _version, watch) = backend.get_data_w("state.json").unwrap();
        backend.fire("state.json");
        assert!(watch.recv_timeout(std::time::Duration::from_millis(100)).is_ok());
    }

    #[test]
    fn mock_transport_returns_scripted_responses_in_order() {
        let transport = MockTransport::new(vec![
            Ok(RawResponse { status: 200, body: b"{}".to_vec() }),
            Err(ErrorKind::Transport),
        ]);
        let first = transport.post_json("http://node", &[], &[], None).unwrap();
        assert_eq!(first.status, 200);
        assert!(transport.post_form("http://node", &[], None).is_err());
    }

    #[test]
    fn mock_clock_only_advances_when_told_to() {
        let clock = MockClock::new();
        let first = clock.now();
        let second = clock.now();
        assert_eq!(first, second);
        clock.advance(Duration::from_secs(1));
        assert!(clock.now() > second);
    }

    #[test]
    fn deterministic_rng_produces_the_same_shuffle_every_time() {
        use rand::seq::SliceRandom;
        let mut items = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        items.shuffle(&mut deterministic_rng());
        let first_run = items.clone();
        let mut items = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        items.shuffle(&mut deterministic_rng());
        assert_eq!(items, first_run);
    }
}
