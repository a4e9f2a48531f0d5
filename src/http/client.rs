use std::time::Duration;
use std::time::Instant;

use base64;
use failure::ResultExt;
use prometheus::CounterVec;
use prometheus::HistogramVec;
use prometheus::Opts;
use prometheus::HistogramOpts;
use prometheus::Registry;
use reqwest::blocking::Client as ReqwestClient;
use slog::Logger;

use crate::config::HttpConfig;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::http::options::Options;
use crate::http::response::SelectResponse;
use crate::http::response::UpdateResponse;
use crate::router::Outcome;
use crate::router::Router;

lazy_static! {
    static ref HTTP_OPS_COUNT: CounterVec = CounterVec::new(
        Opts::new("cluster_search_client_http_operations", "Number of HTTP operations issued"),
        &["endpoint"]
    ).expect("Failed to create cluster_search_client_http_operations counter");

    static ref HTTP_OP_ERRORS_COUNT: CounterVec = CounterVec::new(
        Opts::new("cluster_search_client_http_operation_errors", "Number of HTTP operations that failed"),
        &["endpoint"]
    ).expect("Failed to create cluster_search_client_http_operation_errors counter");

    static ref HTTP_OPS_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "cluster_search_client_http_operations_duration",
            "Duration (in seconds) of HTTP operations"
        ),
        &["endpoint"]
    ).expect("Failed to create cluster_search_client_http_operations_duration histogram");
}

/// Attempts to register metrics with the Registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(HTTP_OPS_COUNT.clone())) {
        debug!(logger, "Failed to register HTTP_OPS_COUNT"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(HTTP_OP_ERRORS_COUNT.clone())) {
        debug!(logger, "Failed to register HTTP_OP_ERRORS_COUNT"; "error" => ?err);
    }
    if let Err(err) = registry.register(Box::new(HTTP_OPS_DURATION.clone())) {
        debug!(logger, "Failed to register HTTP_OPS_DURATION"; "error" => ?err);
    }
}

/// A raw HTTP response, decoupled from the transport that produced it so
/// the [`Transport`] boundary can be mocked in tests.
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The HTTP transport boundary (§9: one of the three abstracted seams).
pub trait Transport: Send + Sync {
    fn post_json(&self, url: &str, query: &[(String, String)], body: &[u8], auth: Option<(&str, &str)>) -> Result<RawResponse, Error>;
    fn post_form(&self, url: &str, form: &[(String, String)], auth: Option<(&str, &str)>) -> Result<RawResponse, Error>;
}

/// A blocking `reqwest`-backed [`Transport`].
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<ReqwestTransport, Error> {
        let client = ReqwestClient::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .timeout(Duration::from_secs(config.read_timeout.max(config.write_timeout)))
            .build()
            .context(ErrorKind::Transport)?;
        Ok(ReqwestTransport { client })
    }

    fn basic_auth_header(auth: Option<(&str, &str)>) -> Option<String> {
        auth.map(|(user, password)| {
            let encoded = base64::encode(format!("{}:{}", user, password));
            format!("Basic {}", encoded)
        })
    }
}

impl Transport for ReqwestTransport {
    fn post_json(&self, url: &str, query: &[(String, String)], body: &[u8], auth: Option<(&str, &str)>) -> Result<RawResponse, Error> {
        let mut request = self
            .client
            .post(url)
            .query(query)
            .header("Content-Type", "application/json")
            .body(body.to_vec());
        if let Some(header) = Self::basic_auth_header(auth) {
            request = request.header("Authorization", header);
        }
        let response = request.send().context(ErrorKind::Transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().context(ErrorKind::Transport)?.to_vec();
        Ok(RawResponse { status, body })
    }

    fn post_form(&self, url: &str, form: &[(String, String)], auth: Option<(&str, &str)>) -> Result<RawResponse, Error> {
        let mut request = self.client.post(url).form(form);
        if let Some(header) = Self::basic_auth_header(auth) {
            request = request.header("Authorization", header);
        }
        let response = request.send().context(ErrorKind::Transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().context(ErrorKind::Transport)?.to_vec();
        Ok(RawResponse { status, body })
    }
}

/// Builds and issues Update/Select requests, classifies responses into
/// error kinds, and reports the outcome of each call to a [`Router`].
pub struct HttpClient {
    transport: Box<dyn Transport>,
    min_rf: u32,
    credentials: Option<(String, String)>,
}

impl HttpClient {
    pub fn new(transport: Box<dyn Transport>, min_rf: u32, credentials: Option<(String, String)>) -> HttpClient {
        HttpClient {
            transport,
            min_rf,
            credentials,
        }
    }

    fn auth(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(user, password)| (user.as_str(), password.as_str()))
    }

    /// Write `document` to `node`. `router` is notified of the outcome.
    pub fn update(
        &self,
        node: &str,
        collection: &str,
        single_doc: bool,
        document: &serde_json::Value,
        opts: &Options,
        router: &dyn Router,
    ) -> Result<UpdateResponse, Error> {
        let label = "update";
        HTTP_OPS_COUNT.with_label_values(&[label]).inc();
        let _timer = HTTP_OPS_DURATION.with_label_values(&[label]).start_timer();

        let mut url = format!("{}/{}/update", node.trim_end_matches('/'), collection);
        if single_doc {
            url.push_str("/json/docs");
        }
        let mut query = vec![("min_rf".to_string(), self.min_rf.to_string())];
        query.extend(opts.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let body = serde_json::to_vec(document).context(ErrorKind::Encode("update document"))?;
        let start = Instant::now();
        let result = self.transport.post_json(&url, &query, &body, self.auth());
        let elapsed = start.elapsed();

        let raw = match result {
            Ok(raw) => raw,
            Err(error) => {
                HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
                router.record(node, Outcome::new(elapsed, None, true));
                return Err(error);
            }
        };
        router.record(node, Outcome::new(elapsed, Some(raw.status), false));

        if raw.status == 404 {
            HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
            return Err(ErrorKind::NotFound.into());
        }
        if raw.status >= 500 {
            HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
            return Err(ErrorKind::InternalError(raw.status).into());
        }
        if raw.status >= 400 {
            HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
            let message = String::from_utf8_lossy(&raw.body).to_string();
            return Err(ErrorKind::ClientError(raw.status, message).into());
        }

        let decoded: UpdateResponse = serde_json::from_slice(&raw.body)
            .map_err(|_| ErrorKind::ParseError("update response".into()))?;
        if decoded.response_header.status != 0 {
            let message = decoded.error.map(|e| e.msg).unwrap_or_default();
            return Err(ErrorKind::ClientError(decoded.response_header.status as u16, message).into());
        }
        if decoded.response_header.rf < decoded.response_header.min_rf {
            return Err(ErrorKind::MinReplicationError(decoded.response_header.rf, decoded.response_header.min_rf).into());
        }
        Ok(decoded)
    }

    /// Query `collection`, selecting a node out of `candidates` via `router`.
    pub fn select(
        &self,
        candidates: &[String],
        collection: &str,
        opts: &Options,
        router: &dyn Router,
    ) -> Result<SelectResponse, Error> {
        crate::router::require_candidates(candidates)?;
        let node = router.get_uri(candidates)?.to_string();

        let label = "select";
        HTTP_OPS_COUNT.with_label_values(&[label]).inc();
        let _timer = HTTP_OPS_DURATION.with_label_values(&[label]).start_timer();

        let url = format!("{}/{}/select", node.trim_end_matches('/'), collection);
        let mut form = vec![("wt".to_string(), "json".to_string())];
        form.extend(opts.iter().map(|(k, v)| (k.to_string(), v.to_string())));

        let start = Instant::now();
        let result = self.transport.post_form(&url, &form, self.auth());
        let elapsed = start.elapsed();

        let raw = match result {
            Ok(raw) => raw,
            Err(error) => {
                HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
                router.record(&node, Outcome::new(elapsed, None, true));
                return Err(error);
            }
        };
        router.record(&node, Outcome::new(elapsed, Some(raw.status), false));

        if raw.status == 404 {
            HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
            return Err(ErrorKind::NotFound.into());
        }
        if raw.status >= 500 {
            HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
            return Err(ErrorKind::InternalError(raw.status).into());
        }
        if raw.status >= 400 {
            HTTP_OP_ERRORS_COUNT.with_label_values(&[label]).inc();
            let message = String::from_utf8_lossy(&raw.body).to_string();
            return Err(ErrorKind::ClientError(raw.status, message).into());
        }

        serde_json::from_slice(&raw.body).map_err(|_| ErrorKind::ParseError("select response".into()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RoundRobinRouter;
    use std::sync::Mutex;

    struct StubTransport {
        responses: Mutex<Vec<RawResponse>>,
    }

    impl Transport for StubTransport {
        fn post_json(&self, _url: &str, _query: &[(String, String)], _body: &[u8], _auth: Option<(&str, &str)>) -> Result<RawResponse, Error> {
            let mut responses = self.responses.lock().unwrap();
            let raw = responses.remove(0);
            Ok(RawResponse { status: raw.status, body: raw.body })
        }

        fn post_form(&self, _url: &str, _form: &[(String, String)], _auth: Option<(&str, &str)>) -> Result<RawResponse, Error> {
            let mut responses = self.responses.lock().unwrap();
            let raw = responses.remove(0);
            Ok(RawResponse { status: raw.status, body: raw.body })
        }
    }

    #[test]
    fn update_rejects_status_below_min_rf() {
        let body = br#"{"responseHeader":{"status":0,"rf":1,"min_rf":2}}"#.to_vec();
        let transport = StubTransport { responses: Mutex::new(vec![RawResponse { status: 200, body }]) };
        let client = HttpClient::new(Box::new(transport), 2, None);
        let router = RoundRobinRouter::new();
        let doc = serde_json::json!({"id": "k!x"});
        let result = client.update("http://node1", "mycollection", true, &doc, &Options::new(), &router);
        match result {
            Err(error) => assert!(matches!(error.kind(), ErrorKind::MinReplicationError(1, 2))),
            Ok(_) => panic!("expected MinReplicationError"),
        }
    }

    #[test]
    fn update_succeeds_when_rf_meets_floor() {
        let body = br#"{"responseHeader":{"status":0,"rf":2,"min_rf":2}}"#.to_vec();
        let transport = StubTransport { responses: Mutex::new(vec![RawResponse { status: 200, body }]) };
        let client = HttpClient::new(Box::new(transport), 2, None);
        let router = RoundRobinRouter::new();
        let doc = serde_json::json!({"id": "k!x"});
        let result = client.update("http://node1", "mycollection", true, &doc, &Options::new(), &router);
        assert!(result.is_ok());
    }

    #[test]
    fn select_classifies_404_as_not_found() {
        let transport = StubTransport { responses: Mutex::new(vec![RawResponse { status: 404, body: Vec::new() }]) };
        let client = HttpClient::new(Box::new(transport), 1, None);
        let router = RoundRobinRouter::new();
        let candidates = vec!["http://node1".to_string()];
        let result = client.select(&candidates, "mycollection", &Options::new(), &router);
        match result {
            Err(error) => assert!(matches!(error.kind(), ErrorKind::NotFound)),
            Ok(_) => panic!("expected NotFound"),
        }
    }

    #[test]
    fn select_rejects_empty_candidates() {
        let transport = StubTransport { responses: Mutex::new(Vec::new()) };
        let client = HttpClient::new(Box::new(transport), 1, None);
        let router = RoundRobinRouter::new();
        let result = client.select(&[], "mycollection", &Options::new(), &router);
        assert!(result.is_err());
    }
}
