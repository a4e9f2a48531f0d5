//! Query/form parameter builder for `Update` and `Select` (§9 "options as
//! functional mutators").

use std::collections::BTreeMap;

/// Fluent builder collecting well-known Solr request parameters into a
/// single map, serialised once at request time.
#[derive(Clone, Default, Debug)]
pub struct Options {
    params: BTreeMap<String, String>,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    pub fn query(mut self, q: impl Into<String>) -> Options {
        self.params.insert("q".into(), q.into());
        self
    }

    pub fn filter_query(mut self, fq: impl Into<String>) -> Options {
        self.params.insert("fq".into(), fq.into());
        self
    }

    pub fn rows(mut self, rows: u32) -> Options {
        self.params.insert("rows".into(), rows.to_string());
        self
    }

    pub fn start(mut self, start: u32) -> Options {
        self.params.insert("start".into(), start.to_string());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Options {
        self.params.insert("sort".into(), sort.into());
        self
    }

    pub fn commit(mut self, commit: bool) -> Options {
        self.params.insert("commit".into(), commit.to_string());
        self
    }

    pub fn cursor(mut self, mark: impl Into<String>) -> Options {
        self.params.insert("cursorMark".into(), mark.into());
        self
    }

    pub fn route(mut self, route: impl Into<String>) -> Options {
        let route = route.into();
        if !route.is_empty() {
            self.params.insert("_route_".into(), route);
        }
        self
    }

    pub fn prefer_local_shards(mut self, prefer: bool) -> Options {
        self.params.insert("shards.preference".into(), format!("replica.location:local:{}", prefer));
        self
    }

    pub fn cluster_state_version(mut self, version: i32, collection: impl Into<String>) -> Options {
        self.params
            .insert("_stateVer_".into(), format!("{}:{}", collection.into(), version));
        self
    }

    pub fn delete_stream_body(mut self, filter: impl Into<String>) -> Options {
        self.params.insert("stream.body".into(), format!("<delete><query>{}</query></delete>", filter.into()));
        self
    }

    /// The route value set by [`Options::route`], if any.
    pub fn get_route(&self) -> Option<&str> {
        self.params.get("_route_").map(|s| s.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
