//! A client for SolrCloud-style sharded, replicated search clusters:
//! watches a coordination service for topology changes, routes document
//! updates and queries to the right shard/replica, and retries across
//! nodes on failure.
//!
//! The public entry point is [`facade::SolrCloudClient`]; everything else
//! is exposed so callers can assemble the pieces differently (a custom
//! [`router::Router`], a stub [`http::client::Transport`] in tests).

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate slog;

mod cluster_state;
mod config;
mod coordination;
mod error;
mod facade;
mod hash;
mod http;
mod key;
mod locator;
mod metrics;
mod retry;
mod router;
mod store;

#[cfg(debug_assertions)]
pub mod mock;

pub use crate::cluster_state::ClusterProps;
pub use crate::cluster_state::ClusterState;
pub use crate::cluster_state::Collection;
pub use crate::cluster_state::Replica;
pub use crate::cluster_state::Shard;
pub use crate::cluster_state::UrlScheme;
pub use crate::config::Config;
pub use crate::config::HttpConfig;
pub use crate::config::RetryConfig;
pub use crate::config::RouterConfig;
pub use crate::config::RouterPolicy;
pub use crate::config::ZkConfig;
pub use crate::error::Error;
pub use crate::error::ErrorKind;
pub use crate::error::Result;
pub use crate::facade::SolrCloudClient;
pub use crate::http::client::Transport;
pub use crate::http::options::Options;
pub use crate::http::response::SelectResponse;
pub use crate::http::response::UpdateResponse;
pub use crate::key::CompositeKey;
pub use crate::metrics::register_metrics;
pub use crate::router::AdaptiveRouter;
pub use crate::router::Clock;
pub use crate::router::Outcome;
pub use crate::router::RoundRobinRouter;
pub use crate::router::Router;
