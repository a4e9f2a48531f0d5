//! Crate-wide metrics registration entry point (§4.J).
//!
//! Each component declares its own `lazy_static` collectors next to the
//! code that updates them (`http::client`, `coordination::zookeeper`,
//! `retry`); this module only wires their `register_metrics` calls
//! together behind one `Registry`.

use prometheus::Registry;
use slog::Logger;

/// Registers every component's metrics with `registry`. Individual
/// registration failures are logged and otherwise ignored; this function
/// never panics.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    crate::http::client::register_metrics(logger, registry);
    crate::coordination::zookeeper::register_metrics(logger, registry);
    crate::retry::register_metrics(logger, registry);
}
