//! `tracing` subscriber setup.
//!
//! Grounded on `jsp_transport::logging`: a small set of named
//! initialization functions rather than leaving subscriber construction to
//! every caller.

use tracing_subscriber::{fmt, EnvFilter};

/// Pretty, verbose, human-readable output for local development.
pub fn init_dev_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    fmt().with_env_filter(filter).with_target(true).with_line_number(true).init();
}

/// Compact JSON output, `info` by default, suitable for piping into a log
/// aggregator.
pub fn init_prod_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().json().with_env_filter(filter).init();
}

/// Build a subscriber from an explicit filter directive, e.g.
/// `"rdt_sim=trace,tokio=warn"`.
pub fn init_logging_with_filter(directive: &str) {
    let filter = EnvFilter::new(directive);
    fmt().with_env_filter(filter).init();
}
