//! Structured logging setup
//!
//! `tracing` subscriber with an `EnvFilter`. `RUST_LOG` wins over the
//! filter passed in, which wins over the default.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "actionapi=info,tower_http=info";

/// Pick the filter directives: `RUST_LOG`, then `fallback`, then the default
pub fn filter_directives(env: Option<&str>, fallback: Option<&str>) -> String {
    env.filter(|s| !s.trim().is_empty())
        .or(fallback)
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init_tracing(filter: Option<&str>) -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(env.as_deref(), filter);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
