//! Observability
//!
//! - `logger`: `tracing` subscriber setup
//! - `metrics`: engine-wide request and transaction counters

pub mod logger;
pub mod metrics;

pub use logger::{init_tracing, DEFAULT_FILTER};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
