//! # Core Module
//!
//! Per-request state and the error model shared by every layer.
//!
//! ## Design Principles
//!
//! - One `Context` per request, never shared across requests
//! - At most one database transaction per `Context`, opened lazily
//! - Every failure is an `ApiError` with a fixed status class

pub mod context;
pub mod error;
pub mod json;
pub mod request;
pub mod response;
pub mod session;
pub mod transaction;

pub use context::Context;
pub use error::{ApiError, ApiResult, Status};
pub use request::Request;
pub use response::{Envelope, Reply, ResponseOverride};
pub use session::Session;
pub use transaction::{TxOutcome, TxPhase, TxSlot};
