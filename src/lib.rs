//! actionapi - declarative JSON API engine
//!
//! Routes are ordered lists of actions. An action is either a native
//! callback or a parameterized SQL template; every action in a request
//! shares one lazily opened transaction, committed when the route
//! succeeds and rolled back otherwise.
//!
//! - `query`: SQL template parsing, filters, sorting, paging
//! - `core`: request, session, context, transaction slot, envelope
//! - `db`: database seam with MySQL and in-memory backends
//! - `action`: native and query actions, parameter grammar
//! - `route`: routes, middleware, declarations, the engine
//! - `http_server`: axum adapter
//! - `observability`: tracing setup and counters
//! - `cli`: `serve` and `check` commands

pub mod action;
pub mod cli;
pub mod core;
pub mod db;
pub mod http_server;
pub mod observability;
pub mod query;
pub mod route;

pub use action::{Action, ActionFuture};
pub use crate::core::{ApiError, ApiResult, Context, Envelope, Reply, Request, Status};
pub use db::{Database, MemoryDatabase, MySqlDatabase};
pub use http_server::{HttpServer, HttpServerConfig};
pub use route::{Engine, EngineBuilder, EngineConfig, Middleware, Route};
