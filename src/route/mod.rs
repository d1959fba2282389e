//! # Routing
//!
//! Routes, middleware, declarations and the dispatching engine.

pub mod declaration;
pub mod engine;
pub mod group;
pub mod middleware;
#[allow(clippy::module_inception)]
pub mod route;

pub use declaration::{parse_paths, ActionDeclaration, ParamList, RouteDeclaration};
pub use engine::{Engine, EngineBuilder, EngineConfig};
pub use group::Group;
pub use middleware::{Middleware, MiddlewareFuture, MiddlewareHandler};
pub use route::{Route, PANIC_MESSAGE};
