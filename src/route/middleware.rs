//! Middleware Traits and Implementations
//!
//! Interceptors that run before a route's actions. Each one is gated:
//!
//! - group: an empty group applies to every route, otherwise only to routes
//!   using the same group
//! - secure: secure middleware only runs on secure routes
//!
//! The first middleware error aborts the request with that error's class.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::{ApiResult, Context};

use super::route::Route;

/// Boxed future returned by middleware
pub type MiddlewareFuture<'a> = Pin<Box<dyn Future<Output = ApiResult<()>> + Send + 'a>>;

/// Middleware trait for request interception
pub trait MiddlewareHandler: Send + Sync {
    /// Inspect or enrich the context; an error aborts the route
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareFuture<'a>;
}

impl<F> MiddlewareHandler for F
where
    F: for<'a> Fn(&'a mut Context) -> MiddlewareFuture<'a> + Send + Sync,
{
    fn handle<'a>(&'a self, ctx: &'a mut Context) -> MiddlewareFuture<'a> {
        self(ctx)
    }
}

/// A gated middleware
#[derive(Clone)]
pub struct Middleware {
    handler: Arc<dyn MiddlewareHandler>,
    group: String,
    secure: bool,
}

impl Middleware {
    /// Middleware from a closure
    pub fn new<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> MiddlewareFuture<'a> + Send + Sync + 'static,
    {
        Self::from_handler(callback)
    }

    /// Middleware from any handler type
    pub fn from_handler(handler: impl MiddlewareHandler + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            group: String::new(),
            secure: false,
        }
    }

    /// Only apply to routes using `group`
    pub fn for_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Only apply to secure routes
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Whether this middleware runs for `route`
    pub fn applies_to(&self, route: &Route) -> bool {
        let group_matches = self.group.is_empty() || self.group == route.group();
        let secure_matches = !self.secure || route.is_secure();
        group_matches && secure_matches
    }

    pub async fn run(&self, ctx: &mut Context) -> ApiResult<()> {
        self.handler.handle(ctx).await
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("group", &self.group)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}
