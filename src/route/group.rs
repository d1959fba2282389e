//! Route Groups
//!
//! A named slice of the engine: every route registered through a [`Group`]
//! uses the group, and every middleware added through it only runs for
//! that group's routes.
//!
//! ```ignore
//! let builder = Engine::builder().group("admin", |g| {
//!     Ok(g.middleware(Middleware::new(check_admin))
//!         .query("/admin/users", "SELECT id, name FROM users", "")?
//!         .post("/admin/purge", purge))
//! })?;
//! ```

use axum::http::Method;

use crate::action::ActionFuture;
use crate::core::{ApiResult, Context};

use super::engine::EngineBuilder;
use super::middleware::Middleware;
use super::route::Route;

/// Registration scope that tags routes and middleware with one group
pub struct Group {
    builder: EngineBuilder,
    name: String,
}

impl Group {
    pub(crate) fn new(builder: EngineBuilder, name: impl Into<String>) -> Self {
        Self {
            builder,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a route under this group
    pub fn route(mut self, method: Method, path: &str, route: Route) -> Self {
        let route = route.use_group(self.name.clone());
        self.builder = self.builder.route(method, path, route);
        self
    }

    /// Secure variant of [`Group::route`]
    pub fn secure_route(self, method: Method, path: &str, route: Route) -> Self {
        self.route(method, path, route.secure())
    }

    /// POST route with a single native action writing to `data`
    pub fn post<F>(self, path: &str, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        let mut route = Route::new();
        route.add_func(callback);
        self.route(Method::POST, path, route)
    }

    /// POST route with a single query action writing to `data`
    pub fn query(self, path: &str, sql: &str, params: &str) -> ApiResult<Self> {
        let mut route = Route::new();
        route.add_query(sql, params)?;
        Ok(self.route(Method::POST, path, route))
    }

    /// Middleware that only runs for routes of this group
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        let middleware = middleware.for_group(self.name.clone());
        self.builder = self.builder.middleware(middleware);
        self
    }

    pub(crate) fn into_builder(self) -> EngineBuilder {
        self.builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Engine;
    use serde_json::{json, Value};

    fn whoami(ctx: &mut Context) -> ActionFuture<'_> {
        Box::pin(async move { Ok(ctx.session().get("role").cloned().unwrap_or(Value::Null)) })
    }

    fn mark_admin(ctx: &mut Context) -> crate::route::MiddlewareFuture<'_> {
        Box::pin(async move {
            ctx.session_mut().put("role", json!("admin"));
            Ok(())
        })
    }

    #[test]
    fn test_group_tags_routes() {
        let engine = Engine::builder()
            .group("admin", |g| {
                assert_eq!(g.name(), "admin");
                Ok(g.post("/admin/whoami", whoami)
                    .query("/admin/users", "SELECT id FROM users", "")?
                    .secure_route(Method::DELETE, "/admin/users", Route::new()))
            })
            .unwrap()
            .build()
            .unwrap();

        let route = engine.route(&Method::POST, "/admin/whoami").unwrap();
        assert_eq!(route.group(), "admin");
        assert!(!route.is_secure());
        assert_eq!(engine.route(&Method::POST, "/admin/users").unwrap().group(), "admin");
        assert!(engine.route(&Method::DELETE, "/admin/users").unwrap().is_secure());
    }

    #[tokio::test]
    async fn test_group_middleware_skips_other_routes() {
        let engine = Engine::builder()
            .group("admin", |g| {
                Ok(g.middleware(Middleware::new(mark_admin))
                    .post("/admin/whoami", whoami))
            })
            .unwrap()
            .route(Method::POST, "/whoami", {
                let mut route = Route::new();
                route.add_func(whoami);
                route
            })
            .build()
            .unwrap();

        let admin = engine
            .handle(crate::core::Request::new(Method::POST, "/admin/whoami"))
            .await;
        assert_eq!(admin.fields.get("data"), Some(&json!("admin")));

        let public = engine
            .handle(crate::core::Request::new(Method::POST, "/whoami"))
            .await;
        assert!(public.is_success());
        assert!(public.fields.get("data").is_none());
    }

    #[test]
    fn test_group_query_error_propagates() {
        let err = Engine::builder()
            .group("reports", |g| g.query("/r", "TRUNCATE reports", ""))
            .err()
            .unwrap();
        assert!(matches!(err, crate::core::ApiError::Construction(_)));
    }
}
