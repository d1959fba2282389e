//! # Engine
//!
//! Registry of routes and middleware plus the database handle. Dispatches
//! one request at a time per task: resolve method + path, run the route
//! inside a fresh `Context`, render the envelope.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;

use crate::action::{ActionFuture, SharedHandler};
use crate::core::{ApiError, ApiResult, Context, Envelope, Reply, Request, TxPhase};
use crate::db::Database;
use crate::observability::{MetricsRegistry, MetricsSnapshot};
use crate::query::DEFAULT_SELECT_LIMIT;

use super::declaration::{parse_paths, RouteDeclaration};
use super::group::Group;
use super::middleware::Middleware;
use super::route::Route;

/// Engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Row count for SELECT actions when neither the request nor the
    /// template gives one
    #[serde(default = "default_select_limit")]
    pub default_select_limit: u64,
}

fn default_select_limit() -> u64 {
    DEFAULT_SELECT_LIMIT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_select_limit: default_select_limit(),
        }
    }
}

type RouteKey = (Method, String);

/// Trailing slashes are not significant, except for the root
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Request dispatcher
pub struct Engine {
    routes: HashMap<RouteKey, Route>,
    middleware: Vec<Middleware>,
    database: Option<Arc<dyn Database>>,
    config: EngineConfig,
    metrics: MetricsRegistry,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn route(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes.get(&(method.clone(), normalize_path(path)))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Registered method + path pairs, sorted
    pub fn route_keys(&self) -> Vec<(Method, String)> {
        let mut keys: Vec<_> = self.routes.keys().cloned().collect();
        keys.sort_by(|a, b| (a.1.as_str(), a.0.as_str()).cmp(&(b.1.as_str(), b.0.as_str())));
        keys
    }

    /// Handle one request, keeping only the envelope
    pub async fn handle(&self, request: Request) -> Envelope {
        self.respond(request).await.envelope
    }

    /// Handle one request; the reply carries headers and raw body set by
    /// a successful route
    pub async fn respond(&self, request: Request) -> Reply {
        self.metrics.increment_requests();
        let route = match self.route(request.method(), request.path()) {
            Some(route) => route,
            None => {
                self.metrics.increment_not_found();
                self.metrics.increment_failures();
                tracing::debug!(method = %request.method(), path = request.path(), "no route");
                return Envelope::error(&ApiError::NotFound).into();
            }
        };

        let mut ctx = Context::new(request, self.database.clone());
        let span = tracing::info_span!(
            "request",
            id = %ctx.request_id(),
            method = %ctx.request().method(),
            path = ctx.request().path(),
        );

        async {
            let result = route.run(&mut ctx, &self.middleware, &self.config).await;
            match ctx.transaction_phase().await {
                TxPhase::Committed => self.metrics.increment_commits(),
                TxPhase::RolledBack => self.metrics.increment_rollbacks(),
                _ => {}
            }
            let envelope = match result {
                Ok(()) => Envelope::success(ctx.take_data()),
                Err(e) => {
                    self.metrics.increment_failures();
                    ctx.clear_data();
                    Envelope::error(&e)
                }
            };
            tracing::info!(
                status = envelope.status,
                elapsed_ms = ctx.elapsed_ms() as u64,
                "request finished"
            );
            Reply::new(envelope, ctx.take_response())
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("routes", &self.routes.len())
            .field("middleware", &self.middleware.len())
            .field("database", &self.database.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for engine construction
#[derive(Default)]
pub struct EngineBuilder {
    routes: HashMap<RouteKey, Route>,
    middleware: Vec<Middleware>,
    database: Option<Arc<dyn Database>>,
    config: EngineConfig,
    functions: HashMap<String, SharedHandler>,
    declarations: Vec<Value>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Database used for request transactions
    pub fn database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append middleware; runs in registration order
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Register a route. A later registration for the same method + path
    /// replaces the earlier one.
    pub fn route(mut self, method: Method, path: &str, route: Route) -> Self {
        let key = (method, normalize_path(path));
        if self.routes.insert(key.clone(), route).is_some() {
            tracing::warn!(method = %key.0, path = %key.1, "route replaced");
        }
        self
    }

    /// Shorthand for a route with a single query action writing to `data`
    pub fn query_route(
        self,
        method: Method,
        path: &str,
        sql: &str,
        params: &str,
    ) -> ApiResult<Self> {
        let mut route = Route::new();
        route.add_query(sql, params)?;
        Ok(self.route(method, path, route))
    }

    /// Register routes and middleware under one group name
    pub fn group<F>(self, name: impl Into<String>, configure: F) -> ApiResult<Self>
    where
        F: FnOnce(Group) -> ApiResult<Group>,
    {
        let group = configure(Group::new(self, name))?;
        Ok(group.into_builder())
    }

    /// Named handler for `func` entries in route declarations
    pub fn function<F>(mut self, name: impl Into<String>, callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(callback));
        self
    }

    /// Queue a `paths` object; parsed and built by [`EngineBuilder::build`]
    pub fn declarations(mut self, paths: Value) -> Self {
        self.declarations.push(paths);
        self
    }

    /// Parse declarations and build the engine
    pub fn build(self) -> ApiResult<Engine> {
        let EngineBuilder {
            mut routes,
            middleware,
            database,
            config,
            functions,
            declarations,
        } = self;

        if config.default_select_limit == 0 {
            return Err(ApiError::construction("default_select_limit must be positive"));
        }

        for paths in &declarations {
            for decl in parse_paths(paths)? {
                register_declaration(&mut routes, &decl, &functions)?;
            }
        }

        tracing::debug!(
            routes = routes.len(),
            middleware = middleware.len(),
            "engine built"
        );
        Ok(Engine {
            routes,
            middleware,
            database,
            config,
            metrics: MetricsRegistry::new(),
        })
    }
}

fn register_declaration(
    routes: &mut HashMap<RouteKey, Route>,
    decl: &RouteDeclaration,
    functions: &HashMap<String, SharedHandler>,
) -> ApiResult<()> {
    let route = decl.build(functions)?;
    for method in &decl.methods {
        let key = (method.clone(), normalize_path(&decl.path));
        if routes.insert(key, route.clone()).is_some() {
            tracing::warn!(method = %method, path = %decl.path, "route replaced");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatabase;
    use serde_json::json;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/books/"), "/books");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
    }

    #[tokio::test]
    async fn test_dispatch_and_not_found() {
        let db = MemoryDatabase::new().with_rows("FROM books", vec![json!({"id": 1})]);
        let engine = Engine::builder()
            .database(Arc::new(db.clone()))
            .query_route(Method::GET, "/books", "SELECT id FROM books", "")
            .unwrap()
            .build()
            .unwrap();

        let ok = engine.handle(Request::new(Method::GET, "/books/")).await;
        assert_eq!(
            ok.into_value(),
            json!({"status": 0, "message": "success", "data": [{"id": 1}]})
        );

        let missing = engine.handle(Request::new(Method::POST, "/books")).await;
        assert_eq!(missing.status, 404);
        assert_eq!(missing.message, "resource not found");
        assert_eq!(db.begins(), 1);

        let metrics = engine.metrics();
        assert_eq!(metrics.requests_handled, 2);
        assert_eq!(metrics.routes_not_found, 1);
        assert_eq!(metrics.transactions_committed, 1);
    }

    #[tokio::test]
    async fn test_declarations_expand_methods() {
        let engine = Engine::builder()
            .declarations(json!({"GET,POST /x": {"query": "SELECT 1 FROM dual"}}))
            .build()
            .unwrap();
        assert_eq!(engine.route_count(), 2);
        assert!(engine.route(&Method::POST, "/x").is_some());
        assert_eq!(
            engine.route_keys(),
            vec![(Method::GET, "/x".to_string()), (Method::POST, "/x".to_string())]
        );
    }

    #[test]
    fn test_build_rejects_bad_config() {
        let err = Engine::builder()
            .config(EngineConfig {
                default_select_limit: 0,
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ApiError::Construction(_)));
    }

    #[tokio::test]
    async fn test_without_database_queries_fail_503() {
        let engine = Engine::builder()
            .query_route(Method::GET, "/t", "SELECT * FROM t", "")
            .unwrap()
            .build()
            .unwrap();
        let envelope = engine.handle(Request::new(Method::GET, "/t")).await;
        assert_eq!(envelope.status, 503);
        assert_eq!(envelope.message, "database connection failed");
    }

    fn export(ctx: &mut Context) -> ActionFuture<'_> {
        Box::pin(async move {
            ctx.set_content_type("text/csv")?;
            ctx.set_header("X-Rows", "1")?;
            ctx.set_body("id\n1\n");
            Ok(serde_json::Value::Null)
        })
    }

    fn export_then_fail(ctx: &mut Context) -> ActionFuture<'_> {
        Box::pin(async move {
            ctx.set_body("partial");
            Err(ApiError::bad_request("export refused"))
        })
    }

    #[tokio::test]
    async fn test_reply_carries_overrides_only_on_success() {
        let mut ok = Route::new();
        ok.add_func(export);
        let mut failing = Route::new();
        failing.add_func(export_then_fail);
        let engine = Engine::builder()
            .route(Method::GET, "/export", ok)
            .route(Method::GET, "/broken", failing)
            .build()
            .unwrap();

        let reply = engine.respond(Request::new(Method::GET, "/export")).await;
        assert!(reply.envelope.is_success());
        assert_eq!(reply.overrides.content_type(), Some("text/csv"));
        assert_eq!(reply.overrides.headers()["x-rows"], "1");
        assert_eq!(reply.overrides.body().map(|b| &b[..]), Some(&b"id\n1\n"[..]));

        let reply = engine.respond(Request::new(Method::GET, "/broken")).await;
        assert_eq!(reply.envelope.status, 400);
        assert!(reply.overrides.is_empty());
    }
}
