//! # Route Execution
//!
//! ```text
//! Begin ─▶ Middleware(0..n) ─▶ Action(0..n) ─▶ Commit | Rollback
//! ```
//!
//! Steps run strictly in order. The first error, or a panic inside a
//! middleware or action, skips everything after it and rolls back. An
//! action calling `Context::stop` ends the route early and still commits.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::action::{Action, ActionFuture};
use crate::core::{ApiError, ApiResult, Context, TxOutcome};

use super::engine::EngineConfig;
use super::middleware::Middleware;

/// Message returned for recovered panics
pub const PANIC_MESSAGE: &str = "internal server error";

/// Ordered actions bound to one method + path
#[derive(Debug, Clone, Default)]
pub struct Route {
    actions: Vec<Action>,
    secure: bool,
    group: String,
}

impl Route {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require secure middleware on this route
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Use only middleware that has no group or this group
    pub fn use_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Append an action
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Append an action in place and return it for further configuration
    pub fn add_action(&mut self, action: Action) -> &mut Action {
        self.actions.push(action);
        let last = self.actions.len() - 1;
        &mut self.actions[last]
    }

    /// Append a query action writing to `data`
    pub fn add_query(&mut self, sql: &str, params: &str) -> ApiResult<&mut Action> {
        let action = Action::query(sql, params)?;
        Ok(self.add_action(action))
    }

    /// Append a native action writing to `data`
    pub fn add_func<F>(&mut self, callback: F) -> &mut Action
    where
        F: for<'a> Fn(&'a mut Context) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        self.add_action(Action::func(callback))
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Run middleware and actions, then commit or roll back.
    ///
    /// Returns the first error. A commit failure is reported as the
    /// request's error.
    pub async fn run(
        &self,
        ctx: &mut Context,
        middleware: &[Middleware],
        config: &EngineConfig,
    ) -> ApiResult<()> {
        let outcome = AssertUnwindSafe(self.steps(ctx, middleware, config))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                tracing::error!(panic = %detail, "route panicked");
                Err(ApiError::internal(PANIC_MESSAGE))
            });

        match ctx.finish(outcome.is_ok()).await {
            Ok(TxOutcome::RolledBack) => {
                if let Err(e) = &outcome {
                    tracing::warn!(error = %e, "transaction rolled back");
                }
                outcome
            }
            Ok(_) => outcome,
            Err(commit_error) => outcome.and(Err(commit_error)),
        }
    }

    async fn steps(
        &self,
        ctx: &mut Context,
        middleware: &[Middleware],
        config: &EngineConfig,
    ) -> ApiResult<()> {
        for m in middleware.iter().filter(|m| m.applies_to(self)) {
            m.run(ctx).await?;
        }

        for (index, action) in self.actions.iter().enumerate() {
            tracing::debug!(index, property = action.property(), "running action");
            action.run(ctx, config).await?;
            if ctx.is_stopped() {
                tracing::debug!(index, "route stopped");
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Request;
    use crate::db::{DbError, MemoryDatabase};
    use axum::http::Method;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn ctx(db: &MemoryDatabase, body: Value) -> Context {
        Context::new(
            Request::new(Method::POST, "/").with_body(body),
            Some(Arc::new(db.clone())),
        )
    }

    #[tokio::test]
    async fn test_all_actions_commit() {
        let db = MemoryDatabase::new();
        let mut route = Route::new().action(
            Action::query("INSERT INTO orders (user) VALUES (?)", "user")
                .unwrap()
                .assign_to("$order_id"),
        );
        route
            .add_query("INSERT INTO lines (order_id) VALUES (?)", "$order_id")
            .unwrap();

        let mut ctx = ctx(&db, json!({"user": 1}));
        route.run(&mut ctx, &[], &EngineConfig::default()).await.unwrap();

        assert_eq!(db.commits(), 1);
        assert_eq!(db.statements()[1].args, vec![json!(1)]);
        assert_eq!(ctx.data().get("data"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_first_failure_stops_and_rolls_back() {
        let db = MemoryDatabase::new().with_failure("INTO orders", DbError::Query("boom".into()));
        let route = Route::new()
            .action(Action::query("INSERT INTO orders (user) VALUES (?)", "user").unwrap())
            .action(Action::query("DELETE FROM carts WHERE user = ?", "user").unwrap());

        let mut ctx = ctx(&db, json!({"user": 1}));
        let err = route
            .run(&mut ctx, &[], &EngineConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::QueryExecution));
        assert_eq!(db.statements().len(), 1);
        assert_eq!(db.rollbacks(), 1);
        assert_eq!(db.commits(), 0);
    }

    #[tokio::test]
    async fn test_empty_route_is_noop() {
        let db = MemoryDatabase::new();
        let mut ctx = ctx(&db, json!({}));
        Route::new()
            .run(&mut ctx, &[], &EngineConfig::default())
            .await
            .unwrap();
        assert_eq!(db.begins() + db.commits() + db.rollbacks(), 0);
    }

    #[tokio::test]
    async fn test_stop_skips_rest_and_commits() {
        let db = MemoryDatabase::new();
        let route = Route::new()
            .action(Action::query("UPDATE a SET x = 1", "").unwrap())
            .action(Action::func(|ctx| {
                Box::pin(async move {
                    ctx.stop();
                    Ok(Value::Null)
                })
            }))
            .action(Action::query("UPDATE b SET x = 1", "").unwrap());

        let mut ctx = ctx(&db, json!({}));
        route.run(&mut ctx, &[], &EngineConfig::default()).await.unwrap();
        assert_eq!(db.statements().len(), 1);
        assert_eq!(db.commits(), 1);
    }

    #[tokio::test]
    async fn test_panic_is_caught_and_rolled_back() {
        let db = MemoryDatabase::new();
        let route = Route::new()
            .action(Action::query("UPDATE a SET x = 1", "").unwrap())
            .action(Action::func(|_ctx| {
                Box::pin(async move {
                    if true {
                        panic!("bug in handler");
                    }
                    Ok(Value::Null)
                })
            }));

        let mut ctx = ctx(&db, json!({}));
        let err = route
            .run(&mut ctx, &[], &EngineConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.message(), PANIC_MESSAGE);
        assert_eq!(err.status().code(), 500);
        assert_eq!(db.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_middleware_error_aborts_before_actions() {
        let db = MemoryDatabase::new();
        let guard = Middleware::new(|ctx| {
            Box::pin(async move {
                match ctx.request().header("x-token") {
                    Some(_) => Ok(()),
                    None => Err(ApiError::unauthorized("missing token")),
                }
            })
        })
        .secure();
        let route = Route::new()
            .secure()
            .action(Action::query("DELETE FROM t", "").unwrap());

        let mut ctx = ctx(&db, json!({}));
        let err = route
            .run(&mut ctx, &[guard], &EngineConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.status().code(), 401);
        assert!(db.statements().is_empty());
    }
}
