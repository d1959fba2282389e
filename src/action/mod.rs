//! # Actions
//!
//! One unit of work within a route: a native callback or a declarative
//! query. Both write their result under an output property:
//!
//! - `$name` stores into the request's vars
//! - `name` (or a dotted path) stores into the response
//! - an empty property discards the result

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::core::{ApiResult, Context};
use crate::route::EngineConfig;

pub mod func;
pub mod param;
pub mod query;

pub use func::{ActionHandler, FuncAction, SharedHandler};
pub use param::{parse_params, Param};
pub use query::QueryAction;

/// Output property used when none is given
pub const DEFAULT_PROPERTY: &str = "data";

/// Boxed future returned by action callbacks
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = ApiResult<Value>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub enum ActionKind {
    Func(FuncAction),
    Query(QueryAction),
}

/// An action and the property its result is stored under
#[derive(Debug, Clone)]
pub struct Action {
    kind: ActionKind,
    property: String,
}

impl Action {
    /// Native callback action
    pub fn func<F>(callback: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> ActionFuture<'a> + Send + Sync + 'static,
    {
        Self::handler(Arc::new(callback))
    }

    /// Native action from a shared handler
    pub fn handler(handler: SharedHandler) -> Self {
        Self {
            kind: ActionKind::Func(FuncAction::new(handler)),
            property: DEFAULT_PROPERTY.to_string(),
        }
    }

    /// Declarative query action; fails on unsupported statements or
    /// malformed parameter lists
    pub fn query(sql: &str, params: &str) -> ApiResult<Self> {
        Ok(Self {
            kind: ActionKind::Query(QueryAction::new(sql, params)?),
            property: DEFAULT_PROPERTY.to_string(),
        })
    }

    /// Store the result under `property`
    pub fn assign_to(mut self, property: impl Into<String>) -> Self {
        self.property = property.into().trim().to_string();
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Declared parameters; native actions have none
    pub fn params(&self) -> &[Param] {
        match &self.kind {
            ActionKind::Func(_) => &[],
            ActionKind::Query(q) => q.params(),
        }
    }

    /// Execute and return the raw result
    pub async fn execute(&self, ctx: &mut Context, config: &EngineConfig) -> ApiResult<Value> {
        match &self.kind {
            ActionKind::Func(f) => f.execute(ctx).await,
            ActionKind::Query(q) => q.execute(ctx, config).await,
        }
    }

    /// Execute and store the result under the output property. A native
    /// action returning `null` stores nothing.
    pub async fn run(&self, ctx: &mut Context, config: &EngineConfig) -> ApiResult<()> {
        let value = self.execute(ctx, config).await?;
        if matches!(self.kind, ActionKind::Func(_)) && value.is_null() {
            return Ok(());
        }
        ctx.put(&self.property, value);
        Ok(())
    }
}
