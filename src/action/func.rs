//! Native callback actions.

use std::fmt;
use std::sync::Arc;

use super::ActionFuture;
use crate::core::{ApiResult, Context};

/// Callback seam for native actions
pub trait ActionHandler: Send + Sync {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> ActionFuture<'a>;
}

impl<F> ActionHandler for F
where
    F: for<'a> Fn(&'a mut Context) -> ActionFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> ActionFuture<'a> {
        self(ctx)
    }
}

/// Shared handle to a callback, also used for named functions in route
/// declarations
pub type SharedHandler = Arc<dyn ActionHandler>;

#[derive(Clone)]
pub struct FuncAction {
    handler: SharedHandler,
}

impl FuncAction {
    pub fn new(handler: SharedHandler) -> Self {
        Self { handler }
    }

    pub async fn execute(&self, ctx: &mut Context) -> ApiResult<serde_json::Value> {
        self.handler.call(ctx).await
    }
}

impl fmt::Debug for FuncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuncAction").finish_non_exhaustive()
    }
}
