//! Request Context
//!
//! Per-request state shared by the middleware and actions of one route:
//! the request view, session, `$`-vars, response fields and the
//! request transaction.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::ApiResult;
use super::json::{get_path_in, put_path};
use super::request::Request;
use super::response::ResponseOverride;
use super::session::Session;
use super::transaction::{TxOutcome, TxPhase, TxSlot};
use crate::db::{Database, ExecResult, Row};

/// Context carried through route execution
#[derive(Debug)]
pub struct Context {
    /// Request ID for tracing
    request_id: Uuid,

    request: Request,
    session: Session,

    /// `$`-prefixed scratch values
    vars: Map<String, Value>,

    /// Response fields
    data: Map<String, Value>,

    response: ResponseOverride,

    tx: TxSlot,
    stopped: bool,
    started_at: Instant,
}

impl Context {
    /// Create a context; `database` of `None` leaves the transaction detached
    pub fn new(request: Request, database: Option<Arc<dyn Database>>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            request,
            session: Session::new(),
            vars: Map::new(),
            data: Map::new(),
            response: ResponseOverride::new(),
            tx: TxSlot::new(database),
            stopped: false,
            started_at: Instant::now(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn vars(&self) -> &Map<String, Value> {
        &self.vars
    }

    /// Var by name, with or without the leading `$`
    pub fn var(&self, name: &str) -> Option<&Value> {
        get_path_in(&self.vars, name.strip_prefix('$').unwrap_or(name))
    }

    /// Response fields written so far
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Store a result under `property`.
    ///
    /// `$name` writes to vars, anything else to the response fields. Objects
    /// merge into existing objects; dotted names write nested paths. An empty
    /// property discards the value.
    pub fn put(&mut self, property: &str, value: Value) {
        if property.is_empty() {
            return;
        }
        match property.strip_prefix('$') {
            Some("") => {}
            Some(name) => put_path(&mut self.vars, name, value),
            None => put_path(&mut self.data, property, value),
        }
    }

    /// Set a response header; sent only when the route succeeds
    pub fn set_header(&mut self, name: &str, value: &str) -> ApiResult<()> {
        self.response.set_header(name, value)
    }

    pub fn set_content_type(&mut self, content_type: &str) -> ApiResult<()> {
        self.response.set_content_type(content_type)
    }

    /// Replace the JSON envelope with a raw body on success
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.response.set_body(body);
    }

    pub fn response(&self) -> &ResponseOverride {
        &self.response
    }

    pub fn take_response(&mut self) -> ResponseOverride {
        std::mem::take(&mut self.response)
    }

    /// End the route successfully after the current action
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Open the request transaction now rather than on first statement
    pub async fn transaction(&self) -> ApiResult<()> {
        self.tx.ensure_open().await
    }

    pub async fn transaction_phase(&self) -> TxPhase {
        self.tx.phase().await
    }

    /// Run a SELECT inside the request transaction
    pub async fn select(&self, sql: &str, args: &[Value]) -> ApiResult<Vec<Row>> {
        self.tx.select(sql, args).await
    }

    /// Run a modifying statement inside the request transaction
    pub async fn exec(&self, sql: &str, args: &[Value]) -> ApiResult<ExecResult> {
        self.tx.exec(sql, args).await
    }

    /// Commit on success, roll back otherwise. A no-op when nothing opened
    /// the transaction.
    pub async fn finish(&self, success: bool) -> ApiResult<TxOutcome> {
        self.tx.finish(success).await
    }

    /// Drop the response fields and overrides (used when the request fails)
    pub fn clear_data(&mut self) {
        self.data.clear();
        self.response = ResponseOverride::new();
    }

    pub fn take_data(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.data)
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}
