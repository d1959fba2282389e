//! # Database Seam
//!
//! Everything the engine needs from a database: open a transaction, run
//! positional-parameter statements inside it, then commit or roll back.
//!
//! ## Implementations
//!
//! - [`MySqlDatabase`]: `sqlx` connection pool
//! - [`MemoryDatabase`]: scripted, records every statement (tests, demos)

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

pub mod errors;
pub mod memory;
pub mod mysql;

pub use errors::{DbError, DbResult};
pub use memory::{MemoryDatabase, Statement};
pub use mysql::MySqlDatabase;

/// One result row, column name to JSON value
pub type Row = serde_json::Map<String, Value>;

/// Boxed future returned by the database traits
pub type DbFuture<'a, T> = Pin<Box<dyn Future<Output = DbResult<T>> + Send + 'a>>;

/// Outcome of an INSERT/UPDATE/DELETE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

/// Connection pool able to open transactions
pub trait Database: Send + Sync {
    /// Open a new transaction
    fn begin(&self) -> DbFuture<'_, Box<dyn Transaction>>;
}

/// An open transaction. Statements use `?` placeholders bound positionally.
pub trait Transaction: Send {
    /// Run a row-returning statement
    fn select<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbFuture<'a, Vec<Row>>;

    /// Run a statement that returns no rows
    fn exec<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbFuture<'a, ExecResult>;

    /// Commit and release the connection
    fn commit(self: Box<Self>) -> DbFuture<'static, ()>;

    /// Roll back and release the connection
    fn rollback(self: Box<Self>) -> DbFuture<'static, ()>;
}
