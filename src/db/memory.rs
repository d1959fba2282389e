//! In-memory scripted database
//!
//! Records every statement with its bind values and counts transaction
//! lifecycle events. Row results and failures are scripted by SQL fragment:
//! the first registered fragment contained in a statement wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::{Database, DbError, DbFuture, ExecResult, Row, Transaction};

/// A statement as it reached the database
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

#[derive(Debug)]
struct MemoryState {
    statements: Vec<Statement>,
    begins: usize,
    commits: usize,
    rollbacks: usize,
    fail_begin: bool,
    rows: Vec<(String, Vec<Row>)>,
    failures: Vec<(String, DbError)>,
    rows_affected: u64,
    next_insert_id: u64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            statements: Vec::new(),
            begins: 0,
            commits: 0,
            rollbacks: 0,
            fail_begin: false,
            rows: Vec::new(),
            failures: Vec::new(),
            rows_affected: 1,
            next_insert_id: 1,
        }
    }
}

impl MemoryState {
    fn failure_for(&self, sql: &str) -> Option<DbError> {
        self.failures
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, err)| err.clone())
    }

    fn rows_for(&self, sql: &str) -> Vec<Row> {
        self.rows
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }
}

/// Scripted in-memory database. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    /// Create an empty database: selects return no rows, execs affect one row
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return `rows` for any SELECT containing `fragment`.
    /// Non-object values are ignored.
    pub fn with_rows(self, fragment: impl Into<String>, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.state().rows.push((fragment.into(), rows));
        self
    }

    /// Fail any statement containing `fragment` with `err`
    pub fn with_failure(self, fragment: impl Into<String>, err: DbError) -> Self {
        self.state().failures.push((fragment.into(), err));
        self
    }

    /// Make every `begin` fail
    pub fn failing_begin(self) -> Self {
        self.state().fail_begin = true;
        self
    }

    /// Affected-row count reported by UPDATE/DELETE
    pub fn with_rows_affected(self, rows: u64) -> Self {
        self.state().rows_affected = rows;
        self
    }

    /// Statements executed so far, in order
    pub fn statements(&self) -> Vec<Statement> {
        self.state().statements.clone()
    }

    pub fn begins(&self) -> usize {
        self.state().begins
    }

    pub fn commits(&self) -> usize {
        self.state().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.state().rollbacks
    }
}

impl Database for MemoryDatabase {
    fn begin(&self) -> DbFuture<'_, Box<dyn Transaction>> {
        Box::pin(async move {
            let mut state = self.state();
            if state.fail_begin {
                return Err(DbError::Unavailable("connection refused".to_string()));
            }
            state.begins += 1;
            Ok(Box::new(MemoryTransaction {
                state: Arc::clone(&self.state),
                finished: false,
            }) as Box<dyn Transaction>)
        })
    }
}

struct MemoryTransaction {
    state: Arc<Mutex<MemoryState>>,
    finished: bool,
}

impl MemoryTransaction {
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, sql: &str, args: &[Value]) -> Result<(), DbError> {
        let mut state = self.state();
        state.statements.push(Statement {
            sql: sql.to_string(),
            args: args.to_vec(),
        });
        match state.failure_for(sql) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn finish(mut self: Box<Self>, committed: bool) {
        self.finished = true;
        let mut state = self.state();
        if committed {
            state.commits += 1;
        } else {
            state.rollbacks += 1;
        }
    }
}

impl Transaction for MemoryTransaction {
    fn select<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbFuture<'a, Vec<Row>> {
        Box::pin(async move {
            self.record(sql, args)?;
            Ok(self.state().rows_for(sql))
        })
    }

    fn exec<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbFuture<'a, ExecResult> {
        Box::pin(async move {
            self.record(sql, args)?;
            let mut state = self.state();
            let mut result = ExecResult {
                rows_affected: state.rows_affected,
                last_insert_id: 0,
            };
            if sql.trim_start().to_ascii_uppercase().starts_with("INSERT") {
                result.rows_affected = 1;
                result.last_insert_id = state.next_insert_id;
                state.next_insert_id += 1;
            }
            Ok(result)
        })
    }

    fn commit(self: Box<Self>) -> DbFuture<'static, ()> {
        self.finish(true);
        Box::pin(async { Ok(()) })
    }

    fn rollback(self: Box<Self>) -> DbFuture<'static, ()> {
        self.finish(false);
        Box::pin(async { Ok(()) })
    }
}

impl Drop for MemoryTransaction {
    // Dropping an open transaction rolls it back, as the real drivers do.
    fn drop(&mut self) {
        if !self.finished {
            self.state().rollbacks += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_statements_and_lifecycle() {
        let db = MemoryDatabase::new().with_rows("FROM books", vec![json!({"id": 1})]);

        let mut tx = db.begin().await.unwrap();
        let rows = tx
            .select("SELECT id FROM books WHERE id = ?", &[json!(1)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        tx.commit().await.unwrap();

        assert_eq!(db.begins(), 1);
        assert_eq!(db.commits(), 1);
        assert_eq!(db.rollbacks(), 0);
        assert_eq!(db.statements()[0].args, vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_insert_ids_increase() {
        let db = MemoryDatabase::new();
        let mut tx = db.begin().await.unwrap();

        let first = tx.exec("INSERT INTO t VALUES (?)", &[json!("a")]).await.unwrap();
        let second = tx.exec("INSERT INTO t VALUES (?)", &[json!("b")]).await.unwrap();
        assert_eq!(first.last_insert_id, 1);
        assert_eq!(second.last_insert_id, 2);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let db = MemoryDatabase::new().with_failure("INTO users", DbError::Duplicate("k".into()));
        let mut tx = db.begin().await.unwrap();

        let err = tx.exec("INSERT INTO users VALUES (?)", &[json!(1)]).await.unwrap_err();
        assert!(err.is_duplicate());
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let db = MemoryDatabase::new();
        {
            let _tx = db.begin().await.unwrap();
        }
        assert_eq!(db.rollbacks(), 1);
    }

    #[tokio::test]
    async fn test_failing_begin() {
        let db = MemoryDatabase::new().failing_begin();
        assert!(db.begin().await.is_err());
        assert_eq!(db.begins(), 0);
    }
}
