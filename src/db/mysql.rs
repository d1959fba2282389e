//! MySQL backend on a `sqlx` pool.
//!
//! JSON bind values map onto driver types by kind; result columns are
//! decoded back into JSON by their declared column type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo};

use super::{Database, DbError, DbFuture, DbResult, ExecResult, Row, Transaction};

/// Pooled MySQL database
#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    /// Connect eagerly, failing if the server is unreachable
    pub async fn connect(url: &str, max_connections: u32) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| DbError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Build the pool without connecting; connections open on first `begin`
    pub fn connect_lazy(url: &str, max_connections: u32) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)
            .map_err(|e| DbError::Unavailable(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

impl Database for MySqlDatabase {
    fn begin(&self) -> DbFuture<'_, Box<dyn Transaction>> {
        Box::pin(async move {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(|e| DbError::Unavailable(e.to_string()))?;
            Ok(Box::new(MySqlTransaction { tx }) as Box<dyn Transaction>)
        })
    }
}

struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
}

impl Transaction for MySqlTransaction {
    fn select<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbFuture<'a, Vec<Row>> {
        Box::pin(async move {
            let rows = bind_args(sql, args)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(map_error)?;
            Ok(rows.iter().map(decode_row).collect())
        })
    }

    fn exec<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbFuture<'a, ExecResult> {
        Box::pin(async move {
            let done = bind_args(sql, args)
                .execute(&mut *self.tx)
                .await
                .map_err(map_error)?;
            Ok(ExecResult {
                rows_affected: done.rows_affected(),
                last_insert_id: done.last_insert_id(),
            })
        })
    }

    fn commit(self: Box<Self>) -> DbFuture<'static, ()> {
        Box::pin(async move { self.tx.commit().await.map_err(map_error) })
    }

    fn rollback(self: Box<Self>) -> DbFuture<'static, ()> {
        Box::pin(async move { self.tx.rollback().await.map_err(map_error) })
    }
}

fn bind_args<'q>(sql: &'q str, args: &'q [Value]) -> Query<'q, MySql, MySqlArguments> {
    let mut query = sqlx::query(sql);
    for arg in args {
        query = match arg {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    query.bind(i)
                } else if let Some(u) = n.as_u64() {
                    query.bind(u)
                } else {
                    query.bind(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => query.bind(s.as_str()),
            // Arrays and objects travel as JSON text
            other => query.bind(other.to_string()),
        };
    }
    query
}

fn map_error(e: sqlx::Error) -> DbError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DbError::Duplicate(db.message().to_string())
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DbError::Unavailable(e.to_string())
        }
        _ => DbError::Query(e.to_string()),
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name());
        out.insert(column.name().to_string(), value);
    }
    out
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
            .try_get::<Option<i64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from),
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => row
            .try_get::<Option<u64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from),
        "FLOAT" => row
            .try_get::<Option<f32>, _>(idx)
            .ok()
            .flatten()
            .map(|f| Value::from(f as f64)),
        "DOUBLE" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from),
        "DATETIME" | "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(idx)
            .ok()
            .flatten()
            .map(|dt| Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(idx)
            .ok()
            .flatten()
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        "TIME" => row
            .try_get::<Option<NaiveTime>, _>(idx)
            .ok()
            .flatten()
            .map(|t| Value::String(t.format("%H:%M:%S").to_string())),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => row
            .try_get::<Option<Vec<u8>>, _>(idx)
            .ok()
            .flatten()
            .map(|b| Value::String(String::from_utf8_lossy(&b).into_owned())),
        // DECIMAL, JSON, ENUM, text types: the server sends these as text
        _ => row
            .try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String),
    };
    decoded.unwrap_or(Value::Null)
}
