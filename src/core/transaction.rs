//! # Request Transaction
//!
//! One lazily-opened database transaction per request.
//!
//! ```text
//! Idle ──open──▶ Open ──▶ Committed
//!   │                └──▶ RolledBack
//!   └──fail──▶ Failed
//! Detached (no database)
//! ```
//!
//! The transaction is opened by the first statement, under the slot's lock.
//! A failed open is sticky: later statements fail without retrying.
//! Finishing a slot that never opened is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use super::error::{ApiError, ApiResult};
use crate::db::{Database, DbError, ExecResult, Row, Transaction};

/// Observable lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxPhase {
    Idle,
    Open,
    Committed,
    RolledBack,
    Failed,
    Detached,
}

/// What `finish` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// No statement ran, so there was nothing to end
    NotOpened,
    Committed,
    RolledBack,
}

enum TxState {
    Idle,
    Open(Box<dyn Transaction>),
    Committed,
    RolledBack,
    Failed,
    Detached,
}

impl TxState {
    fn phase(&self) -> TxPhase {
        match self {
            TxState::Idle => TxPhase::Idle,
            TxState::Open(_) => TxPhase::Open,
            TxState::Committed => TxPhase::Committed,
            TxState::RolledBack => TxPhase::RolledBack,
            TxState::Failed => TxPhase::Failed,
            TxState::Detached => TxPhase::Detached,
        }
    }
}

/// Lazily-opened transaction holder
pub struct TxSlot {
    database: Option<Arc<dyn Database>>,
    state: Mutex<TxState>,
    opened: AtomicBool,
}

impl TxSlot {
    /// Slot backed by `database`; `None` gives a detached slot
    pub fn new(database: Option<Arc<dyn Database>>) -> Self {
        let state = if database.is_some() {
            TxState::Idle
        } else {
            TxState::Detached
        };
        Self {
            database,
            state: Mutex::new(state),
            opened: AtomicBool::new(false),
        }
    }

    /// True once a transaction has been opened, even if already finished
    pub fn was_opened(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }

    pub async fn phase(&self) -> TxPhase {
        self.state.lock().await.phase()
    }

    /// Open the transaction if it is not open yet
    pub async fn ensure_open(&self) -> ApiResult<()> {
        let mut state = self.state.lock().await;
        self.open_locked(&mut state).await.map(|_| ())
    }

    async fn open_locked<'s>(
        &self,
        state: &'s mut TxState,
    ) -> ApiResult<&'s mut Box<dyn Transaction>> {
        if let TxState::Idle = state {
            // Re-checked under the lock: a concurrent caller may have opened it
            let database = self
                .database
                .as_ref()
                .ok_or(ApiError::TransactionUnavailable)?;
            match database.begin().await {
                Ok(tx) => {
                    *state = TxState::Open(tx);
                    self.opened.store(true, Ordering::Release);
                    tracing::debug!("transaction opened");
                }
                Err(e) => {
                    *state = TxState::Failed;
                    tracing::error!(error = %e, "failed to open transaction");
                    return Err(ApiError::TransactionUnavailable);
                }
            }
        }

        match state {
            TxState::Open(tx) => Ok(tx),
            TxState::Failed | TxState::Detached => Err(ApiError::TransactionUnavailable),
            _ => Err(ApiError::internal("transaction already finished")),
        }
    }

    /// Run a row-returning statement
    pub async fn select(&self, sql: &str, args: &[Value]) -> ApiResult<Vec<Row>> {
        let mut state = self.state.lock().await;
        let tx = self.open_locked(&mut state).await?;
        tx.select(sql, args).await.map_err(|e| statement_error(sql, e))
    }

    /// Run a statement that modifies rows
    pub async fn exec(&self, sql: &str, args: &[Value]) -> ApiResult<ExecResult> {
        let mut state = self.state.lock().await;
        let tx = self.open_locked(&mut state).await?;
        tx.exec(sql, args).await.map_err(|e| statement_error(sql, e))
    }

    /// Commit or roll back if a transaction is open
    pub async fn finish(&self, commit: bool) -> ApiResult<TxOutcome> {
        let mut state = self.state.lock().await;
        let tx = match std::mem::replace(&mut *state, TxState::Idle) {
            TxState::Open(tx) => tx,
            other => {
                *state = other;
                return Ok(TxOutcome::NotOpened);
            }
        };

        if commit {
            match tx.commit().await {
                Ok(()) => {
                    *state = TxState::Committed;
                    Ok(TxOutcome::Committed)
                }
                Err(e) => {
                    *state = TxState::RolledBack;
                    tracing::error!(error = %e, "commit failed");
                    Err(e.into())
                }
            }
        } else {
            *state = TxState::RolledBack;
            if let Err(e) = tx.rollback().await {
                tracing::error!(error = %e, "rollback failed");
            }
            Ok(TxOutcome::RolledBack)
        }
    }
}

impl std::fmt::Debug for TxSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxSlot")
            .field("attached", &self.database.is_some())
            .field("opened", &self.was_opened())
            .finish()
    }
}

/// Driver details stay in the log; callers only see the error class
fn statement_error(sql: &str, e: DbError) -> ApiError {
    match &e {
        DbError::Duplicate(msg) => tracing::debug!(sql, error = %msg, "duplicate entry"),
        _ => tracing::error!(sql, error = %e, "statement failed"),
    }
    e.into()
}
