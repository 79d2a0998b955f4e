//! Caller unit of work: connection, transaction state and cancellation.
//!
//! # Responsibility
//! - Carry the connection a repository call runs on.
//! - Say explicitly whether a transaction is already open (join vs begin).
//! - Abort statements once the caller cancels or the deadline passes.
//!
//! # Invariants
//! - A cancelled session runs no further statements.
//! - The interrupt handler is installed only while a statement runs.

use crate::repo::error::{RepoError, RepoResult};
use crate::schema::entity::Entity;
use crate::sql::Statement;
use rusqlite::{params_from_iter, Connection, ErrorCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// SQLite VM instructions between cancellation checks.
const INTERRUPT_CHECK_OPS: i32 = 1_000;

/// Shared cancellation flag with an optional deadline.
///
/// Clones observe the same flag, so one thread can cancel work running on
/// another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                deadline: Some(deadline),
            }),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self
                .inner
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Unit of work passed to every repository operation.
pub struct Session<'c> {
    conn: &'c Connection,
    joined: bool,
    cancel: CancelToken,
}

impl<'c> Session<'c> {
    /// Session over a connection with no cancellation.
    pub fn new(conn: &'c Connection) -> Self {
        Self::with_cancel(conn, CancelToken::new())
    }

    pub fn with_cancel(conn: &'c Connection, cancel: CancelToken) -> Self {
        Self {
            conn,
            joined: false,
            cancel,
        }
    }

    /// Session bound to a transaction owned by an outer caller.
    ///
    /// Writes through this session join that transaction and never commit or
    /// roll back on their own.
    pub fn joined(conn: &'c Connection, cancel: CancelToken) -> Self {
        Self {
            conn,
            joined: true,
            cancel,
        }
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Returns whether a transaction is already open for this unit of work.
    ///
    /// Covers both explicitly joined sessions and connections on which the
    /// caller opened a transaction directly.
    pub fn in_transaction(&self) -> bool {
        self.joined || !self.conn.is_autocommit()
    }

    /// Fails with `Cancelled` once the token is cancelled or expired.
    pub fn ensure_active(&self) -> RepoResult<()> {
        if self.cancel.is_cancelled() {
            return Err(RepoError::Cancelled);
        }
        Ok(())
    }

    /// Runs a write statement and returns the affected row count.
    pub fn execute(&self, statement: &Statement) -> RepoResult<usize> {
        self.ensure_active()?;
        let _guard = InterruptGuard::install(self.conn, &self.cancel);
        self.conn
            .prepare_cached(&statement.sql)
            .and_then(|mut stmt| stmt.execute(params_from_iter(statement.params.iter())))
            .map_err(|err| self.map_store_error(err))
    }

    /// Runs a select and decodes every row.
    pub fn query_all<E: Entity>(&self, statement: &Statement) -> RepoResult<Vec<E>> {
        self.ensure_active()?;
        let _guard = InterruptGuard::install(self.conn, &self.cancel);
        let mut stmt = self
            .conn
            .prepare_cached(&statement.sql)
            .map_err(|err| self.map_store_error(err))?;
        let mut rows = stmt
            .query(params_from_iter(statement.params.iter()))
            .map_err(|err| self.map_store_error(err))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(|err| self.map_store_error(err))? {
            records.push(E::from_row(row)?);
        }
        Ok(records)
    }

    /// Runs a select and decodes the first row, if any.
    pub fn query_first<E: Entity>(&self, statement: &Statement) -> RepoResult<Option<E>> {
        self.ensure_active()?;
        let _guard = InterruptGuard::install(self.conn, &self.cancel);
        let mut stmt = self
            .conn
            .prepare_cached(&statement.sql)
            .map_err(|err| self.map_store_error(err))?;
        let mut rows = stmt
            .query(params_from_iter(statement.params.iter()))
            .map_err(|err| self.map_store_error(err))?;

        match rows.next().map_err(|err| self.map_store_error(err))? {
            Some(row) => Ok(Some(E::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Runs a single-value `COUNT(*)` select.
    pub fn query_count(&self, statement: &Statement) -> RepoResult<i64> {
        self.ensure_active()?;
        let _guard = InterruptGuard::install(self.conn, &self.cancel);
        self.conn
            .prepare_cached(&statement.sql)
            .and_then(|mut stmt| {
                stmt.query_row(params_from_iter(statement.params.iter()), |row| {
                    row.get::<_, i64>(0)
                })
            })
            .map_err(|err| self.map_store_error(err))
    }

    fn map_store_error(&self, err: rusqlite::Error) -> RepoError {
        let interrupted = matches!(
            &err,
            rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::OperationInterrupted
        );
        if interrupted && self.cancel.is_cancelled() {
            return RepoError::Cancelled;
        }
        RepoError::from(err)
    }
}

/// Keeps a progress handler installed for the duration of one statement.
struct InterruptGuard<'c> {
    conn: &'c Connection,
}

impl<'c> InterruptGuard<'c> {
    fn install(conn: &'c Connection, cancel: &CancelToken) -> Self {
        let token = cancel.clone();
        conn.progress_handler(INTERRUPT_CHECK_OPS, Some(move || token.is_cancelled()));
        Self { conn }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}
