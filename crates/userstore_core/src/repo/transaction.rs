//! Transaction boundary for single write operations.
//!
//! # Responsibility
//! - Begin, commit or roll back one transaction per top-level write.
//! - Join a transaction already open in the caller's session untouched.
//!
//! # Invariants
//! - Exactly one of commit/rollback runs for every transaction begun here.
//! - Errors, cancellation and panics inside the operation roll back.
//! - Joined transactions are never committed or rolled back here.

use crate::repo::error::RepoResult;
use crate::repo::session::Session;
use log::{debug, warn};
use rusqlite::{Transaction, TransactionBehavior};

/// Runs `operation` inside a transaction.
///
/// When `session` already carries an open transaction the operation runs on
/// it directly and the outer owner keeps control of the boundary.
pub fn run_in_transaction<T, F>(session: &Session<'_>, operation: F) -> RepoResult<T>
where
    F: FnOnce(&Session<'_>) -> RepoResult<T>,
{
    if session.in_transaction() {
        debug!("event=tx_join module=repo status=ok");
        return operation(session);
    }

    session.ensure_active()?;
    let tx = Transaction::new_unchecked(session.conn(), TransactionBehavior::Immediate)?;

    // Dropping `tx` during a panic rolls back before unwinding continues.
    let outcome = {
        let scoped = Session::joined(&tx, session.cancel_token().clone());
        operation(&scoped).and_then(|value| {
            scoped.ensure_active()?;
            Ok(value)
        })
    };

    match outcome {
        Ok(value) => {
            tx.commit()?;
            debug!("event=tx_commit module=repo status=ok");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(
                    "event=tx_rollback module=repo status=error error_code=rollback_failed error={}",
                    rollback_err
                );
            } else {
                debug!(
                    "event=tx_rollback module=repo status=ok cause={}",
                    err.code()
                );
            }
            Err(err)
        }
    }
}
