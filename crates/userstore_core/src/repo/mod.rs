//! Repository facade, transactions and the caller's unit of work.
//!
//! # Responsibility
//! - Execute generated statements on the caller's connection.
//! - Own transaction boundaries for writes and honor cancellation.
//!
//! # Invariants
//! - Callers only ever see [`error::RepoError`], never raw driver errors.
//! - No retries: a failed write is rolled back and reported once.

pub mod error;
pub mod repository;
pub mod session;
pub mod transaction;
