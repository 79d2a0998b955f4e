//! Records, partial updates and paging shapes exchanged with callers.
//!
//! # Responsibility
//! - Define the `User` entity and its search filter.
//! - Define the per-call inputs/outputs shared by every entity repository.
//!
//! # Invariants
//! - Every type here is caller-owned and per-call; repositories never retain
//!   references to them.

pub mod page;
pub mod partial;
pub mod user;
