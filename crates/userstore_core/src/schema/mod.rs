//! Static entity shape declarations and the column metadata derived from them.
//!
//! # Responsibility
//! - Describe which fields an entity persists and which of them form the key.
//! - Resolve logical field names (as used by patches and filters) to columns.
//!
//! # Invariants
//! - Descriptors are immutable once built and shared across calls.

pub mod descriptor;
pub mod entity;
