//! Parameterized SQL generation.
//!
//! # Responsibility
//! - Build write/read statements from entity metadata ([`builder`]).
//! - Compile filters and sort specs into WHERE/ORDER BY clauses ([`filter`]).
//! - Derive count and page variants of a base select ([`paging`]).
//!
//! # Invariants
//! - User-supplied values only ever reach SQL as bound parameters.
//! - Identifiers spliced into SQL come from validated entity descriptors.
//! - One statement uses one placeholder style and one increasing index.

use rusqlite::types::Value;

pub mod builder;
pub mod filter;
pub mod paging;

/// SQL text with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Target SQL dialect.
///
/// The dialect fixes the placeholder style and the paging suffix. SQLite is
/// the executing backend; the others are supported for statement generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// Positional `?` placeholders.
    #[default]
    Sqlite,
    /// Positional `?` placeholders.
    MySql,
    /// Numbered `$1, $2, ...` placeholders.
    Postgres,
    /// Named `:1, :2, ...` placeholders and `OFFSET .. FETCH NEXT` paging.
    Oracle,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Self::Sqlite | Self::MySql => "?".to_string(),
            Self::Postgres => format!("${index}"),
            Self::Oracle => format!(":{index}"),
        }
    }
}

/// Monotonic placeholder generator shared by every clause of one statement.
#[derive(Debug)]
pub struct Placeholders {
    dialect: Dialect,
    next: usize,
}

impl Placeholders {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect, next: 1 }
    }

    /// Returns the placeholder for the next bound parameter.
    pub fn next_placeholder(&mut self) -> String {
        let placeholder = self.dialect.placeholder(self.next);
        self.next += 1;
        placeholder
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}
