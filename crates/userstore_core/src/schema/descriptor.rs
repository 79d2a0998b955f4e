//! Entity column metadata derived once per entity type.
//!
//! # Responsibility
//! - Turn a static field declaration into the ordered column list, key list
//!   and field → column lookup used by SQL generation.
//! - Reject malformed declarations before any repository can be built.
//!
//! # Invariants
//! - Field names and column names are unique.
//! - At least one field is declared and at least one field is a key.
//! - Every identifier is a plain SQL identifier, so it can be spliced into
//!   statement text without quoting.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern should compile")
});

/// Static declaration of one persisted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Logical name used by partial updates, filters and JSON payloads.
    pub field: &'static str,
    /// Column name in the backing table.
    pub column: &'static str,
    pub primary_key: bool,
}

impl FieldDef {
    /// Declares a regular (non-key) field.
    pub const fn new(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            primary_key: false,
        }
    }

    /// Declares a primary-key field.
    pub const fn key(field: &'static str, column: &'static str) -> Self {
        Self {
            field,
            column,
            primary_key: true,
        }
    }
}

/// Error raised when an entity declaration cannot back a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NoFields { table: String },
    NoPrimaryKey { table: String },
    DuplicateField { table: String, field: String },
    DuplicateColumn { table: String, column: String },
    InvalidIdentifier { kind: &'static str, name: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFields { table } => write!(f, "entity `{table}` declares no fields"),
            Self::NoPrimaryKey { table } => {
                write!(f, "entity `{table}` declares no primary-key field")
            }
            Self::DuplicateField { table, field } => {
                write!(f, "entity `{table}` declares field `{field}` more than once")
            }
            Self::DuplicateColumn { table, column } => {
                write!(f, "entity `{table}` maps column `{column}` more than once")
            }
            Self::InvalidIdentifier { kind, name } => {
                write!(f, "invalid {kind} identifier `{name}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Immutable column metadata for one entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    table: &'static str,
    fields: Vec<FieldDef>,
    keys: Vec<FieldDef>,
    columns_by_field: HashMap<&'static str, &'static str>,
    select_list: String,
}

impl EntityDescriptor {
    /// Builds the descriptor for a table and its ordered field declarations.
    ///
    /// # Errors
    /// - Returns [`ConfigError`] when the declaration violates any module
    ///   invariant.
    pub fn new(table: &'static str, fields: &[FieldDef]) -> Result<Self, ConfigError> {
        check_identifier("table", table)?;

        if fields.is_empty() {
            return Err(ConfigError::NoFields {
                table: table.to_string(),
            });
        }

        let mut columns_by_field = HashMap::with_capacity(fields.len());
        let mut seen_columns = Vec::with_capacity(fields.len());
        for def in fields {
            check_identifier("field", def.field)?;
            check_identifier("column", def.column)?;

            if columns_by_field.insert(def.field, def.column).is_some() {
                return Err(ConfigError::DuplicateField {
                    table: table.to_string(),
                    field: def.field.to_string(),
                });
            }
            if seen_columns.contains(&def.column) {
                return Err(ConfigError::DuplicateColumn {
                    table: table.to_string(),
                    column: def.column.to_string(),
                });
            }
            seen_columns.push(def.column);
        }

        let keys = fields
            .iter()
            .filter(|def| def.primary_key)
            .copied()
            .collect::<Vec<_>>();
        if keys.is_empty() {
            return Err(ConfigError::NoPrimaryKey {
                table: table.to_string(),
            });
        }

        Ok(Self {
            table,
            fields: fields.to_vec(),
            keys,
            columns_by_field,
            select_list: seen_columns.join(", "),
        })
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    /// All persisted fields in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Primary-key fields in declaration order.
    pub fn keys(&self) -> &[FieldDef] {
        &self.keys
    }

    pub fn non_key_fields(&self) -> impl Iterator<Item = &FieldDef> + '_ {
        self.fields.iter().filter(|def| !def.primary_key)
    }

    /// Resolves a logical field name to its column.
    pub fn column_of(&self, field: &str) -> Option<&'static str> {
        self.columns_by_field.get(field).copied()
    }

    pub fn is_key(&self, field: &str) -> bool {
        self.keys.iter().any(|def| def.field == field)
    }

    /// Comma-separated column list in declaration order.
    pub fn columns(&self) -> &str {
        &self.select_list
    }
}

fn check_identifier(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if IDENTIFIER_PATTERN.is_match(name) {
        return Ok(());
    }
    Err(ConfigError::InvalidIdentifier {
        kind,
        name: name.to_string(),
    })
}
