//! Repository error taxonomy.
//!
//! # Invariants
//! - Driver failures never escape unwrapped: they travel as `Store`.
//! - `Configuration` is only produced while constructing a repository.

use crate::db::DbError;
use crate::schema::descriptor::ConfigError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error returned by every repository operation.
#[derive(Debug)]
pub enum RepoError {
    /// Entity declaration cannot back a repository.
    Configuration(ConfigError),
    /// A patch, filter or sort references a field with no mapped column.
    InvalidField(String),
    /// A patch value has no SQL representation.
    InvalidValue { field: String, message: String },
    /// A primary-key value required for row selection is absent.
    MissingKey(String),
    /// The statement would assign no column.
    NothingToUpdate,
    /// The backing store rejected or failed a statement.
    Store(DbError),
    /// Caller cancelled the session or its deadline passed.
    Cancelled,
    /// A persisted row or record could not be mapped.
    InvalidData(String),
}

impl RepoError {
    /// Stable snake_case code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InvalidField(_) => "invalid_field",
            Self::InvalidValue { .. } => "invalid_value",
            Self::MissingKey(_) => "missing_key",
            Self::NothingToUpdate => "nothing_to_update",
            Self::Store(_) => "store",
            Self::Cancelled => "cancelled",
            Self::InvalidData(_) => "invalid_data",
        }
    }

    /// Returns whether the store rejected the write for a constraint
    /// (unique, primary key, not null, check, foreign key).
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Self::Store(DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))) => {
                err.code == ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "invalid entity configuration: {err}"),
            Self::InvalidField(field) => write!(f, "unknown field `{field}`"),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid value for field `{field}`: {message}")
            }
            Self::MissingKey(field) => write!(f, "missing primary-key value for `{field}`"),
            Self::NothingToUpdate => write!(f, "no updatable field supplied"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::InvalidField(_)
            | Self::InvalidValue { .. }
            | Self::MissingKey(_)
            | Self::NothingToUpdate
            | Self::Cancelled
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<ConfigError> for RepoError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Store(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(DbError::Sqlite(value))
    }
}
