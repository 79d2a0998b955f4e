//! Relational persistence adapter for the user store.
//!
//! Maps entity records to table rows, generates parameterized SQL for CRUD,
//! patch and filtered paged search, and runs writes in transactions.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;
pub mod sql;

pub use db::{open_db, open_db_in_memory, DbConfig, DbError};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::page::{PageRequest, SearchResult};
pub use model::partial::PartialUpdate;
pub use model::user::{date_value, DateRange, User, UserFilter};
pub use repo::error::{RepoError, RepoResult};
pub use repo::repository::Repository;
pub use repo::session::{CancelToken, Session};
pub use repo::transaction::run_in_transaction;
pub use schema::descriptor::{ConfigError, EntityDescriptor, FieldDef};
pub use schema::entity::{Entity, EntityKey};
pub use sql::filter::{Filter, FilterFragment, Predicate};
pub use sql::{Dialect, Statement};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
