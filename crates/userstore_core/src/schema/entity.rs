//! Entity and key contracts implemented by persisted record types.

use crate::repo::error::RepoResult;
use crate::schema::descriptor::{ConfigError, EntityDescriptor, FieldDef};
use rusqlite::types::Value;
use rusqlite::Row;
use uuid::Uuid;

/// A record type persisted in exactly one table.
///
/// Implementations declare their shape statically through [`Entity::FIELDS`];
/// the repository derives an [`EntityDescriptor`] from it once.
pub trait Entity: Sized {
    /// Primary-key value(s) accepted by `load` and `delete`.
    type Key: EntityKey + ?Sized;

    const TABLE: &'static str;
    const FIELDS: &'static [FieldDef];

    /// Bindable values of every field, in [`Entity::FIELDS`] order.
    fn values(&self) -> Vec<Value>;

    /// Decodes one row selected with the descriptor's column list.
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Derives the descriptor for this entity.
    fn describe() -> Result<EntityDescriptor, ConfigError> {
        EntityDescriptor::new(Self::TABLE, Self::FIELDS)
    }
}

/// Primary-key value(s) in key declaration order.
pub trait EntityKey {
    fn key_values(&self) -> Vec<Value>;
}

impl EntityKey for str {
    fn key_values(&self) -> Vec<Value> {
        vec![Value::Text(self.to_string())]
    }
}

impl EntityKey for String {
    fn key_values(&self) -> Vec<Value> {
        self.as_str().key_values()
    }
}

impl EntityKey for i64 {
    fn key_values(&self) -> Vec<Value> {
        vec![Value::Integer(*self)]
    }
}

impl EntityKey for Uuid {
    fn key_values(&self) -> Vec<Value> {
        vec![Value::Text(self.to_string())]
    }
}

impl<A: EntityKey, B: EntityKey> EntityKey for (A, B) {
    fn key_values(&self) -> Vec<Value> {
        let mut values = self.0.key_values();
        values.extend(self.1.key_values());
        values
    }
}
