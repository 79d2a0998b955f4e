//! Statement synthesis from entity metadata.
//!
//! # Responsibility
//! - Emit INSERT/UPDATE/PATCH/DELETE and SELECT statements for one entity.
//! - Keep full update (every non-key column) and patch (supplied columns
//!   only) as separate code paths.
//!
//! # Invariants
//! - Column order follows the descriptor; patch SET order follows the
//!   partial update's insertion order.
//! - Key predicates follow key declaration order and come last in params.

use crate::model::partial::PartialUpdate;
use crate::repo::error::{RepoError, RepoResult};
use crate::schema::descriptor::EntityDescriptor;
use crate::schema::entity::{Entity, EntityKey};
use crate::sql::filter::{compile_filter, compile_sort, Filter};
use crate::sql::{Dialect, Placeholders, Statement};
use rusqlite::types::Value;

/// Builds statements for one entity in one dialect.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'d> {
    descriptor: &'d EntityDescriptor,
    dialect: Dialect,
}

impl<'d> QueryBuilder<'d> {
    pub fn new(descriptor: &'d EntityDescriptor, dialect: Dialect) -> Self {
        Self {
            descriptor,
            dialect,
        }
    }

    pub fn insert<E: Entity>(&self, record: &E) -> RepoResult<Statement> {
        let values = self.record_values(record)?;
        let mut placeholders = Placeholders::new(self.dialect);
        let slots = values
            .iter()
            .map(|_| placeholders.next_placeholder())
            .collect::<Vec<_>>();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.descriptor.table(),
            self.descriptor.columns(),
            slots.join(", ")
        );
        Ok(Statement::new(sql, values))
    }

    /// Rewrites every non-key column of the row matching the record's key.
    pub fn update<E: Entity>(&self, record: &E) -> RepoResult<Statement> {
        let values = self.record_values(record)?;
        let mut placeholders = Placeholders::new(self.dialect);
        let mut assignments = Vec::new();
        let mut params = Vec::with_capacity(values.len());

        for (def, value) in self.descriptor.fields().iter().zip(values.iter()) {
            if def.primary_key {
                continue;
            }
            assignments.push(format!("{} = {}", def.column, placeholders.next_placeholder()));
            params.push(value.clone());
        }
        if assignments.is_empty() {
            return Err(RepoError::NothingToUpdate);
        }

        let mut key_values = Vec::with_capacity(self.descriptor.keys().len());
        for (def, value) in self.descriptor.fields().iter().zip(values) {
            if def.primary_key {
                key_values.push(value);
            }
        }
        let condition = self.key_condition(&mut placeholders, &key_values);
        params.extend(key_values);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.descriptor.table(),
            assignments.join(", "),
            condition
        );
        Ok(Statement::new(sql, params))
    }

    /// Assigns only the non-key entries of `partial`; its key entries select
    /// the row.
    ///
    /// # Errors
    /// - `InvalidField` when an entry has no mapped column.
    /// - `MissingKey` when a key value is absent or null.
    /// - `NothingToUpdate` when no assignable entry remains.
    pub fn patch(&self, partial: &PartialUpdate) -> RepoResult<Statement> {
        let mut placeholders = Placeholders::new(self.dialect);
        let mut assignments = Vec::new();
        let mut params = Vec::with_capacity(partial.len());

        for (field, value) in partial.iter() {
            let column = self
                .descriptor
                .column_of(field)
                .ok_or_else(|| RepoError::InvalidField(field.to_string()))?;
            if self.descriptor.is_key(field) {
                continue;
            }
            assignments.push(format!("{column} = {}", placeholders.next_placeholder()));
            params.push(value.clone());
        }

        let mut key_values = Vec::with_capacity(self.descriptor.keys().len());
        for def in self.descriptor.keys() {
            match partial.get(def.field) {
                Some(value) if *value != Value::Null => key_values.push(value.clone()),
                _ => return Err(RepoError::MissingKey(def.field.to_string())),
            }
        }
        if assignments.is_empty() {
            return Err(RepoError::NothingToUpdate);
        }

        let condition = self.key_condition(&mut placeholders, &key_values);
        params.extend(key_values);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.descriptor.table(),
            assignments.join(", "),
            condition
        );
        Ok(Statement::new(sql, params))
    }

    pub fn delete<K: EntityKey + ?Sized>(&self, key: &K) -> RepoResult<Statement> {
        let key_values = self.key_values(key)?;
        let mut placeholders = Placeholders::new(self.dialect);
        let condition = self.key_condition(&mut placeholders, &key_values);

        let sql = format!("DELETE FROM {} WHERE {}", self.descriptor.table(), condition);
        Ok(Statement::new(sql, key_values))
    }

    /// Unconditioned select of every mapped column.
    pub fn select_all(&self) -> Statement {
        Statement::new(
            format!(
                "SELECT {} FROM {}",
                self.descriptor.columns(),
                self.descriptor.table()
            ),
            Vec::new(),
        )
    }

    pub fn select_by_key<K: EntityKey + ?Sized>(&self, key: &K) -> RepoResult<Statement> {
        let key_values = self.key_values(key)?;
        let mut placeholders = Placeholders::new(self.dialect);
        let condition = self.key_condition(&mut placeholders, &key_values);

        let base = self.select_all();
        Ok(Statement::new(
            format!("{} WHERE {condition}", base.sql),
            key_values,
        ))
    }

    /// Base search select: filter conditions plus a deterministic order.
    ///
    /// The primary key always closes the ORDER BY, so ties in the requested
    /// sort cannot reorder rows between pages.
    pub fn select_matching<F: Filter + ?Sized>(&self, filter: &F) -> RepoResult<Statement> {
        let mut placeholders = Placeholders::new(self.dialect);
        let fragment = compile_filter(self.descriptor, &mut placeholders, filter)?;
        let order = compile_sort(self.descriptor, filter.sort())?;

        let mut sql = self.select_all().sql;
        if !fragment.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&fragment.sql);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
        Ok(Statement::new(sql, fragment.params))
    }

    fn record_values<E: Entity>(&self, record: &E) -> RepoResult<Vec<Value>> {
        let values = record.values();
        let expected = self.descriptor.fields().len();
        if values.len() != expected {
            return Err(RepoError::InvalidData(format!(
                "{} record produced {} values for {expected} columns",
                self.descriptor.table(),
                values.len()
            )));
        }
        Ok(values)
    }

    fn key_values<K: EntityKey + ?Sized>(&self, key: &K) -> RepoResult<Vec<Value>> {
        let values = key.key_values();
        let keys = self.descriptor.keys();
        if values.len() < keys.len() {
            return Err(RepoError::MissingKey(keys[values.len()].field.to_string()));
        }
        if values.len() > keys.len() {
            return Err(RepoError::InvalidData(format!(
                "{} expects {} key values, got {}",
                self.descriptor.table(),
                keys.len(),
                values.len()
            )));
        }
        Ok(values)
    }

    fn key_condition(&self, placeholders: &mut Placeholders, key_values: &[Value]) -> String {
        self.descriptor
            .keys()
            .iter()
            .zip(key_values)
            .map(|(def, _)| format!("{} = {}", def.column, placeholders.next_placeholder()))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}
