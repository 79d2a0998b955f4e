//! Generic repository facade over one entity table.
//!
//! # Responsibility
//! - Compose statement building, paging and transactions into the public
//!   `all/load/create/update/patch/delete/search` operations.
//! - Emit one structured log event per operation.
//!
//! # Invariants
//! - A repository only exists for a valid entity declaration.
//! - Writes run through [`run_in_transaction`]; reads never open one.
//! - `update`/`delete` report zero affected rows as success.

use crate::model::page::{PageRequest, SearchResult};
use crate::model::partial::PartialUpdate;
use crate::repo::error::RepoResult;
use crate::repo::session::Session;
use crate::repo::transaction::run_in_transaction;
use crate::schema::descriptor::EntityDescriptor;
use crate::schema::entity::Entity;
use crate::sql::builder::QueryBuilder;
use crate::sql::filter::Filter;
use crate::sql::paging::{count_query, page_query};
use crate::sql::{Dialect, Statement};
use log::{debug, error, info};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

/// Persistence adapter for entity `E`.
pub struct Repository<E: Entity> {
    descriptor: Arc<EntityDescriptor>,
    dialect: Dialect,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Repository<E> {
    /// Builds a SQLite repository.
    ///
    /// # Errors
    /// - Returns `Configuration` when `E` declares an invalid shape.
    pub fn new() -> RepoResult<Self> {
        Self::with_dialect(Dialect::default())
    }

    /// Builds a repository generating SQL for `dialect`.
    pub fn with_dialect(dialect: Dialect) -> RepoResult<Self> {
        let descriptor = match E::describe() {
            Ok(descriptor) => descriptor,
            Err(err) => {
                error!(
                    "event=repo_init module=repo status=error table={} error_code=configuration error={}",
                    E::TABLE,
                    err
                );
                return Err(err.into());
            }
        };
        info!(
            "event=repo_init module=repo status=ok table={} columns={} keys={} dialect={:?}",
            descriptor.table(),
            descriptor.fields().len(),
            descriptor.keys().len(),
            dialect
        );

        Ok(Self {
            descriptor: Arc::new(descriptor),
            dialect,
            _marker: PhantomData,
        })
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Statement builder bound to this repository's entity and dialect.
    pub fn query_builder(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.descriptor, self.dialect)
    }

    /// Reads every row, outside any transaction.
    pub fn all(&self, session: &Session<'_>) -> RepoResult<Vec<E>> {
        let started_at = Instant::now();
        let statement = self.query_builder().select_all();
        let result = session.query_all::<E>(&statement);
        self.log_outcome("repo_all", started_at, &result, |records| {
            format!("rows={}", records.len())
        });
        result
    }

    /// Reads one row by key; `None` when no row matches.
    pub fn load(&self, session: &Session<'_>, key: &E::Key) -> RepoResult<Option<E>> {
        let started_at = Instant::now();
        let result = self.query_builder().select_by_key(key).and_then(|statement| {
            session.query_first::<E>(&page_query(&statement, self.dialect, 1, 0))
        });
        self.log_outcome("repo_load", started_at, &result, |record| {
            format!("found={}", record.is_some())
        });
        result
    }

    pub fn create(&self, session: &Session<'_>, record: &E) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self
            .query_builder()
            .insert(record)
            .and_then(|statement| self.write(session, &statement));
        self.log_outcome("repo_create", started_at, &result, rows_detail);
        result
    }

    /// Rewrites all non-key columns; returns `0` when the key is absent.
    pub fn update(&self, session: &Session<'_>, record: &E) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self
            .query_builder()
            .update(record)
            .and_then(|statement| self.write(session, &statement));
        self.log_outcome("repo_update", started_at, &result, rows_detail);
        result
    }

    /// Assigns only the fields present in `partial`.
    pub fn patch(&self, session: &Session<'_>, partial: &PartialUpdate) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self
            .query_builder()
            .patch(partial)
            .and_then(|statement| self.write(session, &statement));
        self.log_outcome("repo_patch", started_at, &result, |rows| {
            format!("rows={rows} fields={}", partial.len())
        });
        result
    }

    /// Deletes by key; returns `0` when the key is absent.
    pub fn delete(&self, session: &Session<'_>, key: &E::Key) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self
            .query_builder()
            .delete(key)
            .and_then(|statement| self.write(session, &statement));
        self.log_outcome("repo_delete", started_at, &result, rows_detail);
        result
    }

    /// Filtered, paged read with an independent total count.
    ///
    /// A non-positive limit returns an empty result without touching the
    /// store; a zero total skips the page query.
    pub fn search<F: Filter + ?Sized>(
        &self,
        session: &Session<'_>,
        filter: &F,
        page: PageRequest,
    ) -> RepoResult<SearchResult<E>> {
        let started_at = Instant::now();
        if page.is_empty_window() {
            debug!(
                "event=repo_search module=repo status=skipped table={} limit={}",
                self.descriptor.table(),
                page.limit
            );
            return Ok(SearchResult::empty(0));
        }

        let result = self.run_search(session, filter, page);
        self.log_outcome("repo_search", started_at, &result, |found| {
            format!(
                "rows={} total={} limit={} offset={}",
                found.items.len(),
                found.total,
                page.limit,
                page.offset
            )
        });
        result
    }

    fn run_search<F: Filter + ?Sized>(
        &self,
        session: &Session<'_>,
        filter: &F,
        page: PageRequest,
    ) -> RepoResult<SearchResult<E>> {
        let base = self.query_builder().select_matching(filter)?;

        let total = session.query_count(&count_query(&base))?;
        if total == 0 {
            return Ok(SearchResult::empty(total));
        }

        let items =
            session.query_all::<E>(&page_query(&base, self.dialect, page.limit, page.offset))?;
        Ok(SearchResult { items, total })
    }

    fn write(&self, session: &Session<'_>, statement: &Statement) -> RepoResult<usize> {
        run_in_transaction(session, |scoped| scoped.execute(statement))
    }

    fn log_outcome<T>(
        &self,
        event: &'static str,
        started_at: Instant,
        result: &RepoResult<T>,
        detail: impl FnOnce(&T) -> String,
    ) {
        match result {
            Ok(value) => debug!(
                "event={} module=repo status=ok table={} duration_ms={} {}",
                event,
                self.descriptor.table(),
                started_at.elapsed().as_millis(),
                detail(value)
            ),
            Err(err) => error!(
                "event={} module=repo status=error table={} duration_ms={} error_code={} error={}",
                event,
                self.descriptor.table(),
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
    }
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            dialect: self.dialect,
            _marker: PhantomData,
        }
    }
}

fn rows_detail(rows: &usize) -> String {
    format!("rows={rows}")
}
