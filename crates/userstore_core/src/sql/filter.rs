//! Filter → WHERE and sort → ORDER BY compilation.
//!
//! # Responsibility
//! - Translate sparse filter predicates into a conjunction of bound
//!   conditions, in the order the filter yields them.
//! - Resolve sort specs against the entity's mapped fields.
//!
//! # Invariants
//! - Absent or empty predicate values add nothing to the fragment.
//! - Pattern metacharacters in user input match literally.
//! - Prefix and substring matches are case-sensitive in every dialect.
//! - Unknown fields fail with `InvalidField` instead of reaching SQL.

use crate::repo::error::{RepoError, RepoResult};
use crate::schema::descriptor::EntityDescriptor;
use crate::sql::{Dialect, Placeholders};
use rusqlite::types::Value;

const LIKE_ESCAPE: char = '!';

/// One optional condition over a logical field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = value`.
    Eq { field: &'static str, value: Value },
    /// `column >= min` and/or `column <= max`.
    Range {
        field: &'static str,
        min: Option<Value>,
        max: Option<Value>,
    },
    /// Case-sensitive starts-with match.
    Prefix { field: &'static str, value: String },
    /// Substring match.
    Contains { field: &'static str, value: String },
}

/// Sparse search criteria over one entity.
pub trait Filter {
    /// Predicates in a fixed field order; absent criteria may be omitted.
    fn predicates(&self) -> Vec<Predicate>;

    /// Optional sort spec, e.g. `"username,-dateOfBirth"`.
    fn sort(&self) -> Option<&str> {
        None
    }
}

/// Compiled WHERE body (without the keyword) and its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl FilterFragment {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Compiles `filter` into a conjunction of bound conditions.
///
/// Placeholders continue from `placeholders`, so the fragment can be spliced
/// after other bound clauses of the same statement.
pub fn compile_filter<F: Filter + ?Sized>(
    descriptor: &EntityDescriptor,
    placeholders: &mut Placeholders,
    filter: &F,
) -> RepoResult<FilterFragment> {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    for predicate in filter.predicates() {
        match predicate {
            Predicate::Eq { field, value } => {
                if is_blank(&value) {
                    continue;
                }
                let column = resolve(descriptor, field)?;
                conditions.push(format!("{column} = {}", placeholders.next_placeholder()));
                params.push(value);
            }
            Predicate::Range { field, min, max } => {
                let min = min.filter(|value| !is_blank(value));
                let max = max.filter(|value| !is_blank(value));
                if min.is_none() && max.is_none() {
                    continue;
                }
                let column = resolve(descriptor, field)?;
                if let Some(min) = min {
                    conditions.push(format!("{column} >= {}", placeholders.next_placeholder()));
                    params.push(min);
                }
                if let Some(max) = max {
                    conditions.push(format!("{column} <= {}", placeholders.next_placeholder()));
                    params.push(max);
                }
            }
            Predicate::Prefix { field, value } => {
                if value.is_empty() {
                    continue;
                }
                let column = resolve(descriptor, field)?;
                let (condition, pattern) =
                    pattern_condition(column, placeholders, &value, Anchor::Start);
                conditions.push(condition);
                params.push(pattern);
            }
            Predicate::Contains { field, value } => {
                if value.is_empty() {
                    continue;
                }
                let column = resolve(descriptor, field)?;
                let (condition, pattern) =
                    pattern_condition(column, placeholders, &value, Anchor::Anywhere);
                conditions.push(condition);
                params.push(pattern);
            }
        }
    }

    Ok(FilterFragment {
        sql: conditions.join(" AND "),
        params,
    })
}

/// Compiles a sort spec into an ORDER BY body (without the keyword).
///
/// Terms are comma-separated logical field names, each either prefixed with
/// `-`/`+` or followed by `asc`/`desc`. Key columns the spec leaves out are
/// appended ascending as tie-breakers, so a blank or absent spec orders by
/// primary key alone.
pub fn compile_sort(descriptor: &EntityDescriptor, sort: Option<&str>) -> RepoResult<String> {
    let mut terms: Vec<(&'static str, bool)> = Vec::new();

    for raw in sort.unwrap_or_default().split(',') {
        let term = raw.trim();
        if term.is_empty() {
            continue;
        }

        let (field, descending) = if let Some(field) = term.strip_prefix('-') {
            (field.trim(), true)
        } else if let Some(field) = term.strip_prefix('+') {
            (field.trim(), false)
        } else {
            let mut parts = term.split_whitespace();
            let field = parts.next().unwrap_or_default();
            let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(_) => return Err(RepoError::InvalidField(term.to_string())),
            };
            if parts.next().is_some() {
                return Err(RepoError::InvalidField(term.to_string()));
            }
            (field, descending)
        };

        let column = resolve(descriptor, field)?;
        if !terms.iter().any(|(seen, _)| *seen == column) {
            terms.push((column, descending));
        }
    }

    for def in descriptor.keys() {
        if !terms.iter().any(|(seen, _)| *seen == def.column) {
            terms.push((def.column, false));
        }
    }

    Ok(terms
        .iter()
        .map(|(column, descending)| {
            format!("{column} {}", if *descending { "DESC" } else { "ASC" })
        })
        .collect::<Vec<_>>()
        .join(", "))
}

fn resolve(descriptor: &EntityDescriptor, field: &str) -> RepoResult<&'static str> {
    descriptor
        .column_of(field)
        .ok_or_else(|| RepoError::InvalidField(field.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    Start,
    Anywhere,
}

/// Case-sensitive pattern match, independent of connection settings.
///
/// SQLite uses `GLOB` (its `LIKE` folds ASCII case by default), MySQL
/// compares as binary, Postgres and Oracle use plain `LIKE`.
fn pattern_condition(
    column: &str,
    placeholders: &mut Placeholders,
    raw: &str,
    anchor: Anchor,
) -> (String, Value) {
    let placeholder = placeholders.next_placeholder();
    let (condition, escaped, wildcard) = match placeholders.dialect() {
        Dialect::Sqlite => (format!("{column} GLOB {placeholder}"), escape_glob(raw), '*'),
        Dialect::MySql => (
            format!("CAST({column} AS BINARY) LIKE {placeholder} ESCAPE '{LIKE_ESCAPE}'"),
            escape_like(raw),
            '%',
        ),
        Dialect::Postgres | Dialect::Oracle => (
            format!("{column} LIKE {placeholder} ESCAPE '{LIKE_ESCAPE}'"),
            escape_like(raw),
            '%',
        ),
    };
    let pattern = match anchor {
        Anchor::Start => format!("{escaped}{wildcard}"),
        Anchor::Anywhere => format!("{wildcard}{escaped}{wildcard}"),
    };
    (condition, Value::Text(pattern))
}

/// GLOB has no ESCAPE clause; metacharacters become one-char classes.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '*' | '?' | '[' => {
                escaped.push('[');
                escaped.push(ch);
                escaped.push(']');
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch == LIKE_ESCAPE || ch == '%' || ch == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(ch);
    }
    escaped
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(text) => text.is_empty(),
        _ => false,
    }
}
