//! Count and page variants of a base select.
//!
//! Both transforms are pure: the parameter list is copied unchanged, and the
//! page window is rendered as integer literals rather than bound.

use crate::sql::{Dialect, Statement};

const FROM_KEYWORD: &str = " FROM ";
const ORDER_BY_KEYWORD: &str = " ORDER BY ";

/// Replaces the select list with `COUNT(*)` and drops a trailing ORDER BY.
///
/// The base statement must be a single-table select whose select list
/// contains no ` FROM ` text, which holds for every select the builder emits.
pub fn count_query(base: &Statement) -> Statement {
    let upper = base.sql.to_ascii_uppercase();
    let from_index = upper.find(FROM_KEYWORD).unwrap_or(upper.len());
    let end = upper[from_index..]
        .rfind(ORDER_BY_KEYWORD)
        .map_or(upper.len(), |index| from_index + index);

    Statement::new(
        format!("SELECT COUNT(*){}", &base.sql[from_index..end]),
        base.params.clone(),
    )
}

/// Appends the dialect's row-window suffix.
///
/// Negative inputs are clamped to zero.
pub fn page_query(base: &Statement, dialect: Dialect, limit: i64, offset: i64) -> Statement {
    let limit = limit.max(0);
    let offset = offset.max(0);
    let suffix = match dialect {
        Dialect::Sqlite | Dialect::MySql | Dialect::Postgres => {
            format!(" LIMIT {limit} OFFSET {offset}")
        }
        Dialect::Oracle => format!(" OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY"),
    };

    Statement::new(format!("{}{suffix}", base.sql), base.params.clone())
}
