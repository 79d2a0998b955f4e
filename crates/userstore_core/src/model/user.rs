//! User entity and its search filter.
//!
//! # Responsibility
//! - Declare how a `User` maps onto the `users` table.
//! - Define the search criteria the user listing supports.
//!
//! # Invariants
//! - `id` is the only key and is never reassigned by patches.
//! - Dates are stored as ISO-8601 `YYYY-MM-DD` text so range predicates
//!   compare chronologically.

use crate::repo::error::RepoResult;
use crate::schema::descriptor::FieldDef;
use crate::schema::entity::Entity;
use crate::sql::filter::{Filter, Predicate};
use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const USER_FIELDS: &[FieldDef] = &[
    FieldDef::key("id", "id"),
    FieldDef::new("username", "username"),
    FieldDef::new("email", "email"),
    FieldDef::new("phone", "phone"),
    FieldDef::new("dateOfBirth", "date_of_birth"),
];

/// Persisted user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl User {
    /// Creates a user with a generated id and empty contact fields.
    pub fn new(username: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), username)
    }

    pub fn with_id(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            email: String::new(),
            phone: String::new(),
            date_of_birth: None,
        }
    }
}

impl Entity for User {
    type Key = str;

    const TABLE: &'static str = "users";
    const FIELDS: &'static [FieldDef] = USER_FIELDS;

    fn values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.id.clone()),
            Value::Text(self.username.clone()),
            Value::Text(self.email.clone()),
            Value::Text(self.phone.clone()),
            self.date_of_birth.map_or(Value::Null, date_value),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get::<_, Option<String>>("email")?.unwrap_or_default(),
            phone: row.get::<_, Option<String>>("phone")?.unwrap_or_default(),
            date_of_birth: row.get("date_of_birth")?,
        })
    }
}

/// Bindable representation of a calendar date.
pub fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format("%Y-%m-%d").to_string())
}

/// Inclusive date bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
}

/// Search criteria for the user listing.
///
/// `username` and `email` match by prefix, `phone` by substring, `id`
/// exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFilter {
    pub id: Option<String>,
    pub date_of_birth: Option<DateRange>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Comma-separated field names, `-` prefix for descending.
    pub sort: Option<String>,
}

impl Filter for UserFilter {
    fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();

        if let Some(id) = &self.id {
            predicates.push(Predicate::Eq {
                field: "id",
                value: Value::Text(id.clone()),
            });
        }
        if let Some(range) = self.date_of_birth {
            predicates.push(Predicate::Range {
                field: "dateOfBirth",
                min: range.min.map(date_value),
                max: range.max.map(date_value),
            });
        }
        if let Some(username) = &self.username {
            predicates.push(Predicate::Prefix {
                field: "username",
                value: username.clone(),
            });
        }
        if let Some(email) = &self.email {
            predicates.push(Predicate::Prefix {
                field: "email",
                value: email.clone(),
            });
        }
        if let Some(phone) = &self.phone {
            predicates.push(Predicate::Contains {
                field: "phone",
                value: phone.clone(),
            });
        }

        predicates
    }

    fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserFilter};
    use crate::schema::entity::Entity;
    use chrono::NaiveDate;
    use rusqlite::types::Value;

    #[test]
    fn values_follow_field_order() {
        let mut user = User::with_id("u1", "alice");
        user.date_of_birth = NaiveDate::from_ymd_opt(1990, 4, 2);

        let values = user.values();
        assert_eq!(values.len(), User::FIELDS.len());
        assert_eq!(values[0], Value::Text("u1".to_string()));
        assert_eq!(values[4], Value::Text("1990-04-02".to_string()));
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(User::new("a").id, User::new("a").id);
    }

    #[test]
    fn filter_deserializes_camel_case() {
        let filter: UserFilter = serde_json::from_str(
            r#"{"username":"al","dateOfBirth":{"min":"1990-01-01"},"sort":"-username"}"#,
        )
        .unwrap();

        assert_eq!(filter.username.as_deref(), Some("al"));
        assert_eq!(
            filter.date_of_birth.and_then(|range| range.min),
            NaiveDate::from_ymd_opt(1990, 1, 1)
        );
        assert_eq!(filter.sort.as_deref(), Some("-username"));
        assert!(filter.phone.is_none());
    }
}
