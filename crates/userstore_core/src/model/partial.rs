//! Sparse field → value association used by patch writes.
//!
//! # Invariants
//! - Iteration order is insertion order, so generated SQL is reproducible.
//! - A field appears at most once; re-setting keeps its original position.

use crate::repo::error::{RepoError, RepoResult};
use rusqlite::types::Value;
use serde_json::{Map, Value as JsonValue};

/// Typed partial update keyed by logical field name.
///
/// Primary-key entries identify the row; all other entries are assigned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialUpdate {
    entries: Vec<(String, Value)>,
}

impl PartialUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`PartialUpdate::set`].
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts a decoded JSON object (e.g. an HTTP PATCH body).
    ///
    /// Strings, numbers, booleans and null are accepted; booleans are stored
    /// as `0`/`1`.
    ///
    /// # Errors
    /// - Returns `InvalidValue` for arrays, objects and non-finite numbers.
    pub fn from_json(object: &Map<String, JsonValue>) -> RepoResult<Self> {
        let mut update = Self::new();
        for (field, value) in object {
            update.set(field.as_str(), json_to_value(field, value)?);
        }
        Ok(update)
    }
}

fn json_to_value(field: &str, value: &JsonValue) -> RepoResult<Value> {
    let converted = match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(flag) => Value::Integer(i64::from(*flag)),
        JsonValue::String(text) => Value::Text(text.clone()),
        JsonValue::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Value::Integer(integer)
            } else if let Some(real) = number.as_f64().filter(|real| real.is_finite()) {
                Value::Real(real)
            } else {
                return Err(RepoError::InvalidValue {
                    field: field.to_string(),
                    message: format!("number `{number}` is out of range"),
                });
            }
        }
        JsonValue::Array(_) | JsonValue::Object(_) => {
            return Err(RepoError::InvalidValue {
                field: field.to_string(),
                message: "nested arrays and objects cannot be stored in a column".to_string(),
            });
        }
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::PartialUpdate;
    use crate::repo::error::RepoError;
    use rusqlite::types::Value;
    use serde_json::json;

    #[test]
    fn set_replaces_in_place() {
        let mut update = PartialUpdate::new()
            .with("id", "u1".to_string())
            .with("email", "a@b.com".to_string())
            .with("phone", "555".to_string());
        update.set("email", "x@y.com".to_string());

        let fields = update.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(fields, vec!["id", "email", "phone"]);
        assert_eq!(update.get("email"), Some(&Value::Text("x@y.com".to_string())));
        assert_eq!(update.len(), 3);
    }

    #[test]
    fn from_json_maps_scalars() {
        let body = json!({
            "id": "u1",
            "age": 42,
            "score": 1.5,
            "active": true,
            "phone": null
        });
        let update = PartialUpdate::from_json(body.as_object().unwrap()).unwrap();

        assert_eq!(update.get("id"), Some(&Value::Text("u1".to_string())));
        assert_eq!(update.get("age"), Some(&Value::Integer(42)));
        assert_eq!(update.get("score"), Some(&Value::Real(1.5)));
        assert_eq!(update.get("active"), Some(&Value::Integer(1)));
        assert_eq!(update.get("phone"), Some(&Value::Null));
    }

    #[test]
    fn from_json_rejects_nested_values() {
        let body = json!({ "id": "u1", "email": ["a@b.com"] });
        let err = PartialUpdate::from_json(body.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, RepoError::InvalidValue { ref field, .. } if field == "email"));
    }
}
