//! Equality selectors over entity fields

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

use super::{StoreError, StoreResult};

/// Selects the rows of one entity whose field equals a value.
///
/// The textual form is `"<entity>.<field>=<value>"`, e.g. `person.id=42`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    entity: String,
    field: String,
    value: Value,
}

impl Query {
    pub fn new(entity: impl Into<String>, field: impl Into<String>, value: Value) -> Self {
        Self {
            entity: entity.into(),
            field: field.into(),
            value,
        }
    }

    /// Selector for a single record by primary key
    pub fn by_id(entity: impl Into<String>, id: i64) -> Self {
        Self::new(entity, "id", Value::from(id))
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Parse the textual `entity.field=value` form
    pub fn parse(expr: &str) -> StoreResult<Self> {
        let invalid = || StoreError::InvalidQuery(expr.to_string());

        let (target, raw_value) = expr.split_once('=').ok_or_else(invalid)?;
        let (entity, field) = target.trim().split_once('.').ok_or_else(invalid)?;
        if entity.is_empty() || field.is_empty() || field.contains('.') {
            return Err(invalid());
        }

        let raw_value = raw_value.trim();
        let value = match raw_value.parse::<i64>() {
            Ok(number) => Value::from(number),
            Err(_) => Value::String(raw_value.to_string()),
        };

        Ok(Self::new(entity, field, value))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::String(text) => write!(f, "{}.{}={}", self.entity, self.field, text),
            other => write!(f, "{}.{}={}", self.entity, self.field, other),
        }
    }
}

impl FromStr for Query {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
