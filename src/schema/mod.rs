//! Schema model for entity tables
//!
//! A schema maps field names to field descriptors. Keys that start with
//! [`META_PREFIX`] describe the entity itself (display strings and the like)
//! and are never treated as data fields.

mod record;

pub use record::*;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Prefix reserved for schema metadata keys
pub const META_PREFIX: char = '_';

/// Metadata key holding the human-readable entity strings
pub const STRINGS_KEY: &str = "_strings";

/// Check whether a schema key is a metadata entry rather than a data field
pub fn is_metadata_key(name: &str) -> bool {
    name.starts_with(META_PREFIX)
}

/// Schema-specific error types
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Field name '{0}' uses the reserved metadata prefix")]
    ReservedName(String),

    #[error("Field name must not be empty")]
    EmptyName,

    #[error("Invalid descriptor for field '{field}': {source}")]
    InvalidDescriptor {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid metadata entry '{key}': {source}")]
    InvalidMetadata {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage type of a data field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Text,
    Integer,
    Double,
    Boolean,
    Date,
    Datetime,
    Json,
    Reference,
}

impl FieldType {
    /// SQL column affinity used by the SQLite backend
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Integer | FieldType::Boolean | FieldType::Reference => "INTEGER",
            FieldType::Double => "REAL",
            FieldType::String
            | FieldType::Text
            | FieldType::Date
            | FieldType::Datetime
            | FieldType::Json => "TEXT",
        }
    }
}

/// Descriptor of a single data field
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDescriptor {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// Human-readable strings stored under [`STRINGS_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaStrings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_plural: Option<String>,
}

/// Schema of an entity: data fields plus metadata entries
///
/// Serialized as a flat JSON object where every `_`-prefixed key is a
/// metadata entry and every other key is a field descriptor. Fields keep the
/// order in which they were declared.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Schema {
    fields: Vec<(String, FieldDescriptor)>,
    metadata: Map<String, Value>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data field, rejecting names in the metadata namespace
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        descriptor: FieldDescriptor,
    ) -> Result<(), SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyName);
        }
        if is_metadata_key(&name) {
            return Err(SchemaError::ReservedName(name));
        }
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = descriptor,
            None => self.fields.push((name, descriptor)),
        }
        Ok(())
    }

    /// Builder form of [`Schema::add_field`]
    pub fn with_field(
        mut self,
        name: impl Into<String>,
        descriptor: FieldDescriptor,
    ) -> Result<Self, SchemaError> {
        self.add_field(name, descriptor)?;
        Ok(self)
    }

    pub fn with_strings(mut self, strings: SchemaStrings) -> Self {
        let value = serde_json::to_value(strings).unwrap_or(Value::Null);
        self.metadata.insert(STRINGS_KEY.to_string(), value);
        self
    }

    /// Names of the data fields in declaration order; metadata keys never
    /// appear here
    pub fn field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !is_metadata_key(name))
            .cloned()
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, descriptor)| descriptor)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldDescriptor)> {
        self.fields.iter().map(|(name, descriptor)| (name, descriptor))
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Parsed `_strings` metadata, if present and well-formed
    pub fn strings(&self) -> Option<SchemaStrings> {
        self.metadata
            .get(STRINGS_KEY)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Display title for forms of this entity
    ///
    /// Uses `_strings.name` and falls back to the entity name whenever the
    /// metadata or its `name` entry is missing.
    pub fn display_title(&self, entity: &str) -> String {
        self.strings()
            .and_then(|strings| strings.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| entity.to_string())
    }
}

impl TryFrom<Map<String, Value>> for Schema {
    type Error = SchemaError;

    fn try_from(entries: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut schema = Schema::new();
        for (key, value) in entries {
            if is_metadata_key(&key) {
                schema.metadata.insert(key, value);
                continue;
            }
            let descriptor = serde_json::from_value(value).map_err(|source| {
                SchemaError::InvalidDescriptor {
                    field: key.clone(),
                    source,
                }
            })?;
            schema.add_field(key, descriptor)?;
        }

        if let Some(strings) = schema.metadata.get(STRINGS_KEY) {
            serde_json::from_value::<SchemaStrings>(strings.clone()).map_err(|source| {
                SchemaError::InvalidMetadata {
                    key: STRINGS_KEY.to_string(),
                    source,
                }
            })?;
        }

        Ok(schema)
    }
}

impl From<Schema> for Map<String, Value> {
    fn from(schema: Schema) -> Self {
        let mut entries = Map::new();
        for (name, descriptor) in schema.fields {
            let value = serde_json::to_value(descriptor).unwrap_or(Value::Null);
            entries.insert(name, value);
        }
        entries.extend(schema.metadata);
        entries
    }
}
