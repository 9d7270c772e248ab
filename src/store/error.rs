//! Error types for table access

use thiserror::Error;

use crate::schema::SchemaError;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),

    #[error("Unknown field '{field}' for entity '{entity}'")]
    UnknownField { entity: String, field: String },

    #[error("Missing required field '{field}' for entity '{entity}'")]
    MissingField { entity: String, field: String },

    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("Invalid query '{0}'")]
    InvalidQuery(String),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
