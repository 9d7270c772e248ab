//! Table access for schema-driven entities
//!
//! [`SchemaTable`] is the seam between edit sessions and whatever engine
//! actually stores the records. [`SqliteStore`] is the bundled backend.

mod error;
mod query;
mod sqlite;

pub use error::*;
pub use query::*;
pub use sqlite::*;

use async_trait::async_trait;

use crate::schema::{Record, Schema};

/// Schema-aware access to entity tables
#[async_trait]
pub trait SchemaTable: Send + Sync {
    /// Get the schema of an entity
    async fn describe(&self, entity: &str) -> StoreResult<Schema>;

    /// Fetch the given fields of every row matching the query
    async fn select(&self, fields: &[String], query: &Query) -> StoreResult<Vec<Record>>;

    /// Write values into every row matching the query, returning the affected row count
    async fn update(&self, values: &Record, query: &Query) -> StoreResult<u64>;

    /// Delete every row matching the query, returning the affected row count
    async fn delete(&self, query: &Query) -> StoreResult<u64>;
}
