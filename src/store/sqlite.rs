//! SQLite backend for entity tables
//!
//! Schemas live in a `_schemas` catalogue table as JSON; every entity gets a
//! table of its own with an integer `id` primary key and one column per
//! data field.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{
    params, params_from_iter,
    types::{Value as SqlValue, ValueRef},
    Connection, OptionalExtension,
};
use serde_json::Value;
use std::{collections::HashSet, path::Path};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Query, SchemaTable, StoreError, StoreResult};
use crate::schema::{is_metadata_key, FieldType, Record, Schema};

/// Name of the primary key column present in every entity table
pub const ID_COLUMN: &str = "id";

/// Entity store backed by a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub async fn open<P: AsRef<Path>>(db_path: P) -> StoreResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn).await
    }

    /// Open a private in-memory database
    pub async fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> StoreResult<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables().await?;
        Ok(store)
    }

    /// Create the schema catalogue
    async fn create_tables(&self) -> StoreResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS _schemas (
                entity TEXT PRIMARY KEY,
                schema TEXT NOT NULL,
                defined_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Register a schema and create or extend the entity table
    pub async fn define(&self, entity: &str, schema: &Schema) -> StoreResult<()> {
        check_identifier(entity)?;
        for name in schema.field_names() {
            check_identifier(&name)?;
            if name == ID_COLUMN {
                return Err(StoreError::InvalidIdentifier(name));
            }
        }

        let schema_json = serde_json::to_string(schema)?;
        let now = Utc::now().to_rfc3339();

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO _schemas (entity, schema, defined_at) VALUES (?1, ?2, ?3)",
            params![entity, schema_json, now],
        )?;

        let mut ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY AUTOINCREMENT",
            quote(entity),
            ID_COLUMN
        );
        for (name, descriptor) in schema.fields() {
            ddl.push_str(&format!(", {} {}", quote(name), descriptor.field_type.sql_type()));
        }
        ddl.push(')');
        conn.execute(&ddl, [])?;

        // A redefinition may introduce new fields
        let existing = existing_columns(&conn, entity)?;
        for (name, descriptor) in schema.fields() {
            if !existing.contains(name) {
                debug!("Adding column {}.{}", entity, name);
                conn.execute(
                    &format!(
                        "ALTER TABLE {} ADD COLUMN {} {}",
                        quote(entity),
                        quote(name),
                        descriptor.field_type.sql_type()
                    ),
                    [],
                )?;
            }
        }

        info!("Defined entity '{}' with {} fields", entity, schema.field_names().len());
        Ok(())
    }

    /// Insert a new row, filling schema defaults for missing fields
    pub async fn insert(&self, entity: &str, record: &Record) -> StoreResult<i64> {
        let conn = self.conn.lock().await;
        let schema = load_schema(&conn, entity)?;

        let mut values = record.clone();
        for (name, descriptor) in schema.fields() {
            if values.contains_key(name) {
                continue;
            }
            if let Some(default) = &descriptor.default {
                values.insert(name.clone(), default.clone());
            } else if descriptor.required {
                return Err(StoreError::MissingField {
                    entity: entity.to_string(),
                    field: name.clone(),
                });
            }
        }

        let mut columns = Vec::with_capacity(values.len());
        let mut sql_values = Vec::with_capacity(values.len());
        for (field, value) in &values {
            check_column(&schema, entity, field)?;
            columns.push(quote(field));
            sql_values.push(to_sql_value(value));
        }

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(entity))
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(entity),
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        };
        conn.execute(&sql, params_from_iter(sql_values.iter()))?;

        let id = conn.last_insert_rowid();
        debug!("Inserted {}.{}={}", entity, ID_COLUMN, id);
        Ok(id)
    }
}

#[async_trait]
impl SchemaTable for SqliteStore {
    async fn describe(&self, entity: &str) -> StoreResult<Schema> {
        let conn = self.conn.lock().await;
        load_schema(&conn, entity)
    }

    async fn select(&self, fields: &[String], query: &Query) -> StoreResult<Vec<Record>> {
        let conn = self.conn.lock().await;
        let entity = query.entity();
        let schema = load_schema(&conn, entity)?;
        column_type(&schema, entity, query.field())?;

        let types = fields
            .iter()
            .map(|field| column_type(&schema, entity, field))
            .collect::<StoreResult<Vec<FieldType>>>()?;

        let mut columns = vec![ID_COLUMN.to_string()];
        columns.extend(fields.iter().map(|field| quote(field)));
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            columns.join(", "),
            quote(entity),
            quote(query.field())
        );
        debug!("select: {}", sql);

        let mut stmt = conn.prepare(&sql)?;
        let row_iter = stmt.query_map([to_sql_value(query.value())], |row| {
            let mut record = Record::new();
            for (index, (field, field_type)) in fields.iter().zip(&types).enumerate() {
                let value = from_sql_value(row.get_ref(index + 1)?, *field_type);
                record.insert(field.clone(), value);
            }
            Ok(record)
        })?;

        let mut records = Vec::new();
        for record in row_iter {
            records.push(record?);
        }
        Ok(records)
    }

    async fn update(&self, values: &Record, query: &Query) -> StoreResult<u64> {
        if values.is_empty() {
            return Ok(0);
        }

        let conn = self.conn.lock().await;
        let entity = query.entity();
        let schema = load_schema(&conn, entity)?;
        column_type(&schema, entity, query.field())?;

        let mut assignments = Vec::with_capacity(values.len());
        let mut sql_values = Vec::with_capacity(values.len() + 1);
        for (field, value) in values {
            check_column(&schema, entity, field)?;
            assignments.push(format!("{} = ?", quote(field)));
            sql_values.push(to_sql_value(value));
        }
        sql_values.push(to_sql_value(query.value()));

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote(entity),
            assignments.join(", "),
            quote(query.field())
        );
        let affected = conn.execute(&sql, params_from_iter(sql_values.iter()))?;

        debug!("update {}: {} row(s)", query, affected);
        Ok(affected as u64)
    }

    async fn delete(&self, query: &Query) -> StoreResult<u64> {
        let conn = self.conn.lock().await;
        let entity = query.entity();
        let schema = load_schema(&conn, entity)?;
        column_type(&schema, entity, query.field())?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1",
            quote(entity),
            quote(query.field())
        );
        let affected = conn.execute(&sql, [to_sql_value(query.value())])?;

        debug!("delete {}: {} row(s)", query, affected);
        Ok(affected as u64)
    }
}

fn load_schema(conn: &Connection, entity: &str) -> StoreResult<Schema> {
    let schema_json: Option<String> = conn
        .query_row(
            "SELECT schema FROM _schemas WHERE entity = ?1",
            [entity],
            |row| row.get(0),
        )
        .optional()?;

    let schema_json = schema_json.ok_or_else(|| StoreError::UnknownEntity(entity.to_string()))?;
    Ok(serde_json::from_str(&schema_json)?)
}

fn existing_columns(conn: &Connection, entity: &str) -> StoreResult<HashSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(entity)))?;
    let column_iter = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = HashSet::new();
    for column in column_iter {
        columns.insert(column?);
    }
    Ok(columns)
}

/// Resolve the storage type of a selectable column
fn column_type(schema: &Schema, entity: &str, field: &str) -> StoreResult<FieldType> {
    if field == ID_COLUMN {
        return Ok(FieldType::Integer);
    }
    schema
        .field(field)
        .map(|descriptor| descriptor.field_type)
        .ok_or_else(|| StoreError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        })
}

/// Writable columns are the schema fields; the primary key is not one of them
fn check_column(schema: &Schema, entity: &str, field: &str) -> StoreResult<()> {
    if schema.has_field(field) {
        Ok(())
    } else {
        Err(StoreError::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        })
    }
}

fn check_identifier(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && !is_metadata_key(name)
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => number
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| number.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(text) => SqlValue::Text(text.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>, field_type: FieldType) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(number) if field_type == FieldType::Boolean => Value::Bool(number != 0),
        ValueRef::Integer(number) => Value::from(number),
        ValueRef::Real(number) => serde_json::Number::from_f64(number)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            if field_type == FieldType::Json {
                serde_json::from_str(&text).unwrap_or(Value::String(text))
            } else {
                Value::String(text)
            }
        }
        ValueRef::Blob(bytes) => Value::Array(bytes.iter().map(|byte| Value::from(*byte)).collect()),
    }
}
