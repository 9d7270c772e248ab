//! Record commands: define, insert, show, edit and delete

use anyhow::{anyhow, bail, Context as _, Result};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use super::root::Context;
use crate::{
    edit::{DeleteOutcome, EditSession, LoadOutcome, SubmitOutcome},
    schema::{Record, Schema},
};

/// Register an entity schema and create its table
#[derive(Args)]
pub struct DefineCommand {
    /// Entity name
    pub entity: String,

    /// JSON file describing the entity's fields
    pub schema_file: PathBuf,
}

impl DefineCommand {
    pub async fn execute(&self, context: &Context) -> Result<()> {
        let content = tokio::fs::read_to_string(&self.schema_file)
            .await
            .with_context(|| format!("Failed to read {}", self.schema_file.display()))?;
        let schema: Schema = serde_json::from_str(&content)
            .with_context(|| format!("Invalid schema in {}", self.schema_file.display()))?;

        context.store.define(&self.entity, &schema).await?;
        println!(
            "Defined {} ({} fields)",
            schema.display_title(&self.entity),
            schema.field_names().len()
        );
        Ok(())
    }
}

/// Insert a new record
#[derive(Args)]
pub struct InsertCommand {
    /// Entity name
    pub entity: String,

    /// Field values as field=value
    pub assignments: Vec<String>,
}

impl InsertCommand {
    pub async fn execute(&self, context: &Context) -> Result<()> {
        let record = parse_assignments(&self.assignments)?;
        let id = context.store.insert(&self.entity, &record).await?;
        info!("Inserted {} {}", self.entity, id);
        println!("{}", id);
        Ok(())
    }
}

/// Show one record
#[derive(Args)]
pub struct ShowCommand {
    /// Entity name
    pub entity: String,

    /// Record id
    pub id: i64,

    /// Print the record as JSON
    #[arg(long)]
    pub json: bool,
}

impl ShowCommand {
    pub async fn execute(&self, context: &Context) -> Result<()> {
        let (mut session, outcome) = context.open_session(&self.entity, self.id).await?;
        ensure_loaded(&session, outcome)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(session.master())?);
        } else {
            print!("{}", render(&session));
        }

        session.close();
        Ok(())
    }
}

/// Update one record
#[derive(Args)]
pub struct EditCommand {
    /// Entity name
    pub entity: String,

    /// Record id
    pub id: i64,

    /// New field values as field=value; `field=` sets null
    #[arg(required = true)]
    pub assignments: Vec<String>,
}

impl EditCommand {
    pub async fn execute(&self, context: &Context) -> Result<()> {
        let changes = parse_assignments(&self.assignments)?;

        let (mut session, outcome) = context.open_session(&self.entity, self.id).await?;
        ensure_loaded(&session, outcome)?;

        for (field, value) in changes {
            session.set_field(&field, value)?;
        }
        debug!("Changed fields: {:?}", session.changes());

        match session.submit_working().await? {
            SubmitOutcome::Ignored => println!("Nothing to save"),
            SubmitOutcome::Updated { affected } => println!("Updated {} row(s)", affected),
        }
        Ok(())
    }
}

/// Delete one record after confirmation
#[derive(Args)]
pub struct DeleteCommand {
    /// Entity name
    pub entity: String,

    /// Record id
    pub id: i64,
}

impl DeleteCommand {
    pub async fn execute(&self, context: &Context) -> Result<()> {
        let (mut session, outcome) = context.open_session(&self.entity, self.id).await?;
        ensure_loaded(&session, outcome)?;

        match session.delete_record().await? {
            DeleteOutcome::Declined => {
                session.close();
                println!("Kept {}", session.key());
            }
            DeleteOutcome::Deleted { affected } => println!("Deleted {} row(s)", affected),
        }
        Ok(())
    }
}

fn ensure_loaded(session: &EditSession, outcome: LoadOutcome) -> Result<()> {
    match outcome {
        LoadOutcome::Loaded => Ok(()),
        LoadOutcome::NotFound => bail!("{} not found", session.key()),
        LoadOutcome::StorageError(message) => bail!("Failed to load {}: {}", session.key(), message),
    }
}

/// Plain text listing of the session's master copy; unset fields show as `-`
fn render(session: &EditSession) -> String {
    let width = session.fields().iter().map(String::len).max().unwrap_or(0);
    let mut out = format!("{}\n", session.form_title());
    for field in session.fields() {
        let value = match session.master().get(field) {
            Some(Value::String(text)) => text.clone(),
            Some(value) => value.to_string(),
            None => "-".to_string(),
        };
        out.push_str(&format!("  {:width$}  {}\n", field, value, width = width));
    }
    out
}

fn parse_assignments(assignments: &[String]) -> Result<Record> {
    assignments.iter().map(|assignment| parse_assignment(assignment)).collect()
}

/// Split `field=value`; the value is read as JSON when it parses, as a plain
/// string otherwise, and as null when empty
pub fn parse_assignment(assignment: &str) -> Result<(String, Value)> {
    let (field, raw) = assignment
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected field=value, got '{}'", assignment))?;

    let field = field.trim();
    if field.is_empty() {
        bail!("Missing field name in '{}'", assignment);
    }

    let value = if raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    };
    Ok((field.to_string(), value))
}
