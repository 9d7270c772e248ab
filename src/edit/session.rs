//! Edit session for a single record
//!
//! The session keeps two copies of the record: the master copy, the last
//! state known to be committed, and the working copy the caller edits. Load,
//! submit and delete resolve against a [`SchemaTable`] and report to the user
//! through the [`DialogService`] before leaving for the record list.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::*;
use crate::{
    dialog::{Choice, DialogService},
    navigation::Navigator,
    schema::{self, Record},
    store::{Query, SchemaTable, StoreError},
};

pub const NOT_FOUND_MESSAGE: &str = "Record not found";
pub const UPDATED_MESSAGE: &str = "Record updated";
pub const DELETED_MESSAGE: &str = "Record deleted";
pub const DELETE_TITLE: &str = "Delete Record";
pub const DELETE_QUESTION: &str = "Are you sure you want to delete this record?";

/// Collaborators an edit session works with
#[derive(Clone)]
pub struct SessionServices {
    pub table: Arc<dyn SchemaTable>,
    pub dialogs: Arc<DialogService>,
    pub navigator: Arc<dyn Navigator>,
    pub row_count_policy: RowCountPolicy,
}

impl SessionServices {
    pub fn new(
        table: Arc<dyn SchemaTable>,
        dialogs: Arc<DialogService>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            table,
            dialogs,
            navigator,
            row_count_policy: RowCountPolicy::default(),
        }
    }

    pub fn with_row_count_policy(mut self, policy: RowCountPolicy) -> Self {
        self.row_count_policy = policy;
        self
    }
}

/// Editing state of one record
pub struct EditSession {
    services: SessionServices,
    key: RecordKey,
    state: SessionState,
    form_title: String,
    fields: Vec<String>,
    master: Record,
    working: Record,
    event_sender: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EditSession {
    /// Create a session for `key` with empty copies, waiting to load
    pub fn new(services: SessionServices, key: RecordKey) -> Self {
        let form_title = key.entity.clone();
        Self {
            services,
            key,
            state: SessionState::Loading,
            form_title,
            fields: Vec::new(),
            master: Record::new(),
            working: Record::new(),
            event_sender: None,
        }
    }

    /// Create a session and load its record
    pub async fn open(services: SessionServices, key: RecordKey) -> SessionResult<(Self, LoadOutcome)> {
        let mut session = Self::new(services, key);
        let outcome = session.initialize().await?;
        Ok((session, outcome))
    }

    /// Set the event sender for session notifications
    pub fn set_event_sender(&mut self, sender: mpsc::UnboundedSender<SessionEvent>) {
        self.event_sender = Some(sender);
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Title for the edit form
    pub fn form_title(&self) -> &str {
        &self.form_title
    }

    /// Data fields of the entity, metadata excluded
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn master(&self) -> &Record {
        &self.master
    }

    pub fn working(&self) -> &Record {
        &self.working
    }

    /// Direct access to the working copy for editing
    pub fn working_mut(&mut self) -> &mut Record {
        &mut self.working
    }

    /// Set a field of the working copy
    pub fn set_field(&mut self, field: &str, value: Value) -> SessionResult<()> {
        self.check_field(field)?;
        self.working.insert(field.to_string(), value);
        Ok(())
    }

    /// Unset a field of the working copy
    pub fn clear_field(&mut self, field: &str) -> SessionResult<Option<Value>> {
        self.check_field(field)?;
        Ok(self.working.remove(field))
    }

    /// Fields whose working value differs from the master copy
    pub fn changes(&self) -> Vec<String> {
        schema::changed_fields(&self.master, &self.working)
    }

    pub fn is_dirty(&self) -> bool {
        self.master != self.working
    }

    /// Start over: empty the master copy, reset the working copy from it and
    /// load the record
    pub async fn initialize(&mut self) -> SessionResult<LoadOutcome> {
        self.state = SessionState::Loading;
        self.master.clear();
        self.reset();
        self.load().await
    }

    /// Load schema and record, populating both copies
    ///
    /// Anything other than exactly one matching row closes the session after
    /// an error prompt and a return to the record list.
    pub async fn load(&mut self) -> SessionResult<LoadOutcome> {
        if !matches!(self.state, SessionState::Loading | SessionState::Ready) {
            return Err(SessionError::NotReady(self.state));
        }
        self.state = SessionState::Loading;

        let table = self.services.table.clone();
        let entity = self.key.entity.clone();
        let selector = self.key.selector();
        debug!("Loading {}", selector);

        let schema = match table.describe(&entity).await {
            Ok(schema) => schema,
            Err(err) => return self.fail_load(err).await,
        };
        let fields = schema.field_names();
        let form_title = schema.display_title(&entity);

        let rows = match table.select(&fields, &selector).await {
            Ok(rows) => rows,
            Err(err) => return self.fail_load(err).await,
        };

        let [row] = rows.as_slice() else {
            warn!("{} matched {} rows, expected exactly one", selector, rows.len());
            return self.not_found().await;
        };

        let mut master = Record::new();
        for field in &fields {
            if let Some(value) = row.get(field) {
                master.insert(field.clone(), value.clone());
            }
        }

        self.fields = fields;
        self.form_title = form_title;
        self.working = master.clone();
        self.master = master;
        self.state = SessionState::Ready;

        info!("Loaded {} ({} fields set)", self.key, self.master.len());
        self.emit(SessionEvent::Loaded {
            key: self.key.clone(),
            form_title: self.form_title.clone(),
        });
        Ok(LoadOutcome::Loaded)
    }

    /// Discard unsaved edits
    pub fn reset(&mut self) {
        self.working = self.master.clone();
        self.emit(SessionEvent::Reset {
            key: self.key.clone(),
        });
    }

    /// Commit the working copy
    pub async fn submit_working(&mut self) -> SessionResult<SubmitOutcome> {
        let values = self.working.clone();
        self.submit(&values).await
    }

    /// Commit form values to the record
    ///
    /// A form where every value is unset or null is ignored: no write, no
    /// prompt, no navigation.
    pub async fn submit(&mut self, values: &Record) -> SessionResult<SubmitOutcome> {
        self.ensure_ready()?;

        if schema::is_blank(values) {
            debug!("Ignoring blank submission for {}", self.key);
            return Ok(SubmitOutcome::Ignored);
        }

        self.state = SessionState::Committing;
        let selector = self.key.selector();

        let affected = match self.services.table.update(values, &selector).await {
            Ok(affected) => affected,
            Err(err) => return Err(self.fail_write("saved", err).await),
        };
        self.check_affected(affected, &selector).await?;

        info!("Updated {} ({} row(s))", self.key, affected);
        self.emit(SessionEvent::Updated {
            key: self.key.clone(),
            affected,
        });

        self.announce(UPDATED_MESSAGE).await;
        self.leave().await?;
        Ok(SubmitOutcome::Updated { affected })
    }

    /// Delete the record after the user confirms
    pub async fn delete_record(&mut self) -> SessionResult<DeleteOutcome> {
        self.ensure_ready()?;

        let choice = self
            .services
            .dialogs
            .confirm_action(DELETE_TITLE, DELETE_QUESTION)
            .await?;
        if choice == Choice::Cancelled {
            debug!("Delete of {} declined", self.key);
            return Ok(DeleteOutcome::Declined);
        }

        self.state = SessionState::Deleting;
        let selector = self.key.selector();

        let affected = match self.services.table.delete(&selector).await {
            Ok(affected) => affected,
            Err(err) => return Err(self.fail_write("deleted", err).await),
        };
        self.check_affected(affected, &selector).await?;

        info!("Deleted {} ({} row(s))", self.key, affected);
        self.emit(SessionEvent::Deleted {
            key: self.key.clone(),
            affected,
        });

        self.announce(DELETED_MESSAGE).await;
        self.leave().await?;
        Ok(DeleteOutcome::Deleted { affected })
    }

    /// End the session and discard both copies
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.master.clear();
        self.working.clear();
        self.state = SessionState::Closed;

        debug!("Closed session for {}", self.key);
        self.emit(SessionEvent::Closed {
            key: self.key.clone(),
        });
    }

    fn ensure_ready(&self) -> SessionResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(SessionError::NotReady(self.state))
        }
    }

    fn check_field(&self, field: &str) -> SessionResult<()> {
        if self.fields.iter().any(|name| name == field) {
            Ok(())
        } else {
            Err(SessionError::UnknownField(field.to_string()))
        }
    }

    async fn not_found(&mut self) -> SessionResult<LoadOutcome> {
        self.state = SessionState::NotFound;
        self.emit(SessionEvent::NotFound {
            key: self.key.clone(),
        });

        self.report(NOT_FOUND_MESSAGE).await;
        self.leave().await?;
        Ok(LoadOutcome::NotFound)
    }

    async fn fail_load(&mut self, err: StoreError) -> SessionResult<LoadOutcome> {
        let message = err.to_string();
        error!("Failed to load {}: {}", self.key, message);
        self.emit(SessionEvent::LoadFailed {
            key: self.key.clone(),
            error: message.clone(),
        });

        self.report(&message).await;
        self.leave().await?;
        Ok(LoadOutcome::StorageError(message))
    }

    /// Report a failed write; the session stays open for another attempt
    async fn fail_write(&mut self, action: &str, err: StoreError) -> SessionError {
        error!("Record {} could not be {}: {}", self.key, action, err);
        self.state = SessionState::Ready;

        self.report(&format!("Record could not be {}: {}", action, err)).await;
        SessionError::Storage(err)
    }

    /// Apply the row count policy to a completed write
    async fn check_affected(&mut self, affected: u64, selector: &Query) -> SessionResult<()> {
        match (self.services.row_count_policy, affected) {
            (RowCountPolicy::Strict, 0) => {
                warn!("{} matched no row", selector);
                self.report(NOT_FOUND_MESSAGE).await;
                self.leave().await?;
                Err(SessionError::NothingAffected(selector.to_string()))
            }
            (_, affected) if affected > 1 => {
                warn!("{} affected {} rows", selector, affected);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Show a confirmation for an outcome that is already settled
    ///
    /// A failing prompt is logged and never holds the session in a
    /// transitional state.
    async fn announce(&self, message: &str) {
        if let Err(err) = self.services.dialogs.confirmation(message).await {
            warn!("Failed to confirm '{}' for {}: {}", message, self.key, err);
        }
    }

    /// Show an error prompt for an outcome that is already settled
    async fn report(&self, message: &str) {
        if let Err(err) = self.services.dialogs.error(message).await {
            warn!("Failed to report '{}' for {}: {}", message, self.key, err);
        }
    }

    /// Return to the record list and close; the session is closed even when
    /// navigation fails
    async fn leave(&mut self) -> SessionResult<()> {
        let navigated = self
            .services
            .navigator
            .go_to_list(&self.key.entity)
            .await
            .map_err(SessionError::Navigation);
        self.close();
        navigated
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(sender) = &self.event_sender {
            let _ = sender.send(event);
        }
    }
}
