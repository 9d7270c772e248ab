use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::{sync::Arc, sync::Mutex, time::Duration};
use tokio::sync::mpsc;

use super::*;
use crate::{
    dialog::{AutoAnswer, DialogService, PromptKind, Response, ScriptedPresenter},
    navigation::{HistoryNavigator, Navigator, Route},
    schema::{Record, Schema},
    store::{Query, SchemaTable, SqliteStore, StoreError, StoreResult},
};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Describe(String),
    Select(Vec<String>, String),
    Update(Record, String),
    Delete(String),
}

/// Table double that serves canned rows and records every call
struct RecordingTable {
    schema: Schema,
    rows: Vec<Record>,
    affected: u64,
    fail_on: Option<&'static str>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingTable {
    fn new(rows: Vec<Record>) -> Self {
        Self {
            schema: person_schema(),
            rows,
            affected: 1,
            fail_on: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn affecting(mut self, affected: u64) -> Self {
        self.affected = affected;
        self
    }

    fn failing_on(mut self, operation: &'static str) -> Self {
        self.fail_on = Some(operation);
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(&self, operation: &str) -> StoreResult<()> {
        if self.fail_on == Some(operation) {
            return Err(StoreError::Backend(format!("{} unavailable", operation)));
        }
        Ok(())
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn updates(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Update(..)))
            .collect()
    }

    fn deletes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::Delete(..)))
            .collect()
    }
}

#[async_trait]
impl SchemaTable for RecordingTable {
    async fn describe(&self, entity: &str) -> StoreResult<Schema> {
        self.record(Call::Describe(entity.to_string()));
        self.check("describe")?;
        Ok(self.schema.clone())
    }

    async fn select(&self, fields: &[String], query: &Query) -> StoreResult<Vec<Record>> {
        self.record(Call::Select(fields.to_vec(), query.to_string()));
        self.check("select")?;
        Ok(self.rows.clone())
    }

    async fn update(&self, values: &Record, query: &Query) -> StoreResult<u64> {
        self.record(Call::Update(values.clone(), query.to_string()));
        self.check("update")?;
        Ok(self.affected)
    }

    async fn delete(&self, query: &Query) -> StoreResult<u64> {
        self.record(Call::Delete(query.to_string()));
        self.check("delete")?;
        Ok(self.affected)
    }
}

fn person_schema() -> Schema {
    serde_json::from_value(json!({
        "name": {"type": "string"},
        "age": {"type": "integer"},
        "_strings": {"name": "Person"}
    }))
    .unwrap()
}

fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
}

fn alice() -> Record {
    record(json!({"name": "Alice", "age": 30}))
}

struct Harness {
    table: Arc<RecordingTable>,
    presenter: Arc<ScriptedPresenter>,
    navigator: Arc<HistoryNavigator>,
    policy: RowCountPolicy,
}

impl Harness {
    fn new(table: RecordingTable) -> Self {
        Self::with_presenter(table, ScriptedPresenter::new(AutoAnswer::Decline))
    }

    fn with_presenter(table: RecordingTable, presenter: ScriptedPresenter) -> Self {
        Self {
            table: Arc::new(table),
            presenter: Arc::new(presenter),
            navigator: Arc::new(HistoryNavigator::starting_at(Route::edit("person", 42))),
            policy: RowCountPolicy::Strict,
        }
    }

    fn services(&self) -> SessionServices {
        let dialogs = DialogService::new(self.presenter.clone()).with_confirmation_delay(Duration::ZERO);
        SessionServices::new(self.table.clone(), Arc::new(dialogs), self.navigator.clone())
            .with_row_count_policy(self.policy)
    }

    async fn open(&self) -> (EditSession, LoadOutcome) {
        EditSession::open(self.services(), RecordKey::new("person", 42))
            .await
            .unwrap()
    }

    fn prompt_kinds(&self) -> Vec<PromptKind> {
        self.presenter.prompts().into_iter().map(|prompt| prompt.kind).collect()
    }
}

#[tokio::test]
async fn test_load_populates_both_copies() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (session, outcome) = harness.open().await;

    assert_eq!(outcome, LoadOutcome::Loaded);
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.master(), &alice());
    assert_eq!(session.working(), &alice());
    assert_eq!(session.form_title(), "Person");
    assert_eq!(session.fields().to_vec(), vec!["name", "age"]);
    assert!(!session.is_dirty());

    assert_eq!(
        harness.table.calls(),
        vec![
            Call::Describe("person".to_string()),
            Call::Select(
                vec!["name".to_string(), "age".to_string()],
                "person.id=42".to_string()
            ),
        ]
    );
    assert!(harness.presenter.prompts().is_empty());
    assert_eq!(harness.navigator.current(), Some(Route::edit("person", 42)));
}

#[tokio::test]
async fn test_load_keeps_absent_and_null_apart() {
    let row = record(json!({"name": "Alice", "nickname": "Al"}));
    let harness = Harness::new(RecordingTable::new(vec![row]));
    let (session, _) = harness.open().await;

    // Only schema fields are copied, and unset fields stay unset
    assert_eq!(session.master(), &record(json!({"name": "Alice"})));
    assert!(!session.working().contains_key("age"));

    let row = record(json!({"name": "Alice", "age": null}));
    let harness = Harness::new(RecordingTable::new(vec![row.clone()]));
    let (session, _) = harness.open().await;
    assert_eq!(session.master(), &row);
    assert_eq!(session.working().get("age"), Some(&Value::Null));
}

#[tokio::test]
async fn test_load_without_match_closes_session() {
    let harness = Harness::new(RecordingTable::new(Vec::new()));
    let (session, outcome) = harness.open().await;

    assert_eq!(outcome, LoadOutcome::NotFound);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.master().is_empty());
    assert!(session.working().is_empty());

    assert_eq!(
        harness.prompt_kinds(),
        vec![PromptKind::Error {
            message: "Record not found".to_string(),
            close_label: "Close".to_string(),
        }]
    );
    assert_eq!(harness.navigator.history(), vec![Route::list("person")]);
}

#[tokio::test]
async fn test_load_with_several_matches_closes_session() {
    let harness = Harness::new(RecordingTable::new(vec![alice(), alice()]));
    let (session, outcome) = harness.open().await;

    assert_eq!(outcome, LoadOutcome::NotFound);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.master().is_empty());
    assert_eq!(harness.presenter.titles(), vec!["Record not found"]);
    assert_eq!(harness.navigator.current(), Some(Route::list("person")));
}

#[tokio::test]
async fn test_load_storage_failure_closes_session() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]).failing_on("select"));
    let (session, outcome) = harness.open().await;

    assert_eq!(
        outcome,
        LoadOutcome::StorageError("Backend error: select unavailable".to_string())
    );
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(harness.presenter.titles(), vec!["Backend error: select unavailable"]);
    assert_eq!(harness.navigator.current(), Some(Route::list("person")));
}

#[tokio::test]
async fn test_reset_restores_master() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (mut session, _) = harness.open().await;

    session.set_field("name", json!("Bob")).unwrap();
    session.clear_field("age").unwrap();
    session.working_mut().insert("name".to_string(), json!("Carol"));
    assert!(session.is_dirty());
    assert_eq!(session.changes(), vec!["age", "name"]);

    session.reset();
    assert_eq!(session.working(), session.master());
    assert_eq!(session.working(), &alice());
    assert!(session.changes().is_empty());
    assert!(harness.table.updates().is_empty());
}

#[tokio::test]
async fn test_set_field_rejects_unknown_fields() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (mut session, _) = harness.open().await;

    assert!(matches!(
        session.set_field("_strings", json!("x")),
        Err(SessionError::UnknownField(field)) if field == "_strings"
    ));
    assert!(matches!(session.clear_field("email"), Err(SessionError::UnknownField(_))));
}

#[tokio::test]
async fn test_blank_submission_is_ignored() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (mut session, _) = harness.open().await;

    // `name` is unset, `age` is null
    let outcome = session.submit(&record(json!({"age": null}))).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Ignored);
    assert_eq!(session.submit(&Record::new()).await.unwrap(), SubmitOutcome::Ignored);

    assert!(harness.table.updates().is_empty());
    assert!(harness.presenter.prompts().is_empty());
    assert_eq!(harness.navigator.current(), Some(Route::edit("person", 42)));
    assert_eq!(session.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_submit_updates_and_returns_to_list() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (mut session, _) = harness.open().await;

    let outcome = session.submit(&record(json!({"name": "Bob"}))).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Updated { affected: 1 });

    assert_eq!(
        harness.table.updates(),
        vec![Call::Update(record(json!({"name": "Bob"})), "person.id=42".to_string())]
    );
    assert_eq!(
        harness.prompt_kinds(),
        vec![PromptKind::Confirmation {
            message: "Record updated".to_string()
        }]
    );
    assert_eq!(harness.navigator.history(), vec![Route::list("person")]);
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_submit_working_copy() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (mut session, _) = harness.open().await;

    session.set_field("name", json!("Bob")).unwrap();
    session.submit_working().await.unwrap();

    assert_eq!(
        harness.table.updates(),
        vec![Call::Update(
            record(json!({"name": "Bob", "age": 30})),
            "person.id=42".to_string()
        )]
    );
}

#[tokio::test]
async fn test_submit_storage_failure_keeps_session_open() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]).failing_on("update"));
    let (mut session, _) = harness.open().await;
    session.set_field("name", json!("Bob")).unwrap();

    let result = session.submit_working().await;
    assert!(matches!(result, Err(SessionError::Storage(StoreError::Backend(_)))));

    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.working().get("name"), Some(&json!("Bob")));
    assert_eq!(
        harness.presenter.titles(),
        vec!["Record could not be saved: Backend error: update unavailable"]
    );
    assert_eq!(harness.navigator.current(), Some(Route::edit("person", 42)));
}

#[tokio::test]
async fn test_strict_policy_rejects_untouched_record() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]).affecting(0));
    let (mut session, _) = harness.open().await;

    let result = session.submit(&record(json!({"name": "Bob"}))).await;
    assert!(matches!(
        result,
        Err(SessionError::NothingAffected(selector)) if selector == "person.id=42"
    ));
    assert_eq!(harness.presenter.titles(), vec!["Record not found"]);
    assert_eq!(harness.navigator.current(), Some(Route::list("person")));
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_lenient_policy_accepts_untouched_record() {
    let mut harness = Harness::new(RecordingTable::new(vec![alice()]).affecting(0));
    harness.policy = RowCountPolicy::Lenient;
    let (mut session, _) = harness.open().await;

    let outcome = session.submit(&record(json!({"name": "Bob"}))).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Updated { affected: 0 });
    assert_eq!(harness.presenter.titles(), vec!["Record updated"]);
}

#[tokio::test]
async fn test_delete_declined_leaves_session_unchanged() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (mut session, _) = harness.open().await;
    session.set_field("name", json!("Bob")).unwrap();

    let outcome = session.delete_record().await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Declined);

    assert!(harness.table.deletes().is_empty());
    assert_eq!(
        harness.prompt_kinds(),
        vec![PromptKind::ConfirmAction {
            title: "Delete Record".to_string(),
            question: "Are you sure you want to delete this record?".to_string(),
        }]
    );
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.working().get("name"), Some(&json!("Bob")));
    assert_eq!(harness.navigator.current(), Some(Route::edit("person", 42)));
}

#[tokio::test]
async fn test_delete_confirmed_deletes_once() {
    let harness = Harness::with_presenter(
        RecordingTable::new(vec![alice()]),
        ScriptedPresenter::with_responses([Response::Answer(true)]),
    );
    let (mut session, _) = harness.open().await;

    let outcome = session.delete_record().await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted { affected: 1 });

    assert_eq!(harness.table.deletes(), vec![Call::Delete("person.id=42".to_string())]);
    assert_eq!(harness.presenter.titles(), vec!["Delete Record", "Record deleted"]);
    assert_eq!(harness.navigator.current(), Some(Route::list("person")));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.master().is_empty());
}

#[tokio::test]
async fn test_dismissed_delete_prompt_declines() {
    let harness = Harness::with_presenter(
        RecordingTable::new(vec![alice()]),
        ScriptedPresenter::with_responses([Response::Closed]),
    );
    let (mut session, _) = harness.open().await;

    let outcome = session.delete_record().await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Declined);
    assert!(harness.table.deletes().is_empty());
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.master(), &alice());
}

#[tokio::test]
async fn test_failed_update_confirmation_still_closes_session() {
    // The confirmation popup gets an answer it cannot handle
    let harness = Harness::with_presenter(
        RecordingTable::new(vec![alice()]),
        ScriptedPresenter::with_responses([Response::Answer(true)]),
    );
    let (mut session, _) = harness.open().await;

    let outcome = session.submit(&record(json!({"name": "Bob"}))).await.unwrap();
    assert_eq!(outcome, SubmitOutcome::Updated { affected: 1 });
    assert_eq!(harness.table.updates().len(), 1);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(harness.navigator.current(), Some(Route::list("person")));

    assert!(matches!(
        session.submit(&record(json!({"name": "Carol"}))).await,
        Err(SessionError::NotReady(SessionState::Closed))
    ));
    assert_eq!(harness.table.updates().len(), 1);
}

#[tokio::test]
async fn test_failed_delete_confirmation_still_closes_session() {
    let harness = Harness::with_presenter(
        RecordingTable::new(vec![alice()]),
        ScriptedPresenter::with_responses([Response::Answer(true), Response::Answer(true)]),
    );
    let (mut session, _) = harness.open().await;

    let outcome = session.delete_record().await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted { affected: 1 });
    assert_eq!(harness.table.deletes().len(), 1);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(harness.navigator.current(), Some(Route::list("person")));
}

#[tokio::test]
async fn test_failed_not_found_prompt_still_closes_session() {
    let harness = Harness::with_presenter(
        RecordingTable::new(Vec::new()),
        ScriptedPresenter::with_responses([Response::Answer(true)]),
    );
    let (session, outcome) = harness.open().await;

    assert_eq!(outcome, LoadOutcome::NotFound);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(harness.navigator.current(), Some(Route::list("person")));
}

/// Navigator whose every request fails
struct BrokenNavigator;

#[async_trait]
impl Navigator for BrokenNavigator {
    async fn go_to_list(&self, entity: &str) -> anyhow::Result<()> {
        Err(anyhow!("no list view for {}", entity))
    }
}

#[tokio::test]
async fn test_navigation_failure_closes_session() {
    let table = Arc::new(RecordingTable::new(vec![alice()]));
    let presenter = Arc::new(ScriptedPresenter::new(AutoAnswer::Decline));
    let dialogs = DialogService::new(presenter.clone()).with_confirmation_delay(Duration::ZERO);
    let services = SessionServices::new(table.clone(), Arc::new(dialogs), Arc::new(BrokenNavigator));

    let (mut session, _) = EditSession::open(services, RecordKey::new("person", 42))
        .await
        .unwrap();
    let result = session.submit(&record(json!({"name": "Bob"}))).await;

    assert!(matches!(result, Err(SessionError::Navigation(_))));
    assert_eq!(table.updates().len(), 1);
    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.master().is_empty());
}

#[tokio::test]
async fn test_closed_session_rejects_operations() {
    let harness = Harness::new(RecordingTable::new(Vec::new()));
    let (mut session, _) = harness.open().await;

    assert!(matches!(
        session.submit(&record(json!({"name": "Bob"}))).await,
        Err(SessionError::NotReady(SessionState::Closed))
    ));
    assert!(matches!(
        session.delete_record().await,
        Err(SessionError::NotReady(SessionState::Closed))
    ));
    assert!(matches!(session.load().await, Err(SessionError::NotReady(_))));
    assert!(harness.table.updates().is_empty());
    assert!(harness.table.deletes().is_empty());
}

#[tokio::test]
async fn test_events_follow_population() {
    let harness = Harness::new(RecordingTable::new(vec![alice()]));
    let (sender, mut receiver) = mpsc::unbounded_channel();

    let mut session = EditSession::new(harness.services(), RecordKey::new("person", 42));
    session.set_event_sender(sender);
    session.initialize().await.unwrap();
    session.submit(&record(json!({"name": "Bob"}))).await.unwrap();

    let key = RecordKey::new("person", 42);
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            SessionEvent::Reset { key: key.clone() },
            SessionEvent::Loaded {
                key: key.clone(),
                form_title: "Person".to_string(),
            },
            SessionEvent::Updated {
                key: key.clone(),
                affected: 1,
            },
            SessionEvent::Closed { key },
        ]
    );
}

#[tokio::test]
async fn test_not_found_events() {
    let harness = Harness::new(RecordingTable::new(Vec::new()));
    let (sender, mut receiver) = mpsc::unbounded_channel();

    let mut session = EditSession::new(harness.services(), RecordKey::new("person", 42));
    session.set_event_sender(sender);
    session.initialize().await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    let kinds: Vec<bool> = events.iter().map(SessionEvent::is_terminal).collect();
    assert_eq!(kinds, vec![false, false, true]);
    assert!(matches!(events[1], SessionEvent::NotFound { .. }));
}

#[tokio::test]
async fn test_edit_against_sqlite_store() {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    store.define("person", &person_schema()).await.unwrap();
    let id = store.insert("person", &alice()).await.unwrap();

    let presenter = Arc::new(ScriptedPresenter::new(AutoAnswer::Affirm));
    let navigator = Arc::new(HistoryNavigator::starting_at(Route::edit("person", id)));
    let dialogs = Arc::new(DialogService::new(presenter.clone()).with_confirmation_delay(Duration::ZERO));
    let services = SessionServices::new(store.clone(), dialogs, navigator.clone());

    let (mut session, outcome) = EditSession::open(services.clone(), RecordKey::new("person", id))
        .await
        .unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded);
    assert_eq!(session.form_title(), "Person");
    assert_eq!(session.master(), &alice());

    session.set_field("age", json!(31)).unwrap();
    assert_eq!(
        session.submit_working().await.unwrap(),
        SubmitOutcome::Updated { affected: 1 }
    );

    let rows = store
        .select(&["age".to_string()], &Query::by_id("person", id))
        .await
        .unwrap();
    assert_eq!(rows, vec![record(json!({"age": 31}))]);

    let (mut session, _) = EditSession::open(services.clone(), RecordKey::new("person", id))
        .await
        .unwrap();
    assert_eq!(
        session.delete_record().await.unwrap(),
        DeleteOutcome::Deleted { affected: 1 }
    );

    let (session, outcome) = EditSession::open(services, RecordKey::new("person", id))
        .await
        .unwrap();
    assert_eq!(outcome, LoadOutcome::NotFound);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(navigator.current(), Some(Route::list("person")));
}
