//! Edit session states, outcomes and events

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::store::Query;

/// Identifies the record an edit session works on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub entity: String,
    pub record_id: i64,
}

impl RecordKey {
    pub fn new(entity: impl Into<String>, record_id: i64) -> Self {
        Self {
            entity: entity.into(),
            record_id,
        }
    }

    /// Selector matching exactly this record
    pub fn selector(&self) -> Query {
        Query::by_id(&self.entity, self.record_id)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.record_id)
    }
}

/// Lifecycle of an edit session
///
/// `Loading -> Ready -> {Committing, Deleting} -> Closed`, with
/// `Loading -> NotFound -> Closed` when the record cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Ready,
    Committing,
    Deleting,
    NotFound,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Committing => "committing",
            SessionState::Deleting => "deleting",
            SessionState::NotFound => "not_found",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// How affected-row counts of writes are checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowCountPolicy {
    /// A write that touched no row is a failure
    #[default]
    Strict,
    /// Any completed write counts as success
    Lenient,
}

impl std::str::FromStr for RowCountPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(RowCountPolicy::Strict),
            "lenient" => Ok(RowCountPolicy::Lenient),
            other => Err(format!("unknown row count policy '{}'", other)),
        }
    }
}

/// Result of loading the session's record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Exactly one row matched; both copies are populated
    Loaded,
    /// Zero or several rows matched; the session is closed
    NotFound,
    /// The store failed; the session is closed
    StorageError(String),
}

/// Result of submitting form values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Every value was unset or null; nothing was written
    Ignored,
    /// The record was updated and the session closed
    Updated { affected: u64 },
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The user declined; the session is unchanged
    Declined,
    /// The record was deleted and the session closed
    Deleted { affected: u64 },
}

/// Notifications for whatever displays the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Both copies are populated and the form title is known
    Loaded { key: RecordKey, form_title: String },

    /// The record could not be loaded
    NotFound { key: RecordKey },

    /// Loading failed in the store
    LoadFailed { key: RecordKey, error: String },

    /// The working copy was reset to the master copy
    Reset { key: RecordKey },

    /// The record was written
    Updated { key: RecordKey, affected: u64 },

    /// The record was deleted
    Deleted { key: RecordKey, affected: u64 },

    /// The session ended and its copies were discarded
    Closed { key: RecordKey },
}

impl SessionEvent {
    pub fn key(&self) -> &RecordKey {
        match self {
            SessionEvent::Loaded { key, .. }
            | SessionEvent::NotFound { key }
            | SessionEvent::LoadFailed { key, .. }
            | SessionEvent::Reset { key }
            | SessionEvent::Updated { key, .. }
            | SessionEvent::Deleted { key, .. }
            | SessionEvent::Closed { key } => key,
        }
    }

    /// Whether the event ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Closed { .. })
    }
}
