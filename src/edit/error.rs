//! Error types for edit sessions

use thiserror::Error;

use super::SessionState;
use crate::{dialog::DialogError, store::StoreError};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session is not ready (state: {0})")]
    NotReady(SessionState),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Dialog failure: {0}")]
    Dialog(#[from] DialogError),

    #[error("Navigation failure: {0}")]
    Navigation(#[source] anyhow::Error),

    #[error("No record matched {0}")]
    NothingAffected(String),
}

pub type SessionResult<T> = Result<T, SessionError>;
