//! Core dialog types and traits
//!
//! This module defines the prompts a [`Presenter`] can show, the raw
//! responses it reports back, and the typed outcomes handed to callers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for dialog instances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId(pub u64);

impl std::fmt::Display for DialogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dialog-{}", self.0)
    }
}

/// Label of the single action on error prompts
pub const CLOSE_LABEL: &str = "Close";

/// Input type used when none is configured
pub const DEFAULT_INPUT_TYPE: &str = "text";

/// Options for single-value input prompts
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InputOptions {
    /// Input type hint: `text`, `password`, `number`, ...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Placeholder shown while the input is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Value the input starts with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_text: Option<String>,
}

impl InputOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_default_text(mut self, default_text: impl Into<String>) -> Self {
        self.default_text = Some(default_text.into());
        self
    }

    /// Configured input type, or `"text"`
    pub fn effective_input_type(&self) -> &str {
        self.input_type
            .as_deref()
            .filter(|input_type| !input_type.is_empty())
            .unwrap_or(DEFAULT_INPUT_TYPE)
    }
}

/// What a prompt asks of the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromptKind {
    /// Acknowledgment-only message that closes by itself
    Confirmation { message: String },
    /// Failure message with a single close action
    Error { message: String, close_label: String },
    /// Yes/no question
    ConfirmAction { title: String, question: String },
    /// Single-value text entry
    StringInput {
        title: String,
        question: String,
        options: InputOptions,
    },
}

impl PromptKind {
    /// Short name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            PromptKind::Confirmation { .. } => "confirmation",
            PromptKind::Error { .. } => "error",
            PromptKind::ConfirmAction { .. } => "confirm_action",
            PromptKind::StringInput { .. } => "string_input",
        }
    }

    /// Headline text of the prompt
    pub fn title(&self) -> &str {
        match self {
            PromptKind::Confirmation { message } | PromptKind::Error { message, .. } => message,
            PromptKind::ConfirmAction { title, .. } | PromptKind::StringInput { title, .. } => title,
        }
    }
}

/// A prompt instance handed to a presenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: DialogId,
    pub kind: PromptKind,
}

/// Raw response reported by a presenter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// The prompt is on screen and needs no answer
    Shown,
    /// The user dismissed the prompt
    Closed,
    /// The user answered a yes/no question
    Answer(bool),
    /// The user submitted a value, or cancelled (`None`)
    Input(Option<String>),
}

/// Outcome of a yes/no prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Confirmed,
    Cancelled,
}

impl Choice {
    pub fn is_confirmed(self) -> bool {
        self == Choice::Confirmed
    }

    /// Run exactly one of the two continuations
    pub fn resolve<T>(self, on_confirm: impl FnOnce() -> T, on_cancel: impl FnOnce() -> T) -> T {
        match self {
            Choice::Confirmed => on_confirm(),
            Choice::Cancelled => on_cancel(),
        }
    }
}

impl From<bool> for Choice {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Choice::Confirmed
        } else {
            Choice::Cancelled
        }
    }
}

/// Outcome of a single-value input prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    Submitted(String),
    Cancelled,
}

impl InputOutcome {
    pub fn value(&self) -> Option<&str> {
        match self {
            InputOutcome::Submitted(value) => Some(value),
            InputOutcome::Cancelled => None,
        }
    }

    /// Run exactly one of the two continuations
    pub fn resolve<T>(
        self,
        on_submit: impl FnOnce(String) -> T,
        on_cancel: impl FnOnce() -> T,
    ) -> T {
        match self {
            InputOutcome::Submitted(value) => on_submit(value),
            InputOutcome::Cancelled => on_cancel(),
        }
    }
}

impl From<Option<String>> for InputOutcome {
    fn from(value: Option<String>) -> Self {
        value.map_or(InputOutcome::Cancelled, InputOutcome::Submitted)
    }
}

/// Result type for dialog operations
pub type DialogResult<T> = std::result::Result<T, DialogError>;

/// Dialog-specific error types
#[derive(Debug, Error)]
pub enum DialogError {
    #[error("Dialog '{0}' is still active")]
    AlreadyActive(DialogId),

    #[error("Unexpected response {response:?} to {prompt} prompt")]
    UnexpectedResponse {
        prompt: &'static str,
        response: Response,
    },

    #[error("Dialog presenter error: {0}")]
    Presenter(#[from] anyhow::Error),
}

/// Shows prompts to the user and reports their responses
///
/// `present` resolves when the prompt needs nothing further from the user:
/// immediately for confirmations (answer [`Response::Shown`]), after the
/// user's action for every other kind.
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Show a prompt
    async fn present(&self, prompt: &Prompt) -> anyhow::Result<Response>;

    /// Take down a prompt that closes by itself
    async fn dismiss(&self, _prompt: &Prompt) -> anyhow::Result<()> {
        Ok(())
    }
}
