//! Dialog service exposing the four prompt primitives
//!
//! The service owns the modal slot: only one prompt may be outstanding at a
//! time. A request made while another prompt is active fails with
//! [`DialogError::AlreadyActive`] and never reaches the presenter.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tracing::{debug, warn};

use super::types::*;

/// How long confirmation prompts stay up before closing themselves
pub const DEFAULT_CONFIRMATION_DELAY: Duration = Duration::from_millis(800);

/// Modal prompt facade over a [`Presenter`]
pub struct DialogService {
    presenter: Arc<dyn Presenter>,
    confirmation_delay: Duration,
    next_id: AtomicU64,
    active: Mutex<Option<DialogId>>,
}

/// Holds the modal slot until dropped
struct ActiveDialog<'a> {
    slot: &'a Mutex<Option<DialogId>>,
}

impl Drop for ActiveDialog<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}

impl DialogService {
    /// Create a new dialog service
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            presenter,
            confirmation_delay: DEFAULT_CONFIRMATION_DELAY,
            next_id: AtomicU64::new(1),
            active: Mutex::new(None),
        }
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    pub fn confirmation_delay(&self) -> Duration {
        self.confirmation_delay
    }

    /// The prompt currently waiting to resolve, if any
    pub fn active_dialog(&self) -> Option<DialogId> {
        *self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_active(&self) -> bool {
        self.active_dialog().is_some()
    }

    /// Show an acknowledgment-only message, close it after the confirmation
    /// delay, then return
    pub async fn confirmation(&self, message: &str) -> DialogResult<()> {
        let (prompt, _active) = self.open(PromptKind::Confirmation {
            message: message.to_string(),
        })?;

        match self.presenter.present(&prompt).await? {
            Response::Shown | Response::Closed => {}
            response => return Err(unexpected(&prompt, response)),
        }

        tokio::time::sleep(self.confirmation_delay).await;
        self.presenter.dismiss(&prompt).await?;

        debug!("{} closed after {:?}", prompt.id, self.confirmation_delay);
        Ok(())
    }

    /// Show a failure message and wait until the user closes it
    pub async fn error(&self, message: &str) -> DialogResult<()> {
        let (prompt, _active) = self.open(PromptKind::Error {
            message: message.to_string(),
            close_label: CLOSE_LABEL.to_string(),
        })?;

        match self.presenter.present(&prompt).await? {
            Response::Closed => Ok(()),
            response => Err(unexpected(&prompt, response)),
        }
    }

    /// Ask a yes/no question; dismissing the prompt counts as a no
    pub async fn confirm_action(&self, title: &str, question: &str) -> DialogResult<Choice> {
        let (prompt, _active) = self.open(PromptKind::ConfirmAction {
            title: title.to_string(),
            question: question.to_string(),
        })?;

        match self.presenter.present(&prompt).await? {
            Response::Answer(confirmed) => {
                debug!("{} answered: {}", prompt.id, confirmed);
                Ok(Choice::from(confirmed))
            }
            Response::Closed => {
                debug!("{} dismissed", prompt.id);
                Ok(Choice::Cancelled)
            }
            response => Err(unexpected(&prompt, response)),
        }
    }

    /// Prompt for a single string value
    ///
    /// `None` options behave exactly like `InputOptions::default()`.
    pub async fn string_input(
        &self,
        title: &str,
        question: &str,
        options: Option<InputOptions>,
    ) -> DialogResult<InputOutcome> {
        let (prompt, _active) = self.open(PromptKind::StringInput {
            title: title.to_string(),
            question: question.to_string(),
            options: options.unwrap_or_default(),
        })?;

        match self.presenter.present(&prompt).await? {
            Response::Input(value) => Ok(InputOutcome::from(value)),
            Response::Closed => Ok(InputOutcome::Cancelled),
            response => Err(unexpected(&prompt, response)),
        }
    }

    /// Claim the modal slot and build the prompt
    fn open(&self, kind: PromptKind) -> DialogResult<(Prompt, ActiveDialog<'_>)> {
        let mut slot = self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(active) = *slot {
            warn!("Rejected {} prompt '{}': {} is still active", kind.name(), kind.title(), active);
            return Err(DialogError::AlreadyActive(active));
        }

        let id = DialogId(self.next_id.fetch_add(1, Ordering::SeqCst));
        *slot = Some(id);
        drop(slot);

        debug!("Opening {} {} '{}'", kind.name(), id, kind.title());
        Ok((Prompt { id, kind }, ActiveDialog { slot: &self.active }))
    }
}

fn unexpected(prompt: &Prompt, response: Response) -> DialogError {
    DialogError::UnexpectedResponse {
        prompt: prompt.kind.name(),
        response,
    }
}
