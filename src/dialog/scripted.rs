//! Presenter that answers from a script
//!
//! Used for unattended runs (`--yes`) and in tests. Every presented prompt is
//! recorded so callers can inspect what the user would have seen.

use async_trait::async_trait;
use std::{collections::VecDeque, sync::Mutex};
use tracing::info;

use super::types::*;

/// Answer given once the script runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAnswer {
    /// Confirm questions and submit default input values
    Affirm,
    /// Decline questions and cancel input prompts
    Decline,
}

/// Scripted presenter with a fallback policy
pub struct ScriptedPresenter {
    script: Mutex<VecDeque<Response>>,
    fallback: AutoAnswer,
    presented: Mutex<Vec<Prompt>>,
    dismissed: Mutex<Vec<DialogId>>,
}

impl ScriptedPresenter {
    /// Presenter that always answers with the given policy
    pub fn new(fallback: AutoAnswer) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            presented: Mutex::new(Vec::new()),
            dismissed: Mutex::new(Vec::new()),
        }
    }

    /// Presenter that replays responses in order, declining once they run out
    pub fn with_responses(responses: impl IntoIterator<Item = Response>) -> Self {
        let presenter = Self::new(AutoAnswer::Decline);
        presenter.push_all(responses);
        presenter
    }

    /// Queue more responses
    pub fn push_all(&self, responses: impl IntoIterator<Item = Response>) {
        lock(&self.script).extend(responses);
    }

    /// Every prompt presented so far, oldest first
    pub fn prompts(&self) -> Vec<Prompt> {
        lock(&self.presented).clone()
    }

    /// Headlines of the presented prompts
    pub fn titles(&self) -> Vec<String> {
        lock(&self.presented)
            .iter()
            .map(|prompt| prompt.kind.title().to_string())
            .collect()
    }

    /// Prompts taken down by the service
    pub fn dismissed(&self) -> Vec<DialogId> {
        lock(&self.dismissed).clone()
    }

    fn fallback_response(&self, kind: &PromptKind) -> Response {
        let affirm = self.fallback == AutoAnswer::Affirm;
        match kind {
            PromptKind::Confirmation { .. } => Response::Shown,
            PromptKind::Error { .. } => Response::Closed,
            PromptKind::ConfirmAction { .. } => Response::Answer(affirm),
            PromptKind::StringInput { options, .. } => Response::Input(
                affirm.then(|| options.default_text.clone().unwrap_or_default()),
            ),
        }
    }
}

#[async_trait]
impl Presenter for ScriptedPresenter {
    async fn present(&self, prompt: &Prompt) -> anyhow::Result<Response> {
        lock(&self.presented).push(prompt.clone());

        let scripted = lock(&self.script).pop_front();
        let response = scripted.unwrap_or_else(|| self.fallback_response(&prompt.kind));

        info!("[{}] {} -> {:?}", prompt.kind.name(), prompt.kind.title(), response);
        Ok(response)
    }

    async fn dismiss(&self, prompt: &Prompt) -> anyhow::Result<()> {
        lock(&self.dismissed).push(prompt.id);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
