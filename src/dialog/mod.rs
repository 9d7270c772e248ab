//! Modal dialog prompts
//!
//! [`DialogService`] turns informational, error, yes/no and single-value
//! input prompts into awaitable outcomes. Presentation itself is delegated to
//! a [`Presenter`]: the terminal one for interactive use, the scripted one for
//! unattended runs and tests.

mod scripted;
mod service;
mod terminal;
mod types;

pub use scripted::{AutoAnswer, ScriptedPresenter};
pub use service::{DialogService, DEFAULT_CONFIRMATION_DELAY};
pub use terminal::TerminalPresenter;
pub use types::*;
