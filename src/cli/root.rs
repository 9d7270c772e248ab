use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::record::{DefineCommand, DeleteCommand, EditCommand, InsertCommand, ShowCommand};
use crate::{
    config::Config,
    dialog::{AutoAnswer, DialogService, Presenter, ScriptedPresenter, TerminalPresenter},
    edit::{EditSession, LoadOutcome, RecordKey, SessionEvent, SessionServices},
    navigation::{HistoryNavigator, Route},
    store::SqliteStore,
};

/// recordedit - edit schema-described records from the terminal
#[derive(Parser)]
#[command(
    name = "recordedit",
    version,
    about = "Edit schema-described records from the terminal",
    long_about = r#"recordedit keeps records of schema-defined entities in a local SQLite
database and edits them one at a time, asking before anything is deleted.

Examples:
  recordedit define person person.json     # Register an entity schema
  recordedit insert person name=Alice age=30
  recordedit edit person 1 name=Bob        # Update one record
  recordedit --yes delete person 1         # Delete without asking"#
)]
pub struct Cli {
    /// Current working directory
    #[arg(short = 'c', long = "cwd", global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    /// Answer every prompt affirmatively
    #[arg(short = 'y', long = "yes", global = true)]
    pub yes: bool,

    /// Database file, overriding the configured one
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register an entity schema and create its table
    Define(DefineCommand),
    /// Insert a new record
    Insert(InsertCommand),
    /// Show one record
    Show(ShowCommand),
    /// Update one record
    Edit(EditCommand),
    /// Delete one record after confirmation
    Delete(DeleteCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }

        if let Some(cwd) = &self.cwd {
            std::env::set_current_dir(cwd)
                .map_err(|e| anyhow::anyhow!("Failed to change directory to {}: {}", cwd.display(), e))?;
            info!("Changed working directory to: {}", cwd.display());
        }

        let config = Config::init().await?;
        config.validate()?;
        debug!("Configuration initialized");

        let context = Context::open(config, self.db.as_deref(), self.yes).await?;

        match self.command {
            Commands::Define(cmd) => cmd.execute(&context).await,
            Commands::Insert(cmd) => cmd.execute(&context).await,
            Commands::Show(cmd) => cmd.execute(&context).await,
            Commands::Edit(cmd) => cmd.execute(&context).await,
            Commands::Delete(cmd) => cmd.execute(&context).await,
        }
    }
}

/// Everything a command needs: configuration, store and dialogs
pub struct Context {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub dialogs: Arc<DialogService>,
}

impl Context {
    pub async fn open(config: Config, db: Option<&std::path::Path>, assume_yes: bool) -> Result<Self> {
        let db_path = db.map(PathBuf::from).unwrap_or_else(|| config.database_path());
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Using database {}", db_path.display());
        let store = Arc::new(SqliteStore::open(&db_path).await?);

        let presenter: Arc<dyn Presenter> = if assume_yes {
            Arc::new(ScriptedPresenter::new(AutoAnswer::Affirm))
        } else {
            Arc::new(TerminalPresenter::stdio())
        };
        let dialogs = DialogService::new(presenter).with_confirmation_delay(config.confirmation_delay());

        Ok(Self {
            config,
            store,
            dialogs: Arc::new(dialogs),
        })
    }

    /// Open an edit session on one record, logging its events
    pub async fn open_session(&self, entity: &str, id: i64) -> Result<(EditSession, LoadOutcome)> {
        let key = RecordKey::new(entity, id);
        let navigator = Arc::new(HistoryNavigator::starting_at(Route::edit(entity, id)));
        let services = SessionServices::new(self.store.clone(), self.dialogs.clone(), navigator)
            .with_row_count_policy(self.config.row_count_policy);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                debug!("Session event: {:?}", event);
            }
        });

        let mut session = EditSession::new(services, key);
        session.set_event_sender(event_tx);
        let outcome = session.initialize().await?;
        Ok((session, outcome))
    }
}
