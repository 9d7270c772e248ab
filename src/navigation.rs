//! View navigation
//!
//! Edit sessions only ever ask to go back to the record list of their entity.
//! [`HistoryNavigator`] keeps a route history where that request replaces
//! the current entry instead of pushing a new one.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::debug;

/// A view the application can show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Route {
    /// Record list of an entity
    List { entity: String },
    /// Edit form of a single record
    Edit { entity: String, record_id: i64 },
}

impl Route {
    pub fn list(entity: impl Into<String>) -> Self {
        Route::List {
            entity: entity.into(),
        }
    }

    pub fn edit(entity: impl Into<String>, record_id: i64) -> Self {
        Route::Edit {
            entity: entity.into(),
            record_id,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::List { entity } => write!(f, "data.list/{}", entity),
            Route::Edit { entity, record_id } => write!(f, "data.update/{}/{}", entity, record_id),
        }
    }
}

/// Receives navigation requests from edit sessions
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Leave the current view for the record list of `entity`, replacing
    /// the current history entry
    async fn go_to_list(&self, entity: &str) -> Result<()>;
}

/// Navigator that records a route history
#[derive(Debug, Default)]
pub struct HistoryNavigator {
    history: Mutex<Vec<Route>>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator whose history starts at `route`
    pub fn starting_at(route: Route) -> Self {
        Self {
            history: Mutex::new(vec![route]),
        }
    }

    /// Add a route on top of the history
    pub fn push(&self, route: Route) {
        debug!("Navigating to {}", route);
        self.lock().push(route);
    }

    /// Swap the current route for another one
    pub fn replace(&self, route: Route) {
        debug!("Replacing current view with {}", route);
        let mut history = self.lock();
        history.pop();
        history.push(route);
    }

    pub fn current(&self) -> Option<Route> {
        self.lock().last().cloned()
    }

    pub fn history(&self) -> Vec<Route> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Route>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Navigator for HistoryNavigator {
    async fn go_to_list(&self, entity: &str) -> Result<()> {
        self.replace(Route::list(entity));
        Ok(())
    }
}
