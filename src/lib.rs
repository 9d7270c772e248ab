//! Schema-driven record editing
//!
//! Loads a single record of a schema-described entity into an edit session,
//! commits or deletes it through a [`store::SchemaTable`], and reports every
//! outcome through modal prompts of the [`dialog::DialogService`].

pub mod cli;
pub mod config;
pub mod dialog;
pub mod edit;
pub mod navigation;
pub mod schema;
pub mod store;
