//! Record editing sessions
//!
//! An [`EditSession`] loads one record by key, keeps a master and a working
//! copy of its values, and resolves submit and delete requests against the
//! backing table.

mod error;
mod session;
mod state;

#[cfg(test)]
mod tests;

pub use error::*;
pub use session::*;
pub use state::*;
