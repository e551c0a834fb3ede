//! Database module: entity models and SQL repositories.
//!
//! - `model`: typed rows returned by repository queries.
//! - `repo`: SQL-only functions that map rows into those types.
//!
//! External modules should import from `daybook::db` — the repository API
//! and row types are re-exported here.

pub mod model;
pub mod repo;

pub use model::{EntryRow, SummaryRow};
pub use repo::*;
