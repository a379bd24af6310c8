//! In-process provider used for local development and tests.

mod auth;
mod tables;
mod tokens;

pub use auth::MemoryAuth;
pub use tables::MemoryTables;
