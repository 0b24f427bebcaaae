//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod account;
pub mod journal;
mod db_error;
mod mapping;

pub use account::{AccountRepository, CreateAccountInput};
pub use journal::{JournalFilter, JournalRepository, PostedEntry, ReversalResult};
