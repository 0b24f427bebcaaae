//! Entity re-exports.

pub use super::accounts::Entity as Accounts;
pub use super::journal_entries::Entity as JournalEntries;
pub use super::journal_entry_sequences::Entity as JournalEntrySequences;
pub use super::journal_lines::Entity as JournalLines;
