//! General ledger journal entries.
//!
//! This module implements the journal engine:
//! - Journal lines and entry aggregates
//! - Entry status transitions (post, void, reverse)
//! - Entry numbering format
//! - Posting validation against the chart of accounts
//! - Error types for journal operations

pub mod account;
pub mod clock;
pub mod entry;
pub mod error;
pub mod line;
pub mod numbering;
pub mod posting;
pub mod status;

#[cfg(test)]
mod entry_props;
#[cfg(test)]
mod posting_props;

pub use account::{Account, AccountError, AccountType};
pub use clock::{Clock, FixedClock, SystemClock};
pub use entry::{EntryTotals, JournalEntry};
pub use error::{ErrorKind, JournalError};
pub use line::{AmountKind, JournalLine, LineError};
pub use numbering::EntryNumber;
pub use posting::{IssueCode, PostingIssue, PostingPolicy, PostingValidation, PostingValidator};
pub use status::EntryStatus;
