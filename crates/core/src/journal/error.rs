//! Journal error types for validation, state and persistence failures.
//!
//! Every rejected operation carries a stable error code, a human message and,
//! where one applies, the index of the offending line.

use chrono::NaiveDate;
use ledgerbook_shared::AppError;
use ledgerbook_shared::types::JournalEntryId;
use rust_decimal::Decimal;
use thiserror::Error;

use super::line::LineError;
use super::posting::PostingIssue;
use super::status::EntryStatus;

/// Broad classes of journal errors, deciding how a caller should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing field or bad line shape; fix the request.
    StructuralValidation,
    /// Operation not allowed from the current status.
    StateTransitionViolation,
    /// Referenced accounts are missing or inactive.
    ReferentialViolation,
    /// The store failed or the entry changed underneath the caller.
    PersistenceFailure,
    /// Entry-number assignment kept colliding.
    NumberingConflict,
}

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    // ========== Structural Validation ==========
    /// Entry has not been numbered yet.
    #[error("Entry number is required")]
    EntryNumberRequired,

    /// Entry is not tied to an organization.
    #[error("Organization is required")]
    OrganizationRequired,

    /// Entry description is blank.
    #[error("Entry description is required")]
    DescriptionRequired,

    /// Entry description exceeds the maximum length.
    #[error("Entry description is {length} characters, maximum is {max}")]
    DescriptionTooLong {
        /// Actual length in characters.
        length: usize,
        /// Allowed length in characters.
        max: usize,
    },

    /// Entry has no lines at all.
    #[error("Entry has no lines")]
    NoLines,

    /// Entry has fewer than two lines.
    #[error("Entry must have at least 2 lines, found {count}")]
    InsufficientLines {
        /// Number of lines present.
        count: usize,
    },

    /// A line failed its own validation.
    #[error("Line {index}: {source}")]
    InvalidLine {
        /// 0-based index of the line.
        index: usize,
        /// Underlying line error.
        source: LineError,
    },

    /// Debits and credits differ.
    #[error("Entry is not balanced. Debit: {debit}, Credit: {credit}")]
    NotBalanced {
        /// Total debit.
        debit: Decimal,
        /// Total credit.
        credit: Decimal,
    },

    /// Line number does not exist in the entry.
    #[error("Line number {line_number} is out of range 1..={count}")]
    LineNumberOutOfRange {
        /// Requested line number.
        line_number: u32,
        /// Number of lines present.
        count: usize,
    },

    /// Line numbers do not run `1..=N` in order.
    #[error("Line {index}: expected line number {expected}, found {found}")]
    LineNumberMismatch {
        /// 0-based index of the line.
        index: usize,
        /// Line number the position requires.
        expected: u32,
        /// Line number carried by the line.
        found: u32,
    },

    /// String is not of the form `JE-YYYYMMDD-NNNN`.
    #[error("Invalid entry number: {0}")]
    InvalidEntryNumber(String),

    /// The day's sequence ran past 9999.
    #[error("Entry number sequence exhausted for {date}")]
    SequenceExhausted {
        /// Day whose sequence ran out.
        date: NaiveDate,
    },

    // ========== State Transitions ==========
    /// Header or lines changed outside DRAFT.
    #[error("Cannot edit an entry in {status} status")]
    CannotEdit {
        /// Current status.
        status: EntryStatus,
    },

    /// Post attempted outside DRAFT.
    #[error("Cannot post an entry in {status} status")]
    CannotPost {
        /// Current status.
        status: EntryStatus,
    },

    /// Void attempted outside POSTED.
    #[error("Cannot void an entry in {status} status")]
    CannotVoid {
        /// Current status.
        status: EntryStatus,
    },

    /// Reversal attempted outside POSTED.
    #[error("Cannot reverse an entry in {status} status")]
    CannotReverse {
        /// Current status.
        status: EntryStatus,
    },

    /// A reversal draft is linked from the entry it reverses.
    #[error("Cannot delete reversal draft {0}: it is linked from the reversed entry")]
    CannotDeleteReversal(JournalEntryId),

    // ========== Referential ==========
    /// Posting validation found blocking issues.
    #[error("Posting rejected: {}", summarize(.issues))]
    PostingRejected {
        /// Blocking issues, one per problem found.
        issues: Vec<PostingIssue>,
    },

    // ========== Persistence ==========
    /// Entry not found in the organization.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    /// Stored entry changed since it was read.
    #[error("Journal entry {entry_id} was modified concurrently: expected version {expected}, found {actual}")]
    ConcurrentModification {
        /// The entry.
        entry_id: JournalEntryId,
        /// Version the caller read.
        expected: i32,
        /// Version currently stored.
        actual: i32,
    },

    /// Entry number kept colliding after bounded retries.
    #[error("Could not assign a unique entry number after {attempts} attempts")]
    NumberingConflict {
        /// Attempts made.
        attempts: u32,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Database failure that may clear on retry: lost connection,
    /// serialization failure or deadlock.
    #[error("Transient database error: {0}")]
    TransientDatabase(String),
}

fn summarize(issues: &[PostingIssue]) -> String {
    issues
        .iter()
        .map(|issue| issue.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl JournalError {
    /// Returns the class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EntryNumberRequired
            | Self::OrganizationRequired
            | Self::DescriptionRequired
            | Self::DescriptionTooLong { .. }
            | Self::NoLines
            | Self::InsufficientLines { .. }
            | Self::InvalidLine { .. }
            | Self::NotBalanced { .. }
            | Self::LineNumberOutOfRange { .. }
            | Self::LineNumberMismatch { .. }
            | Self::InvalidEntryNumber(_) => ErrorKind::StructuralValidation,
            Self::CannotEdit { .. }
            | Self::CannotPost { .. }
            | Self::CannotVoid { .. }
            | Self::CannotReverse { .. }
            | Self::CannotDeleteReversal(_) => ErrorKind::StateTransitionViolation,
            Self::PostingRejected { .. } => ErrorKind::ReferentialViolation,
            Self::EntryNotFound(_)
            | Self::ConcurrentModification { .. }
            | Self::Database(_)
            | Self::TransientDatabase(_) => ErrorKind::PersistenceFailure,
            Self::SequenceExhausted { .. } | Self::NumberingConflict { .. } => {
                ErrorKind::NumberingConflict
            }
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::EntryNumberRequired => "JOURNAL_ENTRY_NUMBER_REQUIRED",
            Self::OrganizationRequired => "JOURNAL_ORGANIZATION_REQUIRED",
            Self::DescriptionRequired => "JOURNAL_DESCRIPTION_REQUIRED",
            Self::DescriptionTooLong { .. } => "JOURNAL_DESCRIPTION_TOO_LONG",
            Self::NoLines => "JOURNAL_NO_LINES",
            Self::InsufficientLines { .. } => "JOURNAL_INSUFFICIENT_LINES",
            Self::InvalidLine { .. } => "JOURNAL_INVALID_LINE",
            Self::NotBalanced { .. } => "JOURNAL_NOT_BALANCED",
            Self::LineNumberOutOfRange { .. } => "JOURNAL_LINE_OUT_OF_RANGE",
            Self::LineNumberMismatch { .. } => "JOURNAL_LINE_NUMBER_MISMATCH",
            Self::InvalidEntryNumber(_) => "JOURNAL_INVALID_ENTRY_NUMBER",
            Self::SequenceExhausted { .. } => "JOURNAL_SEQUENCE_EXHAUSTED",
            Self::CannotEdit { .. } => "JOURNAL_CANNOT_EDIT",
            Self::CannotPost { .. } => "JOURNAL_CANNOT_POST",
            Self::CannotVoid { .. } => "JOURNAL_CANNOT_VOID",
            Self::CannotReverse { .. } => "JOURNAL_CANNOT_REVERSE",
            Self::CannotDeleteReversal(_) => "JOURNAL_CANNOT_DELETE_REVERSAL",
            Self::PostingRejected { .. } => "JOURNAL_POSTING_REJECTED",
            Self::EntryNotFound(_) => "JOURNAL_NOT_FOUND",
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::NumberingConflict { .. } => "JOURNAL_NUMBERING_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::TransientDatabase(_) => "DATABASE_TRANSIENT",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::EntryNotFound(_) => 404,
            Self::PostingRejected { .. } => 422,
            Self::ConcurrentModification { .. }
            | Self::NumberingConflict { .. }
            | Self::SequenceExhausted { .. }
            | Self::CannotDeleteReversal(_) => 409,
            Self::Database(_) => 500,
            Self::TransientDatabase(_) => 503,
            _ => 400,
        }
    }

    /// Returns true if the caller may retry the whole operation unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentModification { .. }
                | Self::NumberingConflict { .. }
                | Self::TransientDatabase(_)
        )
    }

    /// Returns the 0-based index of the offending line, if the error has one.
    #[must_use]
    pub fn line_index(&self) -> Option<usize> {
        match self {
            Self::InvalidLine { index, .. } | Self::LineNumberMismatch { index, .. } => {
                Some(*index)
            }
            Self::PostingRejected { issues } => issues.iter().find_map(|i| i.line_index),
            _ => None,
        }
    }
}

impl From<JournalError> for AppError {
    fn from(err: JournalError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::StructuralValidation => Self::Validation(message),
            ErrorKind::StateTransitionViolation | ErrorKind::ReferentialViolation => {
                Self::BusinessRule(message)
            }
            ErrorKind::NumberingConflict => Self::Conflict(message),
            ErrorKind::PersistenceFailure => match err {
                JournalError::EntryNotFound(_) => Self::NotFound(message),
                JournalError::ConcurrentModification { .. } => Self::Conflict(message),
                _ => Self::Database(message),
            },
        }
    }
}
