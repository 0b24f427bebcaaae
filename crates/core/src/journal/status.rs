//! Journal entry status and its transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a journal entry.
///
/// The transition table is:
/// - Draft → Posted, Void
/// - Posted → Void, Reversed
/// - Void, Reversed → (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryStatus {
    /// Entry is being prepared; header and lines may change.
    Draft,
    /// Entry has been committed to the ledger and is financially final.
    Posted,
    /// Entry was cancelled clerically, without an offsetting entry.
    Void,
    /// Entry was cancelled by a reversing entry.
    Reversed,
}

impl EntryStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Draft, Self::Posted, Self::Void, Self::Reversed];

    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Posted => "POSTED",
            Self::Void => "VOID",
            Self::Reversed => "REVERSED",
        }
    }

    /// Parses a status from a string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "POSTED" => Some(Self::Posted),
            "VOID" => Some(Self::Void),
            "REVERSED" => Some(Self::Reversed),
            _ => None,
        }
    }

    /// Returns true if the transition table has an edge from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(&self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Posted | Self::Void)
                | (Self::Posted, Self::Void | Self::Reversed)
        )
    }

    /// Returns true if no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Void | Self::Reversed)
    }

    /// Returns true if header and lines can no longer be edited.
    #[must_use]
    pub const fn is_immutable(&self) -> bool {
        !matches!(self, Self::Draft)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
