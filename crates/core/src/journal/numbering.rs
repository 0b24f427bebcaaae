//! Entry number format `JE-YYYYMMDD-NNNN`.
//!
//! The sequence is scoped to one organization and one calendar day. Issuing
//! the sequence is a persistence concern; this module only owns the format.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::JournalError;

/// Prefix of every entry number.
pub const ENTRY_NUMBER_PREFIX: &str = "JE";

/// Highest sequence a single day can issue.
pub const MAX_SEQUENCE: u32 = 9999;

/// A user-visible journal entry number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryNumber {
    date: NaiveDate,
    sequence: u32,
}

impl EntryNumber {
    /// Builds the number for the `sequence`-th entry of `date`.
    ///
    /// # Errors
    ///
    /// Returns `SequenceExhausted` if the sequence is beyond `MAX_SEQUENCE`,
    /// or `InvalidEntryNumber` if it is zero.
    pub fn new(date: NaiveDate, sequence: u32) -> Result<Self, JournalError> {
        if sequence == 0 {
            return Err(JournalError::InvalidEntryNumber(format!(
                "sequence must start at 1 for {date}"
            )));
        }
        if sequence > MAX_SEQUENCE {
            return Err(JournalError::SequenceExhausted { date });
        }
        Ok(Self { date, sequence })
    }

    /// Parses `JE-YYYYMMDD-NNNN`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEntryNumber` for anything else.
    pub fn parse(s: &str) -> Result<Self, JournalError> {
        let invalid = || JournalError::InvalidEntryNumber(s.to_string());

        let mut parts = s.split('-');
        let (Some(prefix), Some(date), Some(sequence), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if prefix != ENTRY_NUMBER_PREFIX
            || date.len() != 8
            || sequence.len() != 4
            || !date.bytes().all(|b| b.is_ascii_digit())
            || !sequence.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let date = NaiveDate::parse_from_str(date, "%Y%m%d").map_err(|_| invalid())?;
        let sequence: u32 = sequence.parse().map_err(|_| invalid())?;
        Self::new(date, sequence).map_err(|_| invalid())
    }

    /// The calendar day the number was issued for.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// The position within the day.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }
}

impl fmt::Display for EntryNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ENTRY_NUMBER_PREFIX}-{}-{:04}",
            self.date.format("%Y%m%d"),
            self.sequence
        )
    }
}

impl FromStr for EntryNumber {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntryNumber {
    type Error = JournalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EntryNumber> for String {
    fn from(number: EntryNumber) -> Self {
        number.to_string()
    }
}
