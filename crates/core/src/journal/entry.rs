//! Journal entry aggregate: header, owned lines and lifecycle.
//!
//! The entry is the unit of posting. It guards its own line list so line
//! numbers stay contiguous and totals are always derived from the lines.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerbook_shared::types::{JournalEntryId, JournalLineId, OrganizationId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::JournalError;
use super::line::{JournalLine, truncate_chars};
use super::numbering::EntryNumber;
use super::status::EntryStatus;

/// Maximum length of an entry description, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 500;

/// Minimum number of lines a valid entry carries.
pub const MIN_LINES: usize = 2;

/// Debit and credit sums of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryTotals {
    /// Sum of all debits.
    pub debit: Decimal,
    /// Sum of all credits.
    pub credit: Decimal,
    /// Whether debits equal credits exactly.
    pub is_balanced: bool,
}

impl EntryTotals {
    /// Sums the lines.
    #[must_use]
    pub fn from_lines(lines: &[JournalLine]) -> Self {
        let (debit, credit) = lines
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(d, c), line| {
                (d + line.debit, c + line.credit)
            });
        Self {
            debit,
            credit,
            is_balanced: debit == credit,
        }
    }

    /// Returns debit minus credit.
    #[must_use]
    pub fn difference(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// A journal entry with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier.
    pub id: JournalEntryId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// User-visible number, absent until the entry is first stored.
    pub entry_number: Option<EntryNumber>,
    /// Date the transaction took place.
    pub transaction_date: NaiveDate,
    /// When the entry was posted.
    pub posting_date: Option<DateTime<Utc>>,
    /// External reference.
    pub reference: Option<String>,
    /// What the entry records.
    pub description: String,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// Author of the draft.
    pub created_by: UserId,
    /// When the draft was created.
    pub created_at: DateTime<Utc>,
    /// Who posted the entry.
    pub posted_by: Option<UserId>,
    /// Who voided the entry.
    pub voided_by: Option<UserId>,
    /// When the entry was voided.
    pub voided_at: Option<DateTime<Utc>>,
    /// Who reversed the entry.
    pub reversed_by: Option<UserId>,
    /// When the entry was reversed.
    pub reversed_at: Option<DateTime<Utc>>,
    /// The entry this one reverses.
    pub reversal_of: Option<JournalEntryId>,
    /// The entry that reversed this one.
    pub reversed_by_entry: Option<JournalEntryId>,
    /// Optimistic concurrency token, bumped on every stored change.
    pub version: i32,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// Starts an empty, unnumbered draft.
    #[must_use]
    pub fn draft(
        organization_id: OrganizationId,
        transaction_date: NaiveDate,
        description: impl Into<String>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: JournalEntryId::new(),
            organization_id,
            entry_number: None,
            transaction_date,
            posting_date: None,
            reference: None,
            description: description.into(),
            status: EntryStatus::Draft,
            created_by,
            created_at: now,
            posted_by: None,
            voided_by: None,
            voided_at: None,
            reversed_by: None,
            reversed_at: None,
            reversal_of: None,
            reversed_by_entry: None,
            version: 1,
            updated_at: now,
            lines: Vec::new(),
        }
    }

    /// Attaches lines loaded from storage, ordered by line number.
    ///
    /// Line numbers are kept as stored; `validate` rejects any that do not
    /// run `1..=N`.
    #[must_use]
    pub fn with_stored_lines(mut self, mut lines: Vec<JournalLine>) -> Self {
        lines.sort_by_key(|line| line.line_number);
        self.lines = lines;
        self
    }

    /// The lines, in line-number order.
    #[must_use]
    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    /// Sets the entry number of a draft.
    ///
    /// # Errors
    ///
    /// Returns `CannotEdit` outside DRAFT.
    pub fn assign_entry_number(&mut self, number: EntryNumber) -> Result<(), JournalError> {
        self.ensure_editable()?;
        self.entry_number = Some(number);
        Ok(())
    }

    /// Replaces the header fields of a draft.
    ///
    /// # Errors
    ///
    /// Returns `CannotEdit` outside DRAFT.
    pub fn set_header(
        &mut self,
        description: impl Into<String>,
        reference: Option<String>,
        transaction_date: NaiveDate,
    ) -> Result<(), JournalError> {
        self.ensure_editable()?;
        self.description = description.into();
        self.reference = reference;
        self.transaction_date = transaction_date;
        Ok(())
    }

    /// Checks header, lines and balance, stopping at the first problem.
    ///
    /// # Errors
    ///
    /// Returns the first structural `JournalError` found.
    pub fn validate(&self) -> Result<(), JournalError> {
        if self.entry_number.is_none() {
            return Err(JournalError::EntryNumberRequired);
        }
        if self.organization_id.is_nil() {
            return Err(JournalError::OrganizationRequired);
        }
        if self.description.trim().is_empty() {
            return Err(JournalError::DescriptionRequired);
        }
        let length = self.description.chars().count();
        if length > DESCRIPTION_MAX_LEN {
            return Err(JournalError::DescriptionTooLong {
                length,
                max: DESCRIPTION_MAX_LEN,
            });
        }
        if self.lines.is_empty() {
            return Err(JournalError::NoLines);
        }
        if self.lines.len() < MIN_LINES {
            return Err(JournalError::InsufficientLines {
                count: self.lines.len(),
            });
        }
        for (index, line) in self.lines.iter().enumerate() {
            line.validate()
                .map_err(|source| JournalError::InvalidLine { index, source })?;
        }
        for (index, line) in self.lines.iter().enumerate() {
            let expected = line_number_at(index);
            if line.line_number != expected {
                return Err(JournalError::LineNumberMismatch {
                    index,
                    expected,
                    found: line.line_number,
                });
            }
        }
        let totals = self.totals();
        if !totals.is_balanced {
            return Err(JournalError::NotBalanced {
                debit: totals.debit,
                credit: totals.credit,
            });
        }
        Ok(())
    }

    /// Recomputes debit and credit sums from the lines.
    #[must_use]
    pub fn totals(&self) -> EntryTotals {
        EntryTotals::from_lines(&self.lines)
    }

    /// Sum of all debits.
    #[must_use]
    pub fn total_debit(&self) -> Decimal {
        self.totals().debit
    }

    /// Sum of all credits.
    #[must_use]
    pub fn total_credit(&self) -> Decimal {
        self.totals().credit
    }

    /// Returns true if debits equal credits exactly.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.totals().is_balanced
    }

    /// Appends a validated line and numbers it.
    ///
    /// # Errors
    ///
    /// Returns `CannotEdit` outside DRAFT or `InvalidLine` if the line is
    /// malformed.
    pub fn add_line(&mut self, mut line: JournalLine) -> Result<(), JournalError> {
        self.ensure_editable()?;
        let index = self.lines.len();
        line.validate()
            .map_err(|source| JournalError::InvalidLine { index, source })?;
        line.line_number = line_number_at(index);
        self.lines.push(line);
        Ok(())
    }

    /// Removes the line with the given 1-based number and renumbers the rest.
    ///
    /// # Errors
    ///
    /// Returns `CannotEdit` outside DRAFT or `LineNumberOutOfRange`.
    pub fn remove_line(&mut self, line_number: u32) -> Result<JournalLine, JournalError> {
        self.ensure_editable()?;
        let count = self.lines.len();
        let position = usize::try_from(line_number)
            .ok()
            .and_then(|n| n.checked_sub(1))
            .filter(|&i| i < count)
            .ok_or(JournalError::LineNumberOutOfRange { line_number, count })?;

        let removed = self.lines.remove(position);
        self.renumber_lines();
        Ok(removed)
    }

    /// True in DRAFT.
    #[must_use]
    pub fn can_edit(&self) -> bool {
        self.status == EntryStatus::Draft
    }

    /// True for a balanced DRAFT.
    #[must_use]
    pub fn can_post(&self) -> bool {
        self.can_edit() && self.is_balanced()
    }

    /// True when POSTED.
    #[must_use]
    pub fn can_void(&self) -> bool {
        self.status == EntryStatus::Posted
    }

    /// True when POSTED.
    #[must_use]
    pub fn can_reverse(&self) -> bool {
        self.status == EntryStatus::Posted
    }

    /// Posts a valid draft.
    ///
    /// # Errors
    ///
    /// Returns `CannotPost` outside DRAFT, or the first structural error
    /// (`NotBalanced` for an unbalanced draft).
    pub fn post(&mut self, posted_by: UserId, now: DateTime<Utc>) -> Result<(), JournalError> {
        if self.status != EntryStatus::Draft {
            return Err(JournalError::CannotPost {
                status: self.status,
            });
        }
        self.validate()?;

        self.status = EntryStatus::Posted;
        self.posting_date = Some(now);
        self.posted_by = Some(posted_by);
        self.updated_at = now;
        Ok(())
    }

    /// Voids a posted entry without an offsetting entry.
    ///
    /// # Errors
    ///
    /// Returns `CannotVoid` unless POSTED.
    pub fn void(&mut self, voided_by: UserId, now: DateTime<Utc>) -> Result<(), JournalError> {
        if !self.can_void() {
            return Err(JournalError::CannotVoid {
                status: self.status,
            });
        }
        self.status = EntryStatus::Void;
        self.voided_by = Some(voided_by);
        self.voided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Builds the draft that reverses this posted entry.
    ///
    /// The reversal is dated `now`, carries `entry_number`, and mirrors every
    /// line with debit and credit swapped. `self` is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `CannotReverse` unless POSTED.
    pub fn create_reversal(
        &self,
        reversed_by: UserId,
        entry_number: EntryNumber,
        now: DateTime<Utc>,
    ) -> Result<Self, JournalError> {
        if !self.can_reverse() {
            return Err(JournalError::CannotReverse {
                status: self.status,
            });
        }

        let original_number = self
            .entry_number
            .map(|n| n.to_string())
            .unwrap_or_default();
        let description = truncate_chars(
            &format!("Reversal of {original_number}: {}", self.description),
            DESCRIPTION_MAX_LEN,
        );

        let mut reversal = Self::draft(
            self.organization_id,
            now.date_naive(),
            description,
            reversed_by,
            now,
        );
        reversal.entry_number = Some(entry_number);
        reversal.reference.clone_from(&self.reference);
        reversal.reversal_of = Some(self.id);
        reversal.lines = self
            .lines
            .iter()
            .map(|line| line.reversed(JournalLineId::new()))
            .collect();
        reversal.renumber_lines();
        Ok(reversal)
    }

    /// Records that `reversal_id` reversed this entry.
    ///
    /// # Errors
    ///
    /// Returns `CannotReverse` unless POSTED.
    pub fn mark_reversed(
        &mut self,
        reversed_by: UserId,
        reversal_id: JournalEntryId,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        if !self.can_reverse() {
            return Err(JournalError::CannotReverse {
                status: self.status,
            });
        }
        self.status = EntryStatus::Reversed;
        self.reversed_by = Some(reversed_by);
        self.reversed_at = Some(now);
        self.reversed_by_entry = Some(reversal_id);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), JournalError> {
        if self.can_edit() {
            Ok(())
        } else {
            Err(JournalError::CannotEdit {
                status: self.status,
            })
        }
    }

    fn renumber_lines(&mut self) {
        for (index, line) in self.lines.iter_mut().enumerate() {
            line.line_number = line_number_at(index);
        }
    }
}

fn line_number_at(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}
