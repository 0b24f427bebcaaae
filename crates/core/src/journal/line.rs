//! Journal line: a single debit-or-credit row of an entry.

use ledgerbook_shared::types::{AccountId, JournalLineId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a line description, in characters.
pub const LINE_DESCRIPTION_MAX_LEN: usize = 255;

/// Maximum length of a line reference, in characters.
pub const LINE_REFERENCE_MAX_LEN: usize = 100;

/// Maximum number of fractional digits an amount may carry (`NUMERIC(19,4)`).
pub const AMOUNT_MAX_SCALE: u32 = 4;

/// Prefix applied to the description of a reversed line.
pub const REVERSAL_LINE_PREFIX: &str = "Reversal: ";

/// Which side of the ledger a line affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountKind {
    /// Debit side.
    Debit,
    /// Credit side.
    Credit,
}

impl AmountKind {
    /// Returns `"debit"` or `"credit"`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

/// Shape errors of a single journal line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineError {
    /// No account was referenced.
    #[error("Account is required")]
    AccountRequired,

    /// Both debit and credit are zero.
    #[error("Either a debit or a credit amount is required")]
    NoAmount,

    /// Debit and credit are both nonzero.
    #[error("A line cannot carry both a debit and a credit amount")]
    BothAmounts,

    /// Debit amount is negative.
    #[error("Debit amount cannot be negative")]
    NegativeDebit,

    /// Credit amount is negative.
    #[error("Credit amount cannot be negative")]
    NegativeCredit,

    /// Amount has more fractional digits than the ledger stores.
    #[error("Amount {0} has more than 4 decimal places")]
    TooManyDecimalPlaces(Decimal),

    /// Description is blank.
    #[error("Line description is required")]
    DescriptionRequired,

    /// Description exceeds the maximum length.
    #[error("Line description is {0} characters, maximum is 255")]
    DescriptionTooLong(usize),

    /// Reference exceeds the maximum length.
    #[error("Line reference is {0} characters, maximum is 100")]
    ReferenceTooLong(usize),
}

impl LineError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AccountRequired => "LINE_ACCOUNT_REQUIRED",
            Self::NoAmount => "LINE_NO_AMOUNT",
            Self::BothAmounts => "LINE_BOTH_AMOUNTS",
            Self::NegativeDebit => "LINE_NEGATIVE_DEBIT",
            Self::NegativeCredit => "LINE_NEGATIVE_CREDIT",
            Self::TooManyDecimalPlaces(_) => "LINE_TOO_MANY_DECIMAL_PLACES",
            Self::DescriptionRequired => "LINE_DESCRIPTION_REQUIRED",
            Self::DescriptionTooLong(_) => "LINE_DESCRIPTION_TOO_LONG",
            Self::ReferenceTooLong(_) => "LINE_REFERENCE_TOO_LONG",
        }
    }
}

/// One debit-or-credit row of a journal entry.
///
/// Exactly one of `debit`/`credit` is strictly positive on a valid line; the
/// other is zero. Lines are owned by their entry, which assigns `line_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    /// Unique identifier for this line.
    pub id: JournalLineId,
    /// The account affected by this line.
    pub account_id: AccountId,
    /// 1-based position within the entry.
    pub line_number: u32,
    /// What the line is for.
    pub description: String,
    /// External reference (invoice number, cheque number, ...).
    pub reference: String,
    /// Debit amount, zero on a credit line.
    pub debit: Decimal,
    /// Credit amount, zero on a debit line.
    pub credit: Decimal,
}

impl JournalLine {
    /// Creates a debit line. The entry assigns the line number.
    #[must_use]
    pub fn debit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            id: JournalLineId::new(),
            account_id,
            line_number: 0,
            description: description.into(),
            reference: String::new(),
            debit: amount,
            credit: Decimal::ZERO,
        }
    }

    /// Creates a credit line. The entry assigns the line number.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            id: JournalLineId::new(),
            account_id,
            line_number: 0,
            description: description.into(),
            reference: String::new(),
            debit: Decimal::ZERO,
            credit: amount,
        }
    }

    /// Sets the line reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Checks the line's own fields.
    ///
    /// # Errors
    ///
    /// Returns the first `LineError` found, checking the account, then the
    /// amounts, then the text fields.
    pub fn validate(&self) -> Result<(), LineError> {
        if self.account_id.is_nil() {
            return Err(LineError::AccountRequired);
        }
        if self.debit.is_sign_negative() && !self.debit.is_zero() {
            return Err(LineError::NegativeDebit);
        }
        if self.credit.is_sign_negative() && !self.credit.is_zero() {
            return Err(LineError::NegativeCredit);
        }
        match (self.debit.is_zero(), self.credit.is_zero()) {
            (false, false) => return Err(LineError::BothAmounts),
            (true, true) => return Err(LineError::NoAmount),
            _ => {}
        }
        let amount = self.amount();
        if amount.normalize().scale() > AMOUNT_MAX_SCALE {
            return Err(LineError::TooManyDecimalPlaces(amount));
        }
        if self.description.trim().is_empty() {
            return Err(LineError::DescriptionRequired);
        }
        let description_len = self.description.chars().count();
        if description_len > LINE_DESCRIPTION_MAX_LEN {
            return Err(LineError::DescriptionTooLong(description_len));
        }
        let reference_len = self.reference.chars().count();
        if reference_len > LINE_REFERENCE_MAX_LEN {
            return Err(LineError::ReferenceTooLong(reference_len));
        }
        Ok(())
    }

    /// Returns whichever of debit/credit is nonzero.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        if self.debit.is_zero() {
            self.credit
        } else {
            self.debit
        }
    }

    /// Returns the side this line affects.
    #[must_use]
    pub fn amount_kind(&self) -> AmountKind {
        if self.debit.is_zero() {
            AmountKind::Credit
        } else {
            AmountKind::Debit
        }
    }

    /// Returns a copy with debit and credit swapped and the description
    /// prefixed with `Reversal: `.
    #[must_use]
    pub fn reversed(&self, id: JournalLineId) -> Self {
        Self {
            id,
            account_id: self.account_id,
            line_number: self.line_number,
            description: truncate_chars(
                &format!("{REVERSAL_LINE_PREFIX}{}", self.description),
                LINE_DESCRIPTION_MAX_LEN,
            ),
            reference: self.reference.clone(),
            debit: self.credit,
            credit: self.debit,
        }
    }
}

/// Cuts `s` to at most `max` characters.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn line(debit: Decimal, credit: Decimal) -> JournalLine {
        JournalLine {
            id: JournalLineId::new(),
            account_id: AccountId::new(),
            line_number: 1,
            description: "Office supplies".to_string(),
            reference: String::new(),
            debit,
            credit,
        }
    }

    #[test]
    fn test_valid_debit_and_credit_lines() {
        assert!(line(dec!(100.00), Decimal::ZERO).validate().is_ok());
        assert!(line(Decimal::ZERO, dec!(0.01)).validate().is_ok());
    }

    #[rstest]
    #[case(dec!(0), dec!(0), LineError::NoAmount)]
    #[case(dec!(10), dec!(10), LineError::BothAmounts)]
    #[case(dec!(-5), dec!(0), LineError::NegativeDebit)]
    #[case(dec!(0), dec!(-5), LineError::NegativeCredit)]
    #[case(dec!(-5), dec!(5), LineError::NegativeDebit)]
    fn test_amount_shape_errors(
        #[case] debit: Decimal,
        #[case] credit: Decimal,
        #[case] expected: LineError,
    ) {
        assert_eq!(line(debit, credit).validate(), Err(expected));
    }

    #[test]
    fn test_precision_limit() {
        assert!(line(dec!(1.2345), Decimal::ZERO).validate().is_ok());
        assert!(line(dec!(1.230000), Decimal::ZERO).validate().is_ok());
        assert_eq!(
            line(dec!(1.23456), Decimal::ZERO).validate(),
            Err(LineError::TooManyDecimalPlaces(dec!(1.23456)))
        );
    }

    #[test]
    fn test_account_required() {
        let mut l = line(dec!(1), Decimal::ZERO);
        l.account_id = AccountId::from_uuid(Uuid::nil());
        assert_eq!(l.validate(), Err(LineError::AccountRequired));
    }

    #[test]
    fn test_description_rules() {
        let mut l = line(dec!(1), Decimal::ZERO);
        l.description = "   ".to_string();
        assert_eq!(l.validate(), Err(LineError::DescriptionRequired));

        l.description = "x".repeat(LINE_DESCRIPTION_MAX_LEN);
        assert!(l.validate().is_ok());

        l.description = "x".repeat(LINE_DESCRIPTION_MAX_LEN + 1);
        assert_eq!(l.validate(), Err(LineError::DescriptionTooLong(256)));
    }

    #[test]
    fn test_reference_limit() {
        let l = line(dec!(1), Decimal::ZERO).with_reference("r".repeat(101));
        assert_eq!(l.validate(), Err(LineError::ReferenceTooLong(101)));
        let l = line(dec!(1), Decimal::ZERO).with_reference("r".repeat(100));
        assert!(l.validate().is_ok());
    }

    #[test]
    fn test_amount_and_kind() {
        let d = line(dec!(42.50), Decimal::ZERO);
        assert_eq!(d.amount(), dec!(42.50));
        assert_eq!(d.amount_kind(), AmountKind::Debit);
        assert_eq!(d.amount_kind().as_str(), "debit");

        let c = line(Decimal::ZERO, dec!(7));
        assert_eq!(c.amount(), dec!(7));
        assert_eq!(c.amount_kind(), AmountKind::Credit);
    }

    #[test]
    fn test_reversed_swaps_sides() {
        let original = line(dec!(100.00), Decimal::ZERO).with_reference("INV-7");
        let new_id = JournalLineId::new();
        let reversed = original.reversed(new_id);

        assert_eq!(reversed.id, new_id);
        assert_eq!(reversed.debit, Decimal::ZERO);
        assert_eq!(reversed.credit, dec!(100.00));
        assert_eq!(reversed.account_id, original.account_id);
        assert_eq!(reversed.reference, "INV-7");
        assert_eq!(reversed.description, "Reversal: Office supplies");
        assert!(reversed.validate().is_ok());
    }

    #[test]
    fn test_reversed_description_stays_within_limit() {
        let mut original = line(dec!(1), Decimal::ZERO);
        original.description = "é".repeat(LINE_DESCRIPTION_MAX_LEN);
        let reversed = original.reversed(JournalLineId::new());
        assert_eq!(reversed.description.chars().count(), LINE_DESCRIPTION_MAX_LEN);
        assert!(reversed.description.starts_with(REVERSAL_LINE_PREFIX));
    }
}
