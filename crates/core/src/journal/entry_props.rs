//! Property-based tests for journal entry balance and line numbering.

use chrono::{NaiveDate, TimeZone, Utc};
use ledgerbook_shared::types::{AccountId, OrganizationId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::entry::JournalEntry;
use super::error::JournalError;
use super::line::JournalLine;
use super::numbering::EntryNumber;
use super::status::EntryStatus;

/// Strategy for a positive amount with up to 4 decimal places.
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000_000i64).prop_map(|units| Decimal::new(units, 4))
}

fn empty_draft() -> JournalEntry {
    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
    let mut entry = JournalEntry::draft(OrganizationId::new(), date, "Generated", UserId::new(), now);
    entry
        .assign_entry_number(EntryNumber::new(date, 1).unwrap())
        .unwrap();
    entry
}

/// Builds a draft whose debits are `amounts` and whose single credit is
/// their sum plus `skew`.
fn draft_with(amounts: &[Decimal], skew: Decimal) -> JournalEntry {
    let mut entry = empty_draft();
    let mut sum = Decimal::ZERO;
    for amount in amounts {
        sum += *amount;
        entry
            .add_line(JournalLine::debit(AccountId::new(), *amount, "Debit"))
            .unwrap();
    }
    entry
        .add_line(JournalLine::credit(AccountId::new(), sum + skew, "Credit"))
        .unwrap();
    entry
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A draft whose credit equals the sum of its debits validates and posts.
    #[test]
    fn prop_matching_totals_post(amounts in prop::collection::vec(positive_amount(), 1..20)) {
        let mut entry = draft_with(&amounts, Decimal::ZERO);
        prop_assert!(entry.validate().is_ok());
        prop_assert!(entry.can_post());
        let now = entry.created_at;
        prop_assert!(entry.post(UserId::new(), now).is_ok());
        prop_assert_eq!(entry.status, EntryStatus::Posted);
    }

    /// Any nonzero difference, however small, blocks posting.
    #[test]
    fn prop_any_difference_blocks_posting(
        amounts in prop::collection::vec(positive_amount(), 1..20),
        skew_units in 1i64..1_000i64,
    ) {
        let mut entry = draft_with(&amounts, Decimal::new(skew_units, 4));
        prop_assert!(!entry.is_balanced());
        let now = entry.created_at;
        let is_not_balanced = matches!(
            entry.post(UserId::new(), now),
            Err(JournalError::NotBalanced { .. })
        );
        prop_assert!(is_not_balanced);
        prop_assert_eq!(entry.status, EntryStatus::Draft);
    }

    /// Line numbers stay 1..=N after any sequence of removals.
    #[test]
    fn prop_line_numbers_stay_contiguous(
        amounts in prop::collection::vec(positive_amount(), 2..15),
        removals in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let mut entry = draft_with(&amounts, Decimal::ZERO);
        for removal in removals {
            let count = entry.lines().len();
            if count == 0 {
                break;
            }
            let line_number = u32::try_from(removal.index(count) + 1).unwrap();
            entry.remove_line(line_number).unwrap();

            let numbers: Vec<u32> = entry.lines().iter().map(|l| l.line_number).collect();
            let expected: Vec<u32> = (1..=u32::try_from(count - 1).unwrap()).collect();
            prop_assert_eq!(numbers, expected);
        }
    }

    /// Totals always equal the sums of the line amounts.
    #[test]
    fn prop_totals_match_lines(
        amounts in prop::collection::vec(positive_amount(), 1..20),
        skew_units in 0i64..1_000i64,
    ) {
        let entry = draft_with(&amounts, Decimal::new(skew_units, 4));
        let debit: Decimal = entry.lines().iter().map(|l| l.debit).sum();
        let credit: Decimal = entry.lines().iter().map(|l| l.credit).sum();
        prop_assert_eq!(entry.total_debit(), debit);
        prop_assert_eq!(entry.total_credit(), credit);
        prop_assert_eq!(entry.is_balanced(), debit == credit);
    }

    /// A reversal of any posted entry is itself balanced, with sides swapped.
    #[test]
    fn prop_reversal_mirrors_totals(amounts in prop::collection::vec(positive_amount(), 1..20)) {
        let mut original = draft_with(&amounts, Decimal::ZERO);
        let now = original.created_at;
        original.post(UserId::new(), now).unwrap();

        let number = EntryNumber::new(now.date_naive(), 2).unwrap();
        let reversal = original.create_reversal(UserId::new(), number, now).unwrap();

        prop_assert!(reversal.validate().is_ok());
        prop_assert_eq!(reversal.total_debit(), original.total_credit());
        prop_assert_eq!(reversal.total_credit(), original.total_debit());
        prop_assert_eq!(reversal.lines().len(), original.lines().len());
    }
}
