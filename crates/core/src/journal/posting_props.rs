//! Property-based tests for posting validation.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};
use ledgerbook_shared::types::{AccountId, OrganizationId, UserId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::account::{Account, AccountType};
use super::entry::JournalEntry;
use super::line::JournalLine;
use super::numbering::EntryNumber;
use super::posting::{IssueCode, PostingValidator};

#[derive(Debug, Clone, Copy)]
enum AccountState {
    Active,
    Inactive,
    Missing,
    Control,
}

fn account_state() -> impl Strategy<Value = AccountState> {
    prop_oneof![
        Just(AccountState::Active),
        Just(AccountState::Inactive),
        Just(AccountState::Missing),
        Just(AccountState::Control),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every missing or inactive account yields exactly one error naming its
    /// line; every control account yields exactly one warning.
    #[test]
    fn prop_one_issue_per_problem_line(
        states in prop::collection::vec(account_state(), 2..12),
        cents in 1i64..1_000_000i64,
    ) {
        prop_assume!(states.len() % 2 == 0);
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let mut entry = JournalEntry::draft(OrganizationId::new(), date, "Generated", UserId::new(), now);
        entry.assign_entry_number(EntryNumber::new(date, 1).unwrap()).unwrap();

        let amount = Decimal::new(cents, 2);
        let mut accounts = HashMap::new();
        for (index, state) in states.iter().enumerate() {
            let mut account = Account::new(format!("AST-{index}"), "Generated", AccountType::Asset);
            match state {
                AccountState::Active | AccountState::Missing => {}
                AccountState::Inactive => account.is_active = false,
                AccountState::Control => account.is_control_account = true,
            }
            let id: AccountId = account.id;
            if !matches!(state, AccountState::Missing) {
                accounts.insert(id, account);
            }
            // Alternate sides so the entry balances when the count is even.
            let line = if index % 2 == 0 {
                JournalLine::debit(id, amount, "Debit")
            } else {
                JournalLine::credit(id, amount, "Credit")
            };
            entry.add_line(line).unwrap();
        }

        let result = PostingValidator::default().validate(&entry, &accounts, now);

        for (index, state) in states.iter().enumerate() {
            let errors: Vec<_> = result.errors.iter().filter(|i| i.line_index == Some(index)).collect();
            let warnings: Vec<_> = result.warnings.iter().filter(|i| i.line_index == Some(index)).collect();
            match state {
                AccountState::Active => {
                    prop_assert!(errors.is_empty());
                    prop_assert!(warnings.is_empty());
                }
                AccountState::Missing => {
                    prop_assert_eq!(errors.len(), 1);
                    prop_assert_eq!(errors[0].code, IssueCode::AccountNotFound);
                }
                AccountState::Inactive => {
                    prop_assert_eq!(errors.len(), 1);
                    prop_assert_eq!(errors[0].code, IssueCode::AccountInactive);
                }
                AccountState::Control => {
                    prop_assert!(errors.is_empty());
                    prop_assert_eq!(warnings.len(), 1);
                    prop_assert_eq!(warnings[0].code, IssueCode::ControlAccount);
                }
            }
        }

        let blocked = states
            .iter()
            .any(|s| matches!(s, AccountState::Missing | AccountState::Inactive));
        prop_assert_eq!(result.is_valid(), !blocked);
    }
}
