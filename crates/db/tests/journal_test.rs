//! Integration tests for the journal repository.
//!
//! Covers the create/post/void/reverse lifecycle, optimistic concurrency on
//! draft updates, and posting validation against stored accounts.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::TestLedger;
use ledgerbook_core::journal::{
    AccountError, EntryStatus, IssueCode, JournalEntry, JournalError, JournalLine,
};
use ledgerbook_db::repositories::JournalFilter;
use ledgerbook_shared::types::{JournalEntryId, PageRequest, UserId};

macro_rules! ledger_or_skip {
    () => {
        match TestLedger::setup().await {
            Some(ledger) => ledger,
            None => return,
        }
    };
}

// ============================================================================
// Test: balanced sale is created, numbered and posted
// ============================================================================
#[tokio::test]
async fn test_create_and_post_balanced_sale() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(100.00), dec!(100.00)), ledger.user_id)
        .await
        .expect("create should succeed");

    assert_eq!(created.status, EntryStatus::Draft);
    assert_eq!(
        created.entry_number.map(|n| n.to_string()).as_deref(),
        Some("JE-20250101-0001")
    );
    assert_eq!(created.version, 1);

    let poster = UserId::new();
    let posted = ledger
        .journal
        .post_entry(ledger.org_id, created.id, poster)
        .await
        .expect("post should succeed");

    assert_eq!(posted.entry.status, EntryStatus::Posted);
    assert_eq!(posted.entry.posted_by, Some(poster));
    assert_eq!(posted.entry.version, 2);
    assert!(posted.warnings.is_empty());

    let stored = ledger
        .journal
        .get_entry(ledger.org_id, created.id)
        .await
        .expect("entry should be readable");
    assert_eq!(stored.status, EntryStatus::Posted);
    assert_eq!(stored.total_debit(), dec!(100.00));
    assert_eq!(stored.total_credit(), dec!(100.00));
    assert_eq!(stored.lines().len(), 2);
}

// ============================================================================
// Test: unbalanced draft is rejected before anything is stored
// ============================================================================
#[tokio::test]
async fn test_unbalanced_entry_is_rejected() {
    let ledger = ledger_or_skip!();

    let err = ledger
        .journal
        .create_entry(ledger.sale(dec!(100.00), dec!(99.00)), ledger.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "JOURNAL_NOT_BALANCED");

    // The rolled-back attempt must not consume a number.
    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(5), dec!(5)), ledger.user_id)
        .await
        .unwrap();
    assert_eq!(created.entry_number.unwrap().sequence(), 1);
}

// ============================================================================
// Test: posting twice fails with CannotPost
// ============================================================================
#[tokio::test]
async fn test_second_post_fails() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(10), dec!(10)), ledger.user_id)
        .await
        .unwrap();
    ledger
        .journal
        .post_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap();

    let err = ledger
        .journal
        .post_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        JournalError::CannotPost {
            status: EntryStatus::Posted
        }
    ));
}

// ============================================================================
// Test: posting to a deactivated account is rejected with the line index
// ============================================================================
#[tokio::test]
async fn test_post_rejects_inactive_account() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(20), dec!(20)), ledger.user_id)
        .await
        .unwrap();
    ledger
        .accounts
        .deactivate_account(ledger.sales.id)
        .await
        .expect("unused account can be deactivated");

    let err = ledger
        .journal
        .post_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap_err();

    let JournalError::PostingRejected { issues } = &err else {
        panic!("Expected PostingRejected, got {err:?}");
    };
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, IssueCode::AccountInactive);
    assert_eq!(issues[0].line_index, Some(1));
    assert_eq!(issues[0].account_id, Some(ledger.sales.id));

    let stored = ledger
        .journal
        .get_entry(ledger.org_id, created.id)
        .await
        .unwrap();
    assert_eq!(stored.status, EntryStatus::Draft);
}

// ============================================================================
// Test: void a posted entry
// ============================================================================
#[tokio::test]
async fn test_void_posted_entry() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(30), dec!(30)), ledger.user_id)
        .await
        .unwrap();

    let err = ledger
        .journal
        .void_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::CannotVoid { .. }));

    ledger
        .journal
        .post_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap();
    let voided = ledger
        .journal
        .void_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap();
    assert_eq!(voided.status, EntryStatus::Void);
    assert_eq!(voided.voided_by, Some(ledger.user_id));

    let err = ledger
        .journal
        .reverse_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        JournalError::CannotReverse {
            status: EntryStatus::Void
        }
    ));
}

// ============================================================================
// Test: reversal creates a mirrored draft and flips the original
// ============================================================================
#[tokio::test]
async fn test_reverse_posted_entry() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(75.50), dec!(75.50)), ledger.user_id)
        .await
        .unwrap();
    ledger
        .journal
        .post_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap();

    let reverser = UserId::new();
    let result = ledger
        .journal
        .reverse_entry(ledger.org_id, created.id, reverser)
        .await
        .expect("reversal should succeed");

    assert_eq!(result.original.status, EntryStatus::Reversed);
    assert_eq!(result.original.reversed_by_entry, Some(result.reversal.id));
    assert_eq!(result.reversal.status, EntryStatus::Draft);
    assert_eq!(result.reversal.reversal_of, Some(created.id));
    assert_eq!(
        result.reversal.entry_number.map(|n| n.to_string()).as_deref(),
        Some("JE-20250101-0002")
    );
    assert_eq!(result.reversal.total_debit(), dec!(75.50));
    assert_eq!(result.reversal.lines()[0].credit, dec!(75.50));
    assert_eq!(result.reversal.lines()[0].debit, Decimal::ZERO);

    let stored_original = ledger
        .journal
        .get_entry(ledger.org_id, created.id)
        .await
        .unwrap();
    assert_eq!(stored_original.status, EntryStatus::Reversed);
    assert_eq!(stored_original.reversed_by, Some(reverser));

    let err = ledger
        .journal
        .delete_draft(ledger.org_id, result.reversal.id)
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::CannotDeleteReversal(_)));

    let posted_reversal = ledger
        .journal
        .post_entry(ledger.org_id, result.reversal.id, reverser)
        .await
        .expect("reversal draft can be posted");
    assert_eq!(posted_reversal.entry.status, EntryStatus::Posted);
}

// ============================================================================
// Test: stale version on update is a concurrent modification
// ============================================================================
#[tokio::test]
async fn test_update_draft_with_version_check() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(40), dec!(40)), ledger.user_id)
        .await
        .unwrap();

    let mut edit = created.clone();
    edit.set_header("Sale, corrected", Some("INV-7".to_string()), created.transaction_date)
        .unwrap();
    edit.add_line(JournalLine::debit(ledger.cash.id, dec!(2), "Fee"))
        .unwrap();
    edit.add_line(JournalLine::credit(ledger.sales.id, dec!(2), "Fee"))
        .unwrap();

    let updated = ledger.journal.update_entry(edit.clone()).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.entry_number, created.entry_number);

    let stored = ledger
        .journal
        .get_entry(ledger.org_id, created.id)
        .await
        .unwrap();
    assert_eq!(stored.description, "Sale, corrected");
    assert_eq!(stored.lines().len(), 4);
    assert_eq!(stored.total_debit(), dec!(42));

    let err = ledger.journal.update_entry(edit).await.unwrap_err();
    assert!(matches!(
        err,
        JournalError::ConcurrentModification {
            expected: 1,
            actual: 2,
            ..
        }
    ));
    assert!(err.is_retryable());
}

// ============================================================================
// Test: drafts can be deleted, posted entries cannot be edited
// ============================================================================
#[tokio::test]
async fn test_delete_draft_and_edit_posted() {
    let ledger = ledger_or_skip!();

    let draft = ledger
        .journal
        .create_entry(ledger.sale(dec!(1), dec!(1)), ledger.user_id)
        .await
        .unwrap();
    ledger
        .journal
        .delete_draft(ledger.org_id, draft.id)
        .await
        .unwrap();
    let err = ledger
        .journal
        .get_entry(ledger.org_id, draft.id)
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::EntryNotFound(id) if id == draft.id));

    let posted = ledger
        .journal
        .create_entry(ledger.sale(dec!(2), dec!(2)), ledger.user_id)
        .await
        .unwrap();
    let posted = ledger
        .journal
        .post_entry(ledger.org_id, posted.id, ledger.user_id)
        .await
        .unwrap()
        .entry;

    let err = ledger.journal.update_entry(posted.clone()).await.unwrap_err();
    assert!(matches!(err, JournalError::CannotEdit { .. }));
    let err = ledger
        .journal
        .delete_draft(ledger.org_id, posted.id)
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::CannotEdit { .. }));
}

// ============================================================================
// Test: entries are invisible to other organizations
// ============================================================================
#[tokio::test]
async fn test_entry_not_found_in_other_organization() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(3), dec!(3)), ledger.user_id)
        .await
        .unwrap();

    let other_org = ledgerbook_shared::types::OrganizationId::new();
    let err = ledger
        .journal
        .get_entry(other_org, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::EntryNotFound(_)));

    let err = ledger
        .journal
        .post_entry(ledger.org_id, JournalEntryId::new(), ledger.user_id)
        .await
        .unwrap_err();
    assert_eq!(err.http_status_code(), 404);
}

// ============================================================================
// Test: list with status filter and pagination
// ============================================================================
#[tokio::test]
async fn test_list_entries_filters_and_paginates() {
    let ledger = ledger_or_skip!();

    let mut ids = Vec::new();
    for amount in [dec!(1), dec!(2), dec!(3)] {
        let created = ledger
            .journal
            .create_entry(ledger.sale(amount, amount), ledger.user_id)
            .await
            .unwrap();
        ids.push(created.id);
    }
    ledger
        .journal
        .post_entry(ledger.org_id, ids[0], ledger.user_id)
        .await
        .unwrap();

    let all = ledger
        .journal
        .list_entries(ledger.org_id, &JournalFilter::default(), PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(all.meta.total, 3);
    assert_eq!(all.meta.total_pages, 2);
    assert_eq!(all.data.len(), 2);
    assert_eq!(
        all.data[0].entry_number.map(|n| n.to_string()).as_deref(),
        Some("JE-20250101-0003")
    );
    assert!(all.data.iter().all(|e| e.lines().len() == 2));

    let posted = ledger
        .journal
        .list_entries(
            ledger.org_id,
            &JournalFilter {
                status: Some(EntryStatus::Posted),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(posted.meta.total, 1);
    assert_eq!(posted.data[0].id, ids[0]);

    let later = ledger
        .journal
        .list_entries(
            ledger.org_id,
            &JournalFilter {
                date_from: Some(common::jan_first().succ_opt().unwrap()),
                ..Default::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert!(later.data.is_empty());
}

// ============================================================================
// Test: accounts with posted activity cannot be deactivated
// ============================================================================
#[tokio::test]
async fn test_account_with_postings_cannot_be_deactivated() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(9), dec!(9)), ledger.user_id)
        .await
        .unwrap();
    assert!(!ledger.accounts.has_posted_transactions(ledger.cash.id).await.unwrap());

    ledger
        .journal
        .post_entry(ledger.org_id, created.id, ledger.user_id)
        .await
        .unwrap();
    assert!(ledger.accounts.has_posted_transactions(ledger.cash.id).await.unwrap());

    let err = ledger
        .accounts
        .deactivate_account(ledger.cash.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::HasPostedTransactions(id) if id == ledger.cash.id));

    let by_code = ledger
        .accounts
        .get_by_code(&ledger.cash.code)
        .await
        .unwrap()
        .expect("account exists");
    assert_eq!(by_code.id, ledger.cash.id);
    assert!(by_code.is_active);
}

// ============================================================================
// Test: storing the same draft twice is a plain persistence failure
// ============================================================================
#[tokio::test]
async fn test_duplicate_draft_is_not_a_numbering_conflict() {
    let ledger = ledger_or_skip!();

    let draft = ledger.sale(dec!(12), dec!(12));
    ledger
        .journal
        .create_entry(draft.clone(), ledger.user_id)
        .await
        .unwrap();

    let err = ledger
        .journal
        .create_entry(draft, ledger.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, JournalError::Database(_)), "got {err:?}");
    assert_eq!(err.error_code(), "DATABASE_ERROR");
    assert!(!err.is_retryable());

    // The failed insert rolled back its sequence number.
    let next = ledger
        .journal
        .create_entry(ledger.sale(dec!(1), dec!(1)), ledger.user_id)
        .await
        .unwrap();
    assert_eq!(next.entry_number.unwrap().sequence(), 2);
}

// ============================================================================
// Test: drafts with gapped or repeated line numbers are not stored
// ============================================================================
#[tokio::test]
async fn test_non_contiguous_line_numbers_are_rejected() {
    let ledger = ledger_or_skip!();

    for numbers in [[1, 7], [1, 1]] {
        let mut lines = ledger.sale(dec!(8), dec!(8)).lines().to_vec();
        lines[0].line_number = numbers[0];
        lines[1].line_number = numbers[1];
        let draft = JournalEntry::draft(
            ledger.org_id,
            common::jan_first(),
            "Hand-built sale",
            ledger.user_id,
            common::test_now(),
        )
        .with_stored_lines(lines);

        let err = ledger
            .journal
            .create_entry(draft, ledger.user_id)
            .await
            .unwrap_err();
        assert!(
            matches!(err, JournalError::LineNumberMismatch { index: 1, expected: 2, .. }),
            "got {err:?}"
        );
        assert!(!err.is_retryable());
    }

    let page = ledger
        .journal
        .list_entries(ledger.org_id, &JournalFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.meta.total, 0);
}

// ============================================================================
// Test: updating a draft never writes caller-supplied audit fields
// ============================================================================
#[tokio::test]
async fn test_update_keeps_stored_audit_fields() {
    let ledger = ledger_or_skip!();

    let created = ledger
        .journal
        .create_entry(ledger.sale(dec!(6), dec!(6)), ledger.user_id)
        .await
        .unwrap();

    let mut edit = created.clone();
    edit.description = "Sale, relabelled".to_string();
    edit.posted_by = Some(UserId::new());
    edit.posting_date = Some(common::test_now());
    edit.voided_by = Some(UserId::new());
    edit.reversed_by = Some(UserId::new());
    edit.reversed_by_entry = Some(JournalEntryId::new());

    let updated = ledger.journal.update_entry(edit).await.unwrap();
    assert_eq!(updated.description, "Sale, relabelled");
    assert_eq!(updated.posted_by, None);
    assert_eq!(updated.reversed_by_entry, None);

    let stored = ledger
        .journal
        .get_entry(ledger.org_id, created.id)
        .await
        .unwrap();
    assert_eq!(stored.status, EntryStatus::Draft);
    assert_eq!(stored.description, "Sale, relabelled");
    assert_eq!(stored.posted_by, None);
    assert_eq!(stored.posting_date, None);
    assert_eq!(stored.voided_by, None);
    assert_eq!(stored.reversed_by, None);
    assert_eq!(stored.reversed_by_entry, None);
}
