//! Posting validation against the chart of accounts.
//!
//! Runs every check and collects the findings instead of stopping at the first
//! one, so a caller sees all problems at once. Errors block posting; warnings
//! are reported alongside a successful post.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use ledgerbook_shared::LedgerConfig;
use ledgerbook_shared::types::AccountId;
use serde::Serialize;

use super::account::Account;
use super::entry::JournalEntry;
use super::error::JournalError;
use super::status::EntryStatus;

/// Stable identifiers of posting findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// Entry failed structural validation.
    InvalidEntry,
    /// Entry is not in DRAFT.
    NotDraft,
    /// Debits and credits differ.
    NotBalanced,
    /// Line references an unknown account.
    AccountNotFound,
    /// Line references an inactive account.
    AccountInactive,
    /// Line posts to a control account.
    ControlAccount,
    /// Transaction date lies too far in the future.
    FutureDated,
    /// Transaction date lies far in the past.
    Backdated,
}

impl IssueCode {
    /// Returns the code as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidEntry => "INVALID_ENTRY",
            Self::NotDraft => "NOT_DRAFT",
            Self::NotBalanced => "NOT_BALANCED",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::AccountInactive => "ACCOUNT_INACTIVE",
            Self::ControlAccount => "CONTROL_ACCOUNT",
            Self::FutureDated => "FUTURE_DATED",
            Self::Backdated => "BACKDATED",
        }
    }
}

/// One finding of the posting validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostingIssue {
    /// What kind of finding this is.
    pub code: IssueCode,
    /// 0-based index of the line concerned, if any.
    pub line_index: Option<usize>,
    /// Account concerned, if any.
    pub account_id: Option<AccountId>,
    /// Human-readable description.
    pub message: String,
}

impl PostingIssue {
    /// Creates an entry-level finding.
    #[must_use]
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            line_index: None,
            account_id: None,
            message: message.into(),
        }
    }

    /// Creates a finding about one line and its account.
    #[must_use]
    pub fn for_line(
        code: IssueCode,
        line_index: usize,
        account_id: AccountId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            line_index: Some(line_index),
            account_id: Some(account_id),
            message: message.into(),
        }
    }
}

/// Outcome of posting validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostingValidation {
    /// Findings that block posting.
    pub errors: Vec<PostingIssue>,
    /// Findings reported but not blocking.
    pub warnings: Vec<PostingIssue>,
}

impl PostingValidation {
    /// Returns true if nothing blocks posting.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Converts into the warnings on success, or `PostingRejected`.
    ///
    /// # Errors
    ///
    /// Returns `JournalError::PostingRejected` carrying every blocking issue.
    pub fn into_result(self) -> Result<Vec<PostingIssue>, JournalError> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(JournalError::PostingRejected {
                issues: self.errors,
            })
        }
    }
}

/// Date thresholds applied during posting validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingPolicy {
    /// How far past "now" a transaction date may start.
    pub future_tolerance: TimeDelta,
    /// Age beyond which a transaction date is flagged as backdated.
    pub backdate_warning: TimeDelta,
}

impl Default for PostingPolicy {
    fn default() -> Self {
        Self::from(&LedgerConfig::default())
    }
}

impl From<&LedgerConfig> for PostingPolicy {
    fn from(config: &LedgerConfig) -> Self {
        Self {
            future_tolerance: TimeDelta::hours(i64::from(config.future_tolerance_hours)),
            backdate_warning: TimeDelta::days(i64::from(config.backdate_warning_days)),
        }
    }
}

/// Cross-checks a draft entry against the accounts it references.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostingValidator {
    policy: PostingPolicy,
}

impl PostingValidator {
    /// Creates a validator with the given thresholds.
    #[must_use]
    pub const fn new(policy: PostingPolicy) -> Self {
        Self { policy }
    }

    /// Validates `entry` for posting at `now`.
    ///
    /// `accounts` must hold every account the lines reference that exists;
    /// a missing key is reported as a nonexistent account.
    #[must_use]
    pub fn validate(
        &self,
        entry: &JournalEntry,
        accounts: &HashMap<AccountId, Account>,
        now: DateTime<Utc>,
    ) -> PostingValidation {
        let mut result = PostingValidation::default();

        if let Err(err) = entry.validate() {
            let mut issue = PostingIssue::new(IssueCode::InvalidEntry, err.to_string());
            issue.line_index = err.line_index();
            result.errors.push(issue);
            return result;
        }

        if entry.status != EntryStatus::Draft {
            result.errors.push(PostingIssue::new(
                IssueCode::NotDraft,
                format!("entry must be in DRAFT to post, found {}", entry.status),
            ));
        }

        let totals = entry.totals();
        if !totals.is_balanced {
            result.errors.push(PostingIssue::new(
                IssueCode::NotBalanced,
                format!(
                    "entry is not balanced: debit {} vs credit {} (difference {})",
                    totals.debit,
                    totals.credit,
                    totals.difference()
                ),
            ));
        }

        for (index, line) in entry.lines().iter().enumerate() {
            let Some(account) = accounts.get(&line.account_id) else {
                result.errors.push(PostingIssue::for_line(
                    IssueCode::AccountNotFound,
                    index,
                    line.account_id,
                    format!("line {index}: account {} does not exist", line.account_id),
                ));
                continue;
            };

            if !account.is_active {
                result.errors.push(PostingIssue::for_line(
                    IssueCode::AccountInactive,
                    index,
                    line.account_id,
                    format!("line {index}: account {} is inactive", account.code),
                ));
            }

            if account.is_control_account {
                result.warnings.push(PostingIssue::for_line(
                    IssueCode::ControlAccount,
                    index,
                    line.account_id,
                    format!("line {index}: account {} is a control account", account.code),
                ));
            }
        }

        let starts_at = entry.transaction_date.and_time(NaiveTime::MIN).and_utc();
        if starts_at - now > self.policy.future_tolerance {
            result.errors.push(PostingIssue::new(
                IssueCode::FutureDated,
                format!(
                    "transaction date {} is more than {} hours in the future",
                    entry.transaction_date,
                    self.policy.future_tolerance.num_hours()
                ),
            ));
        } else if now - starts_at > self.policy.backdate_warning {
            result.warnings.push(PostingIssue::new(
                IssueCode::Backdated,
                format!(
                    "transaction date {} is more than {} days old",
                    entry.transaction_date,
                    self.policy.backdate_warning.num_days()
                ),
            ));
        }

        result
    }
}
