//! Chart of accounts entries as seen by the journal engine.

use ledgerbook_shared::types::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Account classification.
///
/// Asset and expense accounts are debit-normal; the rest are credit-normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountType {
    /// Resources owned.
    Asset,
    /// Obligations owed.
    Liability,
    /// Owners' residual interest.
    Equity,
    /// Income earned.
    Revenue,
    /// Costs incurred.
    Expense,
}

impl AccountType {
    /// All account types.
    pub const ALL: [Self; 5] = [
        Self::Asset,
        Self::Liability,
        Self::Equity,
        Self::Revenue,
        Self::Expense,
    ];

    /// Returns the code prefix every account of this type must carry.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Asset => "AST-",
            Self::Liability => "LIA-",
            Self::Equity => "EQU-",
            Self::Revenue => "REV-",
            Self::Expense => "EXP-",
        }
    }

    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "ASSET",
            Self::Liability => "LIABILITY",
            Self::Equity => "EQUITY",
            Self::Revenue => "REVENUE",
            Self::Expense => "EXPENSE",
        }
    }

    /// Parses a type from a string, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }

    /// Returns true if debits increase the balance of this type.
    #[must_use]
    pub const fn is_debit_normal(&self) -> bool {
        matches!(self, Self::Asset | Self::Expense)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by account rules and the account directory.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Account code is blank.
    #[error("Account code is required")]
    CodeRequired,

    /// Account code does not start with the prefix of its type.
    #[error("Account code '{code}' must start with '{expected}' for a {account_type} account")]
    CodePrefixMismatch {
        /// The offending code.
        code: String,
        /// The account type.
        account_type: AccountType,
        /// The prefix the type requires.
        expected: &'static str,
    },

    /// Account name is blank.
    #[error("Account name is required")]
    NameRequired,

    /// An account with the same code already exists.
    #[error("Account code '{0}' already exists")]
    DuplicateCode(String),

    /// Parent account does not exist.
    #[error("Parent account not found: {0}")]
    ParentNotFound(AccountId),

    /// Account not found.
    #[error("Account not found: {0}")]
    NotFound(String),

    /// Account has posted transactions and cannot be deactivated.
    #[error("Account {0} has posted transactions and cannot be deactivated")]
    HasPostedTransactions(AccountId),

    /// Account has active children and cannot be deactivated.
    #[error("Account {0} has active child accounts and cannot be deactivated")]
    HasActiveChildren(AccountId),

    /// Account is already inactive.
    #[error("Account {0} is already inactive")]
    AlreadyInactive(AccountId),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl AccountError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::CodeRequired => "ACCOUNT_CODE_REQUIRED",
            Self::CodePrefixMismatch { .. } => "ACCOUNT_CODE_PREFIX_MISMATCH",
            Self::NameRequired => "ACCOUNT_NAME_REQUIRED",
            Self::DuplicateCode(_) => "ACCOUNT_DUPLICATE_CODE",
            Self::ParentNotFound(_) => "ACCOUNT_PARENT_NOT_FOUND",
            Self::NotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::HasPostedTransactions(_) => "ACCOUNT_HAS_TRANSACTIONS",
            Self::HasActiveChildren(_) => "ACCOUNT_HAS_ACTIVE_CHILDREN",
            Self::AlreadyInactive(_) => "ACCOUNT_ALREADY_INACTIVE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::CodeRequired
            | Self::CodePrefixMismatch { .. }
            | Self::NameRequired
            | Self::ParentNotFound(_) => 400,
            Self::NotFound(_) => 404,
            Self::DuplicateCode(_)
            | Self::HasPostedTransactions(_)
            | Self::HasActiveChildren(_)
            | Self::AlreadyInactive(_) => 409,
            Self::Database(_) => 500,
        }
    }
}

/// A chart of accounts entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier.
    pub id: AccountId,
    /// Globally unique code, prefixed by type (e.g. `AST-1000`).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Classification.
    pub account_type: AccountType,
    /// Inactive accounts cannot receive postings.
    pub is_active: bool,
    /// Parent account in the hierarchy.
    pub parent_id: Option<AccountId>,
    /// Aggregation account not meant for direct posting.
    pub is_control_account: bool,
}

impl Account {
    /// Creates an active, non-control account.
    #[must_use]
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id: AccountId::new(),
            code: code.into(),
            name: name.into(),
            account_type,
            is_active: true,
            parent_id: None,
            is_control_account: false,
        }
    }

    /// Checks that the code is present and carries the prefix of the type.
    ///
    /// # Errors
    ///
    /// Returns `CodeRequired`, `CodePrefixMismatch` or `NameRequired`.
    pub fn validate(&self) -> Result<(), AccountError> {
        let code = self.code.trim();
        if code.is_empty() {
            return Err(AccountError::CodeRequired);
        }
        let expected = self.account_type.code_prefix();
        if !code.starts_with(expected) || code.len() == expected.len() {
            return Err(AccountError::CodePrefixMismatch {
                code: self.code.clone(),
                account_type: self.account_type,
                expected,
            });
        }
        if self.name.trim().is_empty() {
            return Err(AccountError::NameRequired);
        }
        Ok(())
    }

    /// Decides whether the account may be deactivated.
    ///
    /// # Errors
    ///
    /// Returns an error if the account is already inactive, has posted
    /// transactions, or still has active children.
    pub fn check_deactivation(
        &self,
        has_posted_transactions: bool,
        has_active_children: bool,
    ) -> Result<(), AccountError> {
        if !self.is_active {
            return Err(AccountError::AlreadyInactive(self.id));
        }
        if has_posted_transactions {
            return Err(AccountError::HasPostedTransactions(self.id));
        }
        if has_active_children {
            return Err(AccountError::HasActiveChildren(self.id));
        }
        Ok(())
    }
}
