//! Account repository for chart of accounts lookups and lifecycle.

use std::collections::HashMap;

use chrono::Utc;
use ledgerbook_core::journal::{Account, AccountError, AccountType};
use ledgerbook_shared::types::AccountId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QuerySelect, RelationTrait, Set, SqlErr,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::entities::{accounts, journal_entries, journal_lines, sea_orm_active_enums::JournalStatus};

use super::mapping::{account_from_model, account_type_to_db};

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    /// Account code, prefixed by type (e.g. `AST-1000`).
    pub code: String,
    /// Account name.
    pub name: String,
    /// Account type.
    pub account_type: AccountType,
    /// Parent account ID for hierarchical structure.
    pub parent_id: Option<AccountId>,
    /// Whether the account only aggregates its children.
    pub is_control_account: bool,
}

/// Account repository for chart of accounts operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_by_id(&self, id: AccountId) -> Result<Option<Account>, AccountError> {
        let model = accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(account_from_model))
    }

    /// Finds an account by its code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Account>, AccountError> {
        let model = accounts::Entity::find()
            .filter(accounts::Column::Code.eq(code))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(model.map(account_from_model))
    }

    /// Loads every existing account among `ids`, keyed by ID.
    ///
    /// Unknown IDs are simply absent from the map.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_ids(
        &self,
        ids: &[AccountId],
    ) -> Result<HashMap<AccountId, Account>, AccountError> {
        find_accounts(&self.db, ids, false).await.map_err(db_err)
    }

    /// Returns true if any active account has `id` as its parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn exists_active_children(&self, id: AccountId) -> Result<bool, AccountError> {
        active_children_exist(&self.db, id).await.map_err(db_err)
    }

    /// Returns true if any entry that has been posted touches the account.
    ///
    /// Voided and reversed entries were posted first, so they count too.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn has_posted_transactions(&self, id: AccountId) -> Result<bool, AccountError> {
        posted_activity_exists(&self.db, id).await.map_err(db_err)
    }

    /// Creates a new account.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The code is blank or does not carry the prefix of its type
    /// - The code already exists
    /// - The parent account does not exist
    pub async fn create_account(&self, input: CreateAccountInput) -> Result<Account, AccountError> {
        let mut account = Account::new(input.code.trim(), input.name.trim(), input.account_type);
        account.parent_id = input.parent_id;
        account.is_control_account = input.is_control_account;
        account.validate()?;

        if self.get_by_code(&account.code).await?.is_some() {
            return Err(AccountError::DuplicateCode(account.code));
        }

        if let Some(parent_id) = account.parent_id {
            if self.get_by_id(parent_id).await?.is_none() {
                return Err(AccountError::ParentNotFound(parent_id));
            }
        }

        let now = Utc::now().into();
        let model = accounts::ActiveModel {
            id: Set(account.id.into_inner()),
            code: Set(account.code.clone()),
            name: Set(account.name.clone()),
            account_type: Set(account_type_to_db(account.account_type)),
            is_active: Set(true),
            parent_id: Set(account.parent_id.map(AccountId::into_inner)),
            is_control_account: Set(account.is_control_account),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AccountError::DuplicateCode(account.code.clone())
            }
            _ => db_err(e),
        })?;

        info!(account_id = %model.id, code = %model.code, "Account created");
        Ok(account_from_model(model))
    }

    /// Deactivates an account.
    ///
    /// The account row is locked before the checks run, so a concurrent post
    /// either commits first and is seen by the check, or waits and then finds
    /// the account inactive.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The account does not exist or is already inactive
    /// - The account has posted transactions
    /// - The account still has active children
    pub async fn deactivate_account(&self, id: AccountId) -> Result<Account, AccountError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let model = accounts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        let account = account_from_model(model.clone());
        let has_posted = posted_activity_exists(&txn, id).await.map_err(db_err)?;
        let has_children = active_children_exist(&txn, id).await.map_err(db_err)?;
        account.check_deactivation(has_posted, has_children)?;

        let mut active: accounts::ActiveModel = model.into();
        active.is_active = Set(false);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        info!(account_id = %id, code = %updated.code, "Account deactivated");
        Ok(account_from_model(updated))
    }
}

async fn active_children_exist<C: ConnectionTrait>(conn: &C, id: AccountId) -> Result<bool, DbErr> {
    let count = accounts::Entity::find()
        .filter(accounts::Column::ParentId.eq(id.into_inner()))
        .filter(accounts::Column::IsActive.eq(true))
        .count(conn)
        .await?;
    Ok(count > 0)
}

async fn posted_activity_exists<C: ConnectionTrait>(conn: &C, id: AccountId) -> Result<bool, DbErr> {
    let count = journal_lines::Entity::find()
        .join(JoinType::InnerJoin, journal_lines::Relation::JournalEntries.def())
        .filter(journal_lines::Column::AccountId.eq(id.into_inner()))
        .filter(journal_entries::Column::Status.ne(JournalStatus::Draft))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Loads accounts by ID on any connection, optionally holding a share lock so
/// they cannot be deactivated until the surrounding transaction ends.
pub(crate) async fn find_accounts<C: ConnectionTrait>(
    conn: &C,
    ids: &[AccountId],
    lock: bool,
) -> Result<HashMap<AccountId, Account>, DbErr> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(|id| id.into_inner()).collect();
    let mut query = accounts::Entity::find().filter(accounts::Column::Id.is_in(uuids));
    if lock {
        query = query.lock_shared();
    }
    let models = query.all(conn).await?;
    Ok(models
        .into_iter()
        .map(account_from_model)
        .map(|account| (account.id, account))
        .collect())
}

#[allow(clippy::needless_pass_by_value)]
fn db_err(e: DbErr) -> AccountError {
    AccountError::Database(e.to_string())
}
