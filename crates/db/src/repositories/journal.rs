//! Journal repository: the transactional coordinator for journal entries.
//!
//! Every mutating operation runs in one database transaction. Headers are
//! locked with `SELECT ... FOR UPDATE` before a state change, entry numbers
//! come from a per-(organization, day) counter row, and the domain rules in
//! `ledgerbook_core::journal` decide every transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use ledgerbook_core::journal::{
    Clock, EntryNumber, EntryStatus, JournalEntry, JournalError, PostingIssue, PostingPolicy,
    PostingValidator, SystemClock,
};
use ledgerbook_shared::LedgerConfig;
use ledgerbook_shared::types::{
    AccountId, JournalEntryId, OrganizationId, PageRequest, PageResponse, UserId,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, Statement, TransactionTrait,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::entities::{journal_entries, journal_lines};

use super::account::find_accounts;
use super::db_error::{ENTRY_NUMBER_CONSTRAINT, is_transient, violates_unique};
use super::mapping::{entry_from_models, entry_to_active, line_to_active, status_to_db};

const NEXT_SEQUENCE_SQL: &str = r"
INSERT INTO journal_entry_sequences (organization_id, entry_date, last_value, updated_at)
VALUES ($1, $2, 1, now())
ON CONFLICT (organization_id, entry_date)
DO UPDATE SET last_value = journal_entry_sequences.last_value + 1, updated_at = now()
RETURNING last_value
";

#[derive(Debug, FromQueryResult)]
struct SequenceRow {
    last_value: i32,
}

/// Filter options for listing journal entries.
#[derive(Debug, Clone, Default)]
pub struct JournalFilter {
    /// Only entries in this status.
    pub status: Option<EntryStatus>,
    /// Only entries dated on or after this day.
    pub date_from: Option<NaiveDate>,
    /// Only entries dated on or before this day.
    pub date_to: Option<NaiveDate>,
}

/// Result of a successful post.
#[derive(Debug, Clone)]
pub struct PostedEntry {
    /// The entry, now POSTED.
    pub entry: JournalEntry,
    /// Non-blocking findings of posting validation.
    pub warnings: Vec<PostingIssue>,
}

/// Result of a reversal.
#[derive(Debug, Clone)]
pub struct ReversalResult {
    /// The original entry, now REVERSED.
    pub original: JournalEntry,
    /// The new reversing draft.
    pub reversal: JournalEntry,
}

/// Journal repository coordinating entry persistence and state transitions.
#[derive(Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
    validator: PostingValidator,
    max_retries: u32,
}

impl JournalRepository {
    /// Creates a repository with the wall clock and default ledger settings.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_config(db, Arc::new(SystemClock), &LedgerConfig::default())
    }

    /// Creates a repository with an explicit clock and ledger settings.
    #[must_use]
    pub fn with_config(db: DatabaseConnection, clock: Arc<dyn Clock>, config: &LedgerConfig) -> Self {
        Self {
            db,
            clock,
            validator: PostingValidator::new(PostingPolicy::from(config)),
            max_retries: config.numbering_max_retries.max(1),
        }
    }

    /// Stores a new draft, assigning its entry number.
    ///
    /// The draft must pass structural validation, balance included.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry is not a draft
    /// - The entry fails validation
    /// - No unique entry number could be assigned
    /// - Database operation fails
    pub async fn create_entry(
        &self,
        draft: JournalEntry,
        created_by: UserId,
    ) -> Result<JournalEntry, JournalError> {
        if !draft.can_edit() {
            return Err(JournalError::CannotEdit {
                status: draft.status,
            });
        }

        let now = self.clock.now();
        let mut draft = draft;
        draft.created_by = created_by;
        draft.created_at = now;
        draft.updated_at = now;
        draft.version = 1;

        let txn = self.db.begin().await.map_err(db_err)?;
        let date = draft.transaction_date;
        let organization_id = draft.organization_id;
        let entry = self
            .insert_numbered(&txn, organization_id, date, now, |number| {
                let mut entry = draft.clone();
                entry.assign_entry_number(number)?;
                Ok(entry)
            })
            .await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            org_id = %entry.organization_id,
            entry_id = %entry.id,
            entry_number = %number_of(&entry),
            "Journal entry created"
        );
        Ok(entry)
    }

    /// Replaces the header and lines of a stored draft.
    ///
    /// `entry.version` must match the stored version. The entry number,
    /// status, creator and every audit field are kept as stored.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry is not found
    /// - The stored entry is not a draft
    /// - The stored version differs (concurrent modification)
    /// - The entry fails validation
    /// - Database operation fails
    pub async fn update_entry(&self, entry: JournalEntry) -> Result<JournalEntry, JournalError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let stored = lock_entry(&txn, entry.organization_id, entry.id).await?;

        if !stored.can_edit() {
            return Err(JournalError::CannotEdit {
                status: stored.status,
            });
        }
        if stored.version != entry.version {
            return Err(JournalError::ConcurrentModification {
                entry_id: entry.id,
                expected: entry.version,
                actual: stored.version,
            });
        }

        let now = self.clock.now();
        let mut entry = entry;
        entry.entry_number = stored.entry_number;
        entry.status = stored.status;
        entry.created_by = stored.created_by;
        entry.created_at = stored.created_at;
        entry.posting_date = stored.posting_date;
        entry.posted_by = stored.posted_by;
        entry.voided_by = stored.voided_by;
        entry.voided_at = stored.voided_at;
        entry.reversed_by = stored.reversed_by;
        entry.reversed_at = stored.reversed_at;
        entry.reversal_of = stored.reversal_of;
        entry.reversed_by_entry = stored.reversed_by_entry;
        entry.version = stored.version + 1;
        entry.updated_at = now;
        entry.validate()?;

        entry_to_active(&entry)?
            .update(&txn)
            .await
            .map_err(db_err)?;
        journal_lines::Entity::delete_many()
            .filter(journal_lines::Column::JournalEntryId.eq(entry.id.into_inner()))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        insert_lines(&txn, &entry, now).await.map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        info!(
            org_id = %entry.organization_id,
            entry_id = %entry.id,
            version = entry.version,
            "Journal entry updated"
        );
        Ok(entry)
    }

    /// Deletes a draft and its lines.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry is not found
    /// - The entry is not a draft
    /// - The draft reverses another entry
    /// - Database operation fails
    pub async fn delete_draft(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
    ) -> Result<(), JournalError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let stored = lock_entry(&txn, organization_id, entry_id).await?;

        if !stored.can_edit() {
            return Err(JournalError::CannotEdit {
                status: stored.status,
            });
        }
        if stored.reversal_of.is_some() {
            return Err(JournalError::CannotDeleteReversal(entry_id));
        }

        journal_entries::Entity::delete_by_id(entry_id.into_inner())
            .exec(&txn)
            .await
            .map_err(db_err)?;
        txn.commit().await.map_err(db_err)?;

        info!(org_id = %organization_id, entry_id = %entry_id, "Journal entry deleted");
        Ok(())
    }

    /// Posts a draft after validating it against the chart of accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry is not found
    /// - The entry is not a draft
    /// - Posting validation finds blocking issues
    /// - Database operation fails
    pub async fn post_entry(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
        posted_by: UserId,
    ) -> Result<PostedEntry, JournalError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let mut entry = lock_entry(&txn, organization_id, entry_id).await?;

        if entry.status != EntryStatus::Draft {
            return Err(JournalError::CannotPost {
                status: entry.status,
            });
        }

        let account_ids = referenced_accounts(&entry);
        let accounts = find_accounts(&txn, &account_ids, true)
            .await
            .map_err(db_err)?;

        let now = self.clock.now();
        let warnings = self
            .validator
            .validate(&entry, &accounts, now)
            .into_result()
            .inspect_err(|err| {
                warn!(
                    org_id = %organization_id,
                    entry_id = %entry_id,
                    error = %err,
                    "Journal entry posting rejected"
                );
            })?;

        entry.post(posted_by, now)?;
        entry.version += 1;
        save_header(&txn, &entry).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            org_id = %organization_id,
            entry_id = %entry_id,
            entry_number = %number_of(&entry),
            warnings = warnings.len(),
            "Journal entry posted"
        );
        Ok(PostedEntry { entry, warnings })
    }

    /// Voids a posted entry.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry is not found
    /// - The entry is not posted
    /// - Database operation fails
    pub async fn void_entry(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
        voided_by: UserId,
    ) -> Result<JournalEntry, JournalError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let mut entry = lock_entry(&txn, organization_id, entry_id).await?;

        entry.void(voided_by, self.clock.now())?;
        entry.version += 1;
        save_header(&txn, &entry).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            org_id = %organization_id,
            entry_id = %entry_id,
            entry_number = %number_of(&entry),
            "Journal entry voided"
        );
        Ok(entry)
    }

    /// Reverses a posted entry.
    ///
    /// Inserts a reversing draft dated today, numbered for today, and marks
    /// the original REVERSED, all in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The entry is not found
    /// - The entry is not posted
    /// - No unique entry number could be assigned
    /// - Database operation fails
    pub async fn reverse_entry(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
        reversed_by: UserId,
    ) -> Result<ReversalResult, JournalError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let mut original = lock_entry(&txn, organization_id, entry_id).await?;

        if !original.can_reverse() {
            return Err(JournalError::CannotReverse {
                status: original.status,
            });
        }

        let now = self.clock.now();
        let reversal = self
            .insert_numbered(&txn, organization_id, now.date_naive(), now, |number| {
                original.create_reversal(reversed_by, number, now)
            })
            .await?;

        original.mark_reversed(reversed_by, reversal.id, now)?;
        original.version += 1;
        save_header(&txn, &original).await?;
        txn.commit().await.map_err(db_err)?;

        info!(
            org_id = %organization_id,
            entry_id = %entry_id,
            reversal_id = %reversal.id,
            reversal_number = %number_of(&reversal),
            "Journal entry reversed"
        );
        Ok(ReversalResult { original, reversal })
    }

    /// Gets an entry with its lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is not found or the query fails.
    pub async fn get_entry(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
    ) -> Result<JournalEntry, JournalError> {
        let header = journal_entries::Entity::find_by_id(entry_id.into_inner())
            .filter(journal_entries::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .ok_or(JournalError::EntryNotFound(entry_id))?;
        let lines = load_lines(&self.db, header.id).await.map_err(db_err)?;
        entry_from_models(header, lines)
    }

    /// Lists entries of an organization, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_entries(
        &self,
        organization_id: OrganizationId,
        filter: &JournalFilter,
        page: PageRequest,
    ) -> Result<PageResponse<JournalEntry>, JournalError> {
        let mut query = journal_entries::Entity::find()
            .filter(journal_entries::Column::OrganizationId.eq(organization_id.into_inner()));
        if let Some(status) = filter.status {
            query = query.filter(journal_entries::Column::Status.eq(status_to_db(status)));
        }
        if let Some(date_from) = filter.date_from {
            query = query.filter(journal_entries::Column::TransactionDate.gte(date_from));
        }
        if let Some(date_to) = filter.date_to {
            query = query.filter(journal_entries::Column::TransactionDate.lte(date_to));
        }

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let headers = query
            .order_by_desc(journal_entries::Column::TransactionDate)
            .order_by_desc(journal_entries::Column::EntryNumber)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let ids: Vec<Uuid> = headers.iter().map(|h| h.id).collect();
        let mut lines_by_entry: HashMap<Uuid, Vec<journal_lines::Model>> = HashMap::new();
        if !ids.is_empty() {
            let lines = journal_lines::Entity::find()
                .filter(journal_lines::Column::JournalEntryId.is_in(ids))
                .all(&self.db)
                .await
                .map_err(db_err)?;
            for line in lines {
                lines_by_entry
                    .entry(line.journal_entry_id)
                    .or_default()
                    .push(line);
            }
        }

        let entries = headers
            .into_iter()
            .map(|header| {
                let lines = lines_by_entry.remove(&header.id).unwrap_or_default();
                entry_from_models(header, lines)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageResponse::new(entries, page, total))
    }

    /// Issues the next sequence for `(organization_id, date)` in its own
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn next_sequence(
        &self,
        organization_id: OrganizationId,
        date: NaiveDate,
    ) -> Result<u32, JournalError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let sequence = next_sequence_in(&txn, organization_id, date).await?;
        txn.commit().await.map_err(db_err)?;
        Ok(sequence)
    }

    /// Numbers and inserts an entry built by `build`, retrying on entry
    /// number collisions.
    ///
    /// Each attempt runs inside a savepoint so a collision leaves the outer
    /// transaction usable. Only a violation of the entry-number constraint
    /// counts as a collision; any other failure ends the operation.
    async fn insert_numbered<F>(
        &self,
        txn: &DatabaseTransaction,
        organization_id: OrganizationId,
        date: NaiveDate,
        now: DateTime<Utc>,
        mut build: F,
    ) -> Result<JournalEntry, JournalError>
    where
        F: FnMut(EntryNumber) -> Result<JournalEntry, JournalError>,
    {
        for attempt in 1..=self.max_retries {
            let sequence = next_sequence_in(txn, organization_id, date).await?;
            let number = EntryNumber::new(date, sequence)?;
            debug!(org_id = %organization_id, entry_number = %number, attempt, "Entry number assigned");

            let entry = build(number)?;
            entry.validate()?;

            let savepoint = txn.begin().await.map_err(db_err)?;
            match insert_entry(&savepoint, &entry, now).await {
                Ok(()) => {
                    savepoint.commit().await.map_err(db_err)?;
                    return Ok(entry);
                }
                Err(err) if violates_unique(&err, ENTRY_NUMBER_CONSTRAINT) => {
                    savepoint.rollback().await.map_err(db_err)?;
                    warn!(
                        org_id = %organization_id,
                        entry_number = %number,
                        attempt,
                        "Entry number collision, retrying"
                    );
                }
                Err(err) => return Err(db_err(err)),
            }
        }

        Err(JournalError::NumberingConflict {
            attempts: self.max_retries,
        })
    }
}

/// Atomically increments and returns the counter for `(organization_id, date)`.
///
/// The counter row stays locked until the surrounding transaction ends.
async fn next_sequence_in<C: ConnectionTrait>(
    conn: &C,
    organization_id: OrganizationId,
    date: NaiveDate,
) -> Result<u32, JournalError> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        NEXT_SEQUENCE_SQL,
        [organization_id.into_inner().into(), date.into()],
    );
    let row = SequenceRow::find_by_statement(stmt)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| JournalError::Database("sequence upsert returned no row".to_string()))?;

    u32::try_from(row.last_value)
        .map_err(|_| JournalError::Database(format!("invalid sequence value {}", row.last_value)))
}

/// Loads and locks an entry header, then its lines.
async fn lock_entry(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    entry_id: JournalEntryId,
) -> Result<JournalEntry, JournalError> {
    let header = journal_entries::Entity::find_by_id(entry_id.into_inner())
        .filter(journal_entries::Column::OrganizationId.eq(organization_id.into_inner()))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(db_err)?
        .ok_or(JournalError::EntryNotFound(entry_id))?;
    let lines = load_lines(txn, header.id).await.map_err(db_err)?;
    entry_from_models(header, lines)
}

async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    entry_id: Uuid,
) -> Result<Vec<journal_lines::Model>, DbErr> {
    journal_lines::Entity::find()
        .filter(journal_lines::Column::JournalEntryId.eq(entry_id))
        .order_by_asc(journal_lines::Column::LineNumber)
        .all(conn)
        .await
}

async fn insert_entry<C: ConnectionTrait>(
    conn: &C,
    entry: &JournalEntry,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    let header = entry_to_active(entry).map_err(|e| DbErr::Custom(e.to_string()))?;
    header.insert(conn).await?;
    insert_lines(conn, entry, now).await
}

async fn insert_lines<C: ConnectionTrait>(
    conn: &C,
    entry: &JournalEntry,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    let lines = entry
        .lines()
        .iter()
        .map(|line| line_to_active(entry.id, line, now))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DbErr::Custom(e.to_string()))?;
    if lines.is_empty() {
        return Ok(());
    }
    journal_lines::Entity::insert_many(lines).exec(conn).await?;
    Ok(())
}

/// Writes the status, audit and version columns of a header.
async fn save_header(txn: &DatabaseTransaction, entry: &JournalEntry) -> Result<(), JournalError> {
    let totals = entry.totals();
    journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        status: Set(status_to_db(entry.status)),
        posting_date: Set(entry.posting_date.map(Into::into)),
        posted_by: Set(entry.posted_by.map(UserId::into_inner)),
        voided_by: Set(entry.voided_by.map(UserId::into_inner)),
        voided_at: Set(entry.voided_at.map(Into::into)),
        reversed_by: Set(entry.reversed_by.map(UserId::into_inner)),
        reversed_at: Set(entry.reversed_at.map(Into::into)),
        reversed_by_entry: Set(entry.reversed_by_entry.map(JournalEntryId::into_inner)),
        total_debit: Set(totals.debit),
        total_credit: Set(totals.credit),
        version: Set(entry.version),
        updated_at: Set(entry.updated_at.into()),
        ..Default::default()
    }
    .update(txn)
    .await
    .map_err(db_err)?;
    Ok(())
}

fn referenced_accounts(entry: &JournalEntry) -> Vec<AccountId> {
    let mut ids: Vec<AccountId> = entry.lines().iter().map(|line| line.account_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn number_of(entry: &JournalEntry) -> String {
    entry
        .entry_number
        .map(|n| n.to_string())
        .unwrap_or_default()
}

#[allow(clippy::needless_pass_by_value)]
fn db_err(e: DbErr) -> JournalError {
    if is_transient(&e) {
        JournalError::TransientDatabase(e.to_string())
    } else {
        JournalError::Database(e.to_string())
    }
}
