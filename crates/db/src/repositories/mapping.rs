//! Conversions between stored rows and journal domain types.

use chrono::{DateTime, Utc};
use ledgerbook_core::journal::{
    Account, AccountType as CoreAccountType, EntryNumber, EntryStatus, JournalEntry, JournalError,
    JournalLine,
};
use ledgerbook_shared::types::{AccountId, JournalEntryId, JournalLineId, OrganizationId, UserId};
use sea_orm::Set;
use sea_orm::prelude::DateTimeWithTimeZone;

use crate::entities::{
    accounts, journal_entries, journal_lines,
    sea_orm_active_enums::{AccountType, JournalStatus},
};

/// Converts a stored status to the domain status.
pub(crate) const fn status_to_core(status: JournalStatus) -> EntryStatus {
    match status {
        JournalStatus::Draft => EntryStatus::Draft,
        JournalStatus::Posted => EntryStatus::Posted,
        JournalStatus::Void => EntryStatus::Void,
        JournalStatus::Reversed => EntryStatus::Reversed,
    }
}

/// Converts a domain status to the stored status.
pub(crate) const fn status_to_db(status: EntryStatus) -> JournalStatus {
    match status {
        EntryStatus::Draft => JournalStatus::Draft,
        EntryStatus::Posted => JournalStatus::Posted,
        EntryStatus::Void => JournalStatus::Void,
        EntryStatus::Reversed => JournalStatus::Reversed,
    }
}

pub(crate) const fn account_type_to_core(account_type: AccountType) -> CoreAccountType {
    match account_type {
        AccountType::Asset => CoreAccountType::Asset,
        AccountType::Liability => CoreAccountType::Liability,
        AccountType::Equity => CoreAccountType::Equity,
        AccountType::Revenue => CoreAccountType::Revenue,
        AccountType::Expense => CoreAccountType::Expense,
    }
}

pub(crate) const fn account_type_to_db(account_type: CoreAccountType) -> AccountType {
    match account_type {
        CoreAccountType::Asset => AccountType::Asset,
        CoreAccountType::Liability => AccountType::Liability,
        CoreAccountType::Equity => AccountType::Equity,
        CoreAccountType::Revenue => AccountType::Revenue,
        CoreAccountType::Expense => AccountType::Expense,
    }
}

fn to_utc(ts: DateTimeWithTimeZone) -> DateTime<Utc> {
    ts.with_timezone(&Utc)
}

pub(crate) fn account_from_model(model: accounts::Model) -> Account {
    Account {
        id: AccountId::from(model.id),
        code: model.code,
        name: model.name,
        account_type: account_type_to_core(model.account_type),
        is_active: model.is_active,
        parent_id: model.parent_id.map(AccountId::from),
        is_control_account: model.is_control_account,
    }
}

pub(crate) fn line_from_model(model: journal_lines::Model) -> Result<JournalLine, JournalError> {
    let line_number = u32::try_from(model.line_number).map_err(|_| {
        JournalError::Database(format!(
            "journal line {} has invalid line number {}",
            model.id, model.line_number
        ))
    })?;

    Ok(JournalLine {
        id: JournalLineId::from(model.id),
        account_id: AccountId::from(model.account_id),
        line_number,
        description: model.description,
        reference: model.reference,
        debit: model.debit,
        credit: model.credit,
    })
}

/// Rebuilds a journal entry from its header row and line rows.
pub(crate) fn entry_from_models(
    header: journal_entries::Model,
    lines: Vec<journal_lines::Model>,
) -> Result<JournalEntry, JournalError> {
    let entry_number = EntryNumber::parse(&header.entry_number)?;
    let lines = lines
        .into_iter()
        .map(line_from_model)
        .collect::<Result<Vec<_>, _>>()?;

    let mut entry = JournalEntry::draft(
        OrganizationId::from(header.organization_id),
        header.transaction_date,
        header.description,
        UserId::from(header.created_by),
        to_utc(header.created_at),
    );
    entry.id = JournalEntryId::from(header.id);
    entry.entry_number = Some(entry_number);
    entry.posting_date = header.posting_date.map(to_utc);
    entry.reference = header.reference;
    entry.status = status_to_core(header.status);
    entry.posted_by = header.posted_by.map(UserId::from);
    entry.voided_by = header.voided_by.map(UserId::from);
    entry.voided_at = header.voided_at.map(to_utc);
    entry.reversed_by = header.reversed_by.map(UserId::from);
    entry.reversed_at = header.reversed_at.map(to_utc);
    entry.reversal_of = header.reversal_of.map(JournalEntryId::from);
    entry.reversed_by_entry = header.reversed_by_entry.map(JournalEntryId::from);
    entry.version = header.version;
    entry.updated_at = to_utc(header.updated_at);

    Ok(entry.with_stored_lines(lines))
}

/// Builds a fully-set header row for `entry`.
pub(crate) fn entry_to_active(
    entry: &JournalEntry,
) -> Result<journal_entries::ActiveModel, JournalError> {
    let entry_number = entry
        .entry_number
        .ok_or(JournalError::EntryNumberRequired)?;
    let totals = entry.totals();

    Ok(journal_entries::ActiveModel {
        id: Set(entry.id.into_inner()),
        organization_id: Set(entry.organization_id.into_inner()),
        entry_number: Set(entry_number.to_string()),
        transaction_date: Set(entry.transaction_date),
        posting_date: Set(entry.posting_date.map(Into::into)),
        reference: Set(entry.reference.clone()),
        description: Set(entry.description.clone()),
        status: Set(status_to_db(entry.status)),
        total_debit: Set(totals.debit),
        total_credit: Set(totals.credit),
        created_by: Set(entry.created_by.into_inner()),
        created_at: Set(entry.created_at.into()),
        posted_by: Set(entry.posted_by.map(UserId::into_inner)),
        voided_by: Set(entry.voided_by.map(UserId::into_inner)),
        voided_at: Set(entry.voided_at.map(Into::into)),
        reversed_by: Set(entry.reversed_by.map(UserId::into_inner)),
        reversed_at: Set(entry.reversed_at.map(Into::into)),
        reversal_of: Set(entry.reversal_of.map(JournalEntryId::into_inner)),
        reversed_by_entry: Set(entry.reversed_by_entry.map(JournalEntryId::into_inner)),
        version: Set(entry.version),
        updated_at: Set(entry.updated_at.into()),
    })
}

/// Builds a line row belonging to `entry_id`.
pub(crate) fn line_to_active(
    entry_id: JournalEntryId,
    line: &JournalLine,
    now: DateTime<Utc>,
) -> Result<journal_lines::ActiveModel, JournalError> {
    let line_number = i32::try_from(line.line_number).map_err(|_| {
        JournalError::Database(format!("line number {} does not fit storage", line.line_number))
    })?;

    Ok(journal_lines::ActiveModel {
        id: Set(line.id.into_inner()),
        journal_entry_id: Set(entry_id.into_inner()),
        account_id: Set(line.account_id.into_inner()),
        line_number: Set(line_number),
        description: Set(line.description.clone()),
        reference: Set(line.reference.clone()),
        debit: Set(line.debit),
        credit: Set(line.credit),
        created_at: Set(now.into()),
    })
}
