//! `SeaORM` active enums mirroring the PostgreSQL enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_type")]
pub enum AccountType {
    #[sea_orm(string_value = "ASSET")]
    Asset,
    #[sea_orm(string_value = "LIABILITY")]
    Liability,
    #[sea_orm(string_value = "EQUITY")]
    Equity,
    #[sea_orm(string_value = "REVENUE")]
    Revenue,
    #[sea_orm(string_value = "EXPENSE")]
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "journal_status")]
pub enum JournalStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "POSTED")]
    Posted,
    #[sea_orm(string_value = "VOID")]
    Void,
    #[sea_orm(string_value = "REVERSED")]
    Reversed,
}
