//! `SeaORM` Entity for journal_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::JournalStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub entry_number: String,
    pub transaction_date: Date,
    pub posting_date: Option<DateTimeWithTimeZone>,
    pub reference: Option<String>,
    pub description: String,
    pub status: JournalStatus,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_debit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_credit: Decimal,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub posted_by: Option<Uuid>,
    pub voided_by: Option<Uuid>,
    pub voided_at: Option<DateTimeWithTimeZone>,
    pub reversed_by: Option<Uuid>,
    pub reversed_at: Option<DateTimeWithTimeZone>,
    pub reversal_of: Option<Uuid>,
    pub reversed_by_entry: Option<Uuid>,
    pub version: i32,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_lines::Entity")]
    JournalLines,
}

impl Related<super::journal_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
