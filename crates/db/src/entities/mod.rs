//! `SeaORM` entity definitions.

pub mod prelude;

pub mod accounts;
pub mod journal_entries;
pub mod journal_entry_sequences;
pub mod journal_lines;
pub mod sea_orm_active_enums;
