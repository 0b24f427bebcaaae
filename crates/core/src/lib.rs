//! Core business logic for Ledgerbook.
//!
//! This crate contains pure journal logic with ZERO web or database dependencies.
//! All domain types, validation rules, and state transitions live here.
//!
//! # Modules
//!
//! - `journal` - Journal entries, posting validation and entry numbering

pub mod journal;
