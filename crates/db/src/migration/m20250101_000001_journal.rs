//! Journal schema migration.
//!
//! Creates the chart of accounts, journal entries and lines, the per-day
//! entry-number counters, and the triggers that keep posted entries immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: CHART OF ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_LINES_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRY_SEQUENCES_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM (
    'ASSET',
    'LIABILITY',
    'EQUITY',
    'REVENUE',
    'EXPENSE'
);

CREATE TYPE journal_status AS ENUM (
    'DRAFT',
    'POSTED',
    'VOID',
    'REVERSED'
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code VARCHAR(20) NOT NULL UNIQUE,
    name VARCHAR(255) NOT NULL,
    account_type account_type NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    parent_id UUID REFERENCES accounts(id),
    is_control_account BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_code_prefix CHECK (
        (account_type = 'ASSET' AND code LIKE 'AST-_%') OR
        (account_type = 'LIABILITY' AND code LIKE 'LIA-_%') OR
        (account_type = 'EQUITY' AND code LIKE 'EQU-_%') OR
        (account_type = 'REVENUE' AND code LIKE 'REV-_%') OR
        (account_type = 'EXPENSE' AND code LIKE 'EXP-_%')
    )
);

CREATE INDEX idx_accounts_type ON accounts(account_type);
CREATE INDEX idx_accounts_parent ON accounts(parent_id) WHERE parent_id IS NOT NULL;
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    organization_id UUID NOT NULL,
    entry_number VARCHAR(16) NOT NULL,
    transaction_date DATE NOT NULL,
    posting_date TIMESTAMPTZ,
    reference VARCHAR(100),
    description VARCHAR(500) NOT NULL,
    status journal_status NOT NULL DEFAULT 'DRAFT',
    total_debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    total_credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    posted_by UUID,
    voided_by UUID,
    voided_at TIMESTAMPTZ,
    reversed_by UUID,
    reversed_at TIMESTAMPTZ,
    reversal_of UUID REFERENCES journal_entries(id),
    reversed_by_entry UUID REFERENCES journal_entries(id),
    version INTEGER NOT NULL DEFAULT 1,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_journal_entry_number UNIQUE (organization_id, entry_number),
    CONSTRAINT chk_entry_number_format CHECK (entry_number ~ '^JE-[0-9]{8}-[0-9]{4}$'),
    CONSTRAINT chk_totals_balanced CHECK (total_debit = total_credit),
    CONSTRAINT chk_posted_has_poster CHECK (
        status = 'DRAFT' OR (posting_date IS NOT NULL AND posted_by IS NOT NULL)
    )
);

CREATE INDEX idx_je_org_date ON journal_entries(organization_id, transaction_date);
CREATE INDEX idx_je_org_status ON journal_entries(organization_id, status);
CREATE INDEX idx_je_reversal_of ON journal_entries(reversal_of) WHERE reversal_of IS NOT NULL;
";

const JOURNAL_LINES_SQL: &str = r"
CREATE TABLE journal_lines (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    journal_entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    account_id UUID NOT NULL REFERENCES accounts(id),
    line_number INTEGER NOT NULL,
    description VARCHAR(255) NOT NULL,
    reference VARCHAR(100) NOT NULL DEFAULT '',
    debit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    credit NUMERIC(19, 4) NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_journal_line_number UNIQUE (journal_entry_id, line_number),
    CONSTRAINT chk_line_number_positive CHECK (line_number > 0),
    CONSTRAINT chk_debit_or_credit CHECK (
        (debit > 0 AND credit = 0) OR (debit = 0 AND credit > 0)
    )
);

CREATE INDEX idx_jl_entry ON journal_lines(journal_entry_id);
CREATE INDEX idx_jl_account ON journal_lines(account_id);
";

const JOURNAL_ENTRY_SEQUENCES_SQL: &str = r"
CREATE TABLE journal_entry_sequences (
    organization_id UUID NOT NULL,
    entry_date DATE NOT NULL,
    last_value INTEGER NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (organization_id, entry_date),
    CONSTRAINT chk_sequence_positive CHECK (last_value > 0)
);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_journal_balance
-- Ensures a non-draft entry's lines sum to its balanced totals
-- ============================================================
CREATE OR REPLACE FUNCTION check_journal_balance()
RETURNS TRIGGER AS $$
DECLARE
    line_debit NUMERIC(19, 4);
    line_credit NUMERIC(19, 4);
BEGIN
    IF NEW.status <> 'DRAFT' THEN
        SELECT
            COALESCE(SUM(debit), 0),
            COALESCE(SUM(credit), 0)
        INTO line_debit, line_credit
        FROM journal_lines
        WHERE journal_entry_id = NEW.id;

        IF line_debit <> line_credit
            OR line_debit <> NEW.total_debit
            OR line_credit <> NEW.total_credit THEN
            RAISE EXCEPTION 'Journal entry % is not balanced. Debit: %, Credit: %',
                NEW.entry_number, line_debit, line_credit;
        END IF;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_journal_balance
AFTER INSERT OR UPDATE ON journal_entries
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_journal_balance();

-- ============================================================
-- FUNCTION: prevent_journal_modification
-- Posted entries may only move to VOID or REVERSED; terminal
-- entries never change; only drafts may be deleted
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_journal_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        IF OLD.status <> 'DRAFT' THEN
            RAISE EXCEPTION 'Cannot delete journal entry in % status', OLD.status;
        END IF;
        RETURN OLD;
    END IF;

    IF OLD.status = 'POSTED' AND NEW.status NOT IN ('VOID', 'REVERSED') THEN
        RAISE EXCEPTION 'Cannot modify posted journal entry. Create a reversing entry instead.';
    END IF;

    IF OLD.status = 'POSTED' AND (
        NEW.entry_number <> OLD.entry_number
        OR NEW.transaction_date <> OLD.transaction_date
        OR NEW.description <> OLD.description
        OR NEW.total_debit <> OLD.total_debit
        OR NEW.total_credit <> OLD.total_credit
    ) THEN
        RAISE EXCEPTION 'Cannot modify posted journal entry content.';
    END IF;

    IF OLD.status IN ('VOID', 'REVERSED') THEN
        RAISE EXCEPTION 'Cannot modify journal entry in % status', OLD.status;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_journal_mod
BEFORE UPDATE OR DELETE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_journal_modification();

-- ============================================================
-- FUNCTION: prevent_line_modification
-- Lines change only while their entry is a draft
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_line_modification()
RETURNS TRIGGER AS $$
DECLARE
    entry_status journal_status;
BEGIN
    SELECT status INTO entry_status
    FROM journal_entries
    WHERE id = COALESCE(NEW.journal_entry_id, OLD.journal_entry_id);

    IF entry_status IS NOT NULL AND entry_status <> 'DRAFT' THEN
        RAISE EXCEPTION 'Cannot modify lines of journal entry in % status', entry_status;
    END IF;

    IF TG_OP = 'DELETE' THEN
        RETURN OLD;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_line_mod
BEFORE INSERT OR UPDATE OR DELETE ON journal_lines
FOR EACH ROW
EXECUTE FUNCTION prevent_line_modification();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_prevent_line_mod ON journal_lines;
DROP TRIGGER IF EXISTS trg_prevent_journal_mod ON journal_entries;
DROP TRIGGER IF EXISTS trg_check_journal_balance ON journal_entries;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_line_modification();
DROP FUNCTION IF EXISTS prevent_journal_modification();
DROP FUNCTION IF EXISTS check_journal_balance();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS journal_entry_sequences CASCADE;
DROP TABLE IF EXISTS journal_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;

-- Drop enums
DROP TYPE IF EXISTS journal_status CASCADE;
DROP TYPE IF EXISTS account_type CASCADE;
";
