//! Classification of database errors raised inside repository transactions.

use sea_orm::{DbErr, RuntimeErr};
use sqlx::error::DatabaseError;

/// Unique constraint on `(organization_id, entry_number)`.
pub(crate) const ENTRY_NUMBER_CONSTRAINT: &str = "uq_journal_entry_number";

/// SQLSTATE codes worth retrying: serialization failure and deadlock.
const TRANSIENT_SQLSTATES: [&str; 2] = ["40001", "40P01"];

/// SQLSTATE for unique violations.
const UNIQUE_VIOLATION: &str = "23505";

fn sqlx_error(err: &DbErr) -> Option<&sqlx::Error> {
    match err {
        DbErr::Conn(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Query(RuntimeErr::SqlxError(e)) => Some(e),
        _ => None,
    }
}

fn database_error(err: &DbErr) -> Option<&dyn DatabaseError> {
    match sqlx_error(err)? {
        sqlx::Error::Database(e) => Some(&**e),
        _ => None,
    }
}

/// Returns true if the error may clear when the whole operation is retried.
pub(crate) fn is_transient(err: &DbErr) -> bool {
    if matches!(err, DbErr::Conn(_) | DbErr::ConnectionAcquire(_)) {
        return true;
    }
    if let Some(db) = database_error(err) {
        return db
            .code()
            .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&&*code));
    }
    matches!(
        sqlx_error(err),
        Some(sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed)
    )
}

/// Returns true if the error is a unique violation of `constraint`.
pub(crate) fn violates_unique(err: &DbErr, constraint: &str) -> bool {
    database_error(err).is_some_and(|db| {
        db.code().as_deref() == Some(UNIQUE_VIOLATION) && db.constraint() == Some(constraint)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::error::ConnAcquireErr;

    #[test]
    fn test_connection_failures_are_transient() {
        assert!(is_transient(&DbErr::Conn(RuntimeErr::Internal(
            "connection reset".to_string()
        ))));
        assert!(is_transient(&DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)));
        assert!(is_transient(&DbErr::Query(RuntimeErr::SqlxError(
            sqlx::Error::PoolTimedOut
        ))));
    }

    #[test]
    fn test_logic_errors_are_not_transient() {
        assert!(!is_transient(&DbErr::Custom("boom".to_string())));
        assert!(!is_transient(&DbErr::RecordNotUpdated));
        assert!(!is_transient(&DbErr::Query(RuntimeErr::Internal(
            "syntax error".to_string()
        ))));
        assert!(!is_transient(&DbErr::Exec(RuntimeErr::SqlxError(
            sqlx::Error::RowNotFound
        ))));
    }

    #[test]
    fn test_unique_violation_needs_a_database_error() {
        assert!(!violates_unique(
            &DbErr::Custom("duplicate key".to_string()),
            ENTRY_NUMBER_CONSTRAINT
        ));
        assert!(!violates_unique(&DbErr::RecordNotInserted, ENTRY_NUMBER_CONSTRAINT));
    }
}
