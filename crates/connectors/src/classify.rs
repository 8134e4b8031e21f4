use model::core::db::DatabaseType;

/// What the worker should do with a database error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Contention (deadlock, lock timeout, serialization failure):
    /// re-attempt the same transaction.
    Retry,
    /// Cancellation or an empty result set: discard this transaction
    /// and move on to a different one.
    RetryDifferent,
    /// Environmental failure (OOM, internal error): propagate.
    Fatal,
    /// Not in the table. Treated as a retry so benchmarks keep running
    /// through driver quirks; callers log these at warn.
    UnknownRetry,
}

/// Map a (dialect, vendor code, SQLSTATE) triple onto an action.
///
/// Pure and data-driven so the table can be tested in isolation. A
/// missing SQLSTATE means the driver could not say what happened.
pub fn classify(db: DatabaseType, error_code: i32, sql_state: Option<&str>) -> ErrorAction {
    let Some(state) = sql_state else {
        return ErrorAction::UnknownRetry;
    };

    if db.is_mysql_family() {
        return match (error_code, state) {
            // ER_LOCK_DEADLOCK
            (1213, "40001") => ErrorAction::Retry,
            // ER_LOCK_WAIT_TIMEOUT
            (1205, "41000") => ErrorAction::Retry,
            _ => classify_common(error_code, state),
        };
    }

    match db {
        DatabaseType::SqlServer => match (error_code, state) {
            (1205, "40001") => ErrorAction::Retry,
            _ => classify_common(error_code, state),
        },
        DatabaseType::Postgres => match (error_code, state) {
            (0, "40001") => ErrorAction::Retry,
            (0, "53200") => ErrorAction::Fatal,
            (0, "XX000") => ErrorAction::Fatal,
            _ => classify_common(error_code, state),
        },
        DatabaseType::CockroachDb => match (error_code, state) {
            (0, "40001") => ErrorAction::Retry,
            _ => classify_common(error_code, state),
        },
        DatabaseType::Oracle => match (error_code, state) {
            (8177, "72000") => ErrorAction::Retry,
            _ => classify_common(error_code, state),
        },
        DatabaseType::Db2 => match (error_code, state) {
            (-911, "40001") => ErrorAction::Retry,
            (0 | -952, "57014") => ErrorAction::RetryDifferent,
            _ => classify_common(error_code, state),
        },
        // MySql/MariaDb handled above.
        DatabaseType::MySql | DatabaseType::MariaDb => classify_common(error_code, state),
    }
}

/// Dialect-independent rows of the table.
fn classify_common(error_code: i32, state: &str) -> ErrorAction {
    match (error_code, state) {
        // No result set.
        (0, "02000") => ErrorAction::RetryDifferent,
        // Statement cancelled server-side, usually by the driver's own
        // cancelStatement during a state advance.
        (_, "57014") => ErrorAction::RetryDifferent,
        _ => ErrorAction::UnknownRetry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::core::db::DatabaseType::*;

    #[test]
    fn missing_sqlstate_is_unknown_retry() {
        for db in [MySql, Postgres, Oracle, Db2] {
            assert_eq!(classify(db, 1213, None), ErrorAction::UnknownRetry);
        }
    }

    #[test]
    fn mysql_family_contention() {
        for db in [MySql, MariaDb] {
            assert_eq!(classify(db, 1213, Some("40001")), ErrorAction::Retry);
            assert_eq!(classify(db, 1205, Some("41000")), ErrorAction::Retry);
        }
        // SQL Server uses the same vendor code with a different state.
        assert_eq!(classify(SqlServer, 1205, Some("40001")), ErrorAction::Retry);
    }

    #[test]
    fn postgres_family_serialization_failure() {
        assert_eq!(classify(Postgres, 0, Some("40001")), ErrorAction::Retry);
        assert_eq!(classify(CockroachDb, 0, Some("40001")), ErrorAction::Retry);
    }

    #[test]
    fn postgres_environmental_failures_are_fatal() {
        assert_eq!(classify(Postgres, 0, Some("53200")), ErrorAction::Fatal);
        assert_eq!(classify(Postgres, 0, Some("XX000")), ErrorAction::Fatal);
        // Not promoted to the rest of the family.
        assert_eq!(
            classify(CockroachDb, 0, Some("53200")),
            ErrorAction::UnknownRetry
        );
    }

    #[test]
    fn oracle_serialization() {
        assert_eq!(classify(Oracle, 8177, Some("72000")), ErrorAction::Retry);
    }

    #[test]
    fn db2_rows() {
        assert_eq!(classify(Db2, -911, Some("40001")), ErrorAction::Retry);
        assert_eq!(
            classify(Db2, 0, Some("57014")),
            ErrorAction::RetryDifferent
        );
        assert_eq!(
            classify(Db2, -952, Some("57014")),
            ErrorAction::RetryDifferent
        );
    }

    #[test]
    fn cancellation_is_retry_different_everywhere() {
        for db in [MySql, MariaDb, Postgres, CockroachDb, SqlServer, Oracle] {
            assert_eq!(
                classify(db, 0, Some("57014")),
                ErrorAction::RetryDifferent,
                "{db}"
            );
        }
    }

    #[test]
    fn no_result_set_is_retry_different_everywhere() {
        for db in [MySql, Postgres, SqlServer, Oracle, Db2] {
            assert_eq!(
                classify(db, 0, Some("02000")),
                ErrorAction::RetryDifferent,
                "{db}"
            );
        }
    }

    #[test]
    fn everything_else_is_unknown_retry() {
        assert_eq!(
            classify(MySql, 1062, Some("23000")),
            ErrorAction::UnknownRetry
        );
        assert_eq!(
            classify(Postgres, 0, Some("23505")),
            ErrorAction::UnknownRetry
        );
        assert_eq!(
            classify(Oracle, 60, Some("61000")),
            ErrorAction::UnknownRetry
        );
    }
}
