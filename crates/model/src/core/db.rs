use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The DBMS dialects the harness knows how to classify errors for.
///
/// Only MySQL-family and Postgres-family databases have a driver in
/// this workspace; the remaining dialects exist so the error
/// classifier can cover them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    MySql,
    MariaDb,
    Postgres,
    CockroachDb,
    SqlServer,
    Oracle,
    Db2,
}

impl DatabaseType {
    /// Whether transactions should be managed explicitly for this DBMS.
    pub fn supports_transactions(self) -> bool {
        // All supported dialects are transactional; the gate stays so a
        // non-transactional engine can be added without touching the
        // worker loop.
        true
    }

    /// MySQL and MariaDB share a wire protocol and error space.
    pub fn is_mysql_family(self) -> bool {
        matches!(self, DatabaseType::MySql | DatabaseType::MariaDb)
    }

    /// Postgres and CockroachDB share the Postgres wire protocol.
    pub fn is_postgres_family(self) -> bool {
        matches!(self, DatabaseType::Postgres | DatabaseType::CockroachDb)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatabaseType::MySql => "mysql",
            DatabaseType::MariaDb => "mariadb",
            DatabaseType::Postgres => "postgres",
            DatabaseType::CockroachDb => "cockroachdb",
            DatabaseType::SqlServer => "sqlserver",
            DatabaseType::Oracle => "oracle",
            DatabaseType::Db2 => "db2",
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(DatabaseType::MySql),
            "mariadb" => Ok(DatabaseType::MariaDb),
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::Postgres),
            "cockroachdb" | "cockroach" => Ok(DatabaseType::CockroachDb),
            "sqlserver" | "mssql" => Ok(DatabaseType::SqlServer),
            "oracle" => Ok(DatabaseType::Oracle),
            "db2" => Ok(DatabaseType::Db2),
            other => Err(format!("unknown database type: {other}")),
        }
    }
}

/// Transaction isolation level applied to every worker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    Serializable,
    RepeatableRead,
    ReadCommitted,
    ReadUncommitted,
}

impl IsolationLevel {
    /// The level as it appears in `SET TRANSACTION ISOLATION LEVEL …`.
    pub fn sql_name(self) -> &'static str {
        match self {
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_aliases() {
        assert_eq!("pg".parse::<DatabaseType>(), Ok(DatabaseType::Postgres));
        assert_eq!(
            "cockroach".parse::<DatabaseType>(),
            Ok(DatabaseType::CockroachDb)
        );
        assert!("dbase".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn families() {
        assert!(DatabaseType::MariaDb.is_mysql_family());
        assert!(DatabaseType::CockroachDb.is_postgres_family());
        assert!(!DatabaseType::Oracle.is_postgres_family());
    }
}
