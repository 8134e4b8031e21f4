use crate::error::{ConnectorError, DbError};
use crate::mysql::MySqlConnection;
use crate::postgres::PgConnection;
use async_trait::async_trait;
use model::core::db::{DatabaseType, IsolationLevel};
use std::sync::Arc;
use tokio_postgres::NoTls;
use tracing::{debug, warn};

/// A nested transaction marker. The name is what goes into the
/// `SAVEPOINT` / `RELEASE SAVEPOINT` / `ROLLBACK TO SAVEPOINT` SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    /// Public so out-of-crate [`DbConnection`] implementations can mint
    /// savepoints too.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Generated name for an "unnamed" savepoint request.
    pub fn generated(seq: u64) -> Self {
        Self {
            name: format!("sp_{seq}"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Cancels the statement currently running on a connection, from
/// another task. Cancellation is cooperative at the statement boundary:
/// the server aborts the statement and the worker observes a
/// "cancelled" SQLSTATE on its next result.
#[derive(Clone)]
pub enum StatementCancel {
    /// Out-of-band cancel request on the Postgres wire protocol.
    Postgres(tokio_postgres::CancelToken),
    /// MySQL has no client-side cancel; issue `KILL QUERY <id>` from a
    /// short-lived side connection.
    MySql { url: Arc<str>, conn_id: u32 },
}

impl StatementCancel {
    pub async fn cancel(&self) -> Result<(), DbError> {
        match self {
            StatementCancel::Postgres(token) => {
                token.cancel_query(NoTls).await?;
                Ok(())
            }
            StatementCancel::MySql { url, conn_id } => {
                let mut side = mysql_async::Conn::from_url(url.as_ref()).await?;
                mysql_async::prelude::Queryable::query_drop(
                    &mut side,
                    format!("KILL QUERY {conn_id}"),
                )
                .await?;
                side.disconnect().await?;
                debug!(conn_id, "Killed in-flight MySQL query");
                Ok(())
            }
        }
    }
}

/// One live database connection with explicit transaction control.
///
/// Implementations keep standard relational semantics: exactly one
/// commit-or-rollback finishes an attempt, savepoints nest inside the
/// open transaction, and dropping the value releases the socket.
#[async_trait]
pub trait DbConnection: Send {
    /// Run a statement, returning the affected row count.
    async fn execute(&mut self, sql: &str) -> Result<u64, DbError>;

    /// Run a query, returning rows with values rendered as strings.
    async fn query(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, DbError>;

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DbError>;

    /// Last value passed to [`set_auto_commit`], `true` for a fresh
    /// connection.
    fn auto_commit(&self) -> bool;

    async fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), DbError>;

    /// Create a savepoint. `None` generates a name.
    async fn savepoint(&mut self, name: Option<&str>) -> Result<Savepoint, DbError>;

    async fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<(), DbError>;

    async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<(), DbError>;

    async fn rollback(&mut self) -> Result<(), DbError>;

    async fn commit(&mut self) -> Result<(), DbError>;

    async fn close(self: Box<Self>) -> Result<(), DbError>;

    /// Handle for cancelling whatever statement is running here.
    fn cancel_handle(&self) -> StatementCancel;
}

/// Open a connection for the given dialect.
///
/// Dialects outside the MySQL and Postgres families are classifier-only
/// and cannot be connected to from this workspace.
pub async fn open(
    db_type: DatabaseType,
    url: &str,
) -> Result<Box<dyn DbConnection>, ConnectorError> {
    if db_type.is_mysql_family() {
        let conn = MySqlConnection::connect(url).await?;
        return Ok(Box::new(conn));
    }
    if db_type.is_postgres_family() {
        let conn = PgConnection::connect(url).await?;
        return Ok(Box::new(conn));
    }
    warn!(%db_type, "No driver for dialect");
    Err(ConnectorError::UnsupportedDriver(db_type.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_savepoint_names_are_distinct() {
        assert_ne!(Savepoint::generated(1), Savepoint::generated(2));
        assert_eq!(Savepoint::generated(7).name(), "sp_7");
    }

    #[tokio::test]
    async fn open_rejects_classifier_only_dialects() {
        for db in [
            DatabaseType::Oracle,
            DatabaseType::SqlServer,
            DatabaseType::Db2,
        ] {
            let result = open(db, "db://nowhere").await;
            assert!(matches!(
                result,
                Err(ConnectorError::UnsupportedDriver(_))
            ));
        }
    }
}
