use crate::connection::{DbConnection, Savepoint, StatementCancel};
use crate::error::{ConnectorError, DbError};
use async_trait::async_trait;
use model::core::db::IsolationLevel;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, Row};
use tracing::error;

/// One Postgres / CockroachDB session with explicit transaction
/// control.
///
/// The server has no autocommit switch; with autocommit off the
/// connection opens a transaction lazily before the first statement and
/// again after every commit or rollback, the way the JDBC driver does.
pub struct PgConnection {
    client: Client,
    auto_commit: bool,
    in_txn: bool,
    savepoint_seq: u64,
}

impl PgConnection {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!("Postgres connection task failed: {err}");
            }
        });
        Ok(Self {
            client,
            auto_commit: true,
            in_txn: false,
            savepoint_seq: 0,
        })
    }

    async fn ensure_txn(&mut self) -> Result<(), DbError> {
        if !self.auto_commit && !self.in_txn {
            self.client.batch_execute("BEGIN").await?;
            self.in_txn = true;
        }
        Ok(())
    }

    fn render_value(row: &Row, idx: usize) -> Option<String> {
        let column_type = row.columns()[idx].type_();
        match *column_type {
            Type::INT2 => row.get::<_, Option<i16>>(idx).map(|v| v.to_string()),
            Type::INT4 => row.get::<_, Option<i32>>(idx).map(|v| v.to_string()),
            Type::INT8 => row.get::<_, Option<i64>>(idx).map(|v| v.to_string()),
            Type::FLOAT4 => row.get::<_, Option<f32>>(idx).map(|v| v.to_string()),
            Type::FLOAT8 => row.get::<_, Option<f64>>(idx).map(|v| v.to_string()),
            Type::BOOL => row.get::<_, Option<bool>>(idx).map(|v| v.to_string()),
            _ => row.try_get::<_, Option<String>>(idx).ok().flatten(),
        }
    }
}

#[async_trait]
impl DbConnection for PgConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        self.ensure_txn().await?;
        Ok(self.client.execute(sql, &[]).await?)
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, DbError> {
        self.ensure_txn().await?;
        let rows = self.client.query(sql, &[]).await?;
        Ok(rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|idx| Self::render_value(row, idx))
                    .collect()
            })
            .collect())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DbError> {
        if enabled && self.in_txn {
            // Matches driver behavior: enabling autocommit commits the
            // open transaction.
            self.client.batch_execute("COMMIT").await?;
            self.in_txn = false;
        }
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), DbError> {
        self.client
            .batch_execute(&format!(
                "SET SESSION CHARACTERISTICS AS TRANSACTION ISOLATION LEVEL {}",
                level.sql_name()
            ))
            .await?;
        Ok(())
    }

    async fn savepoint(&mut self, name: Option<&str>) -> Result<Savepoint, DbError> {
        self.ensure_txn().await?;
        let savepoint = match name {
            Some(name) => Savepoint::named(name),
            None => {
                self.savepoint_seq += 1;
                Savepoint::generated(self.savepoint_seq)
            }
        };
        self.client
            .batch_execute(&format!("SAVEPOINT {}", savepoint.name()))
            .await?;
        Ok(savepoint)
    }

    async fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<(), DbError> {
        self.client
            .batch_execute(&format!("RELEASE SAVEPOINT {}", savepoint.name()))
            .await?;
        Ok(())
    }

    async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<(), DbError> {
        self.client
            .batch_execute(&format!("ROLLBACK TO SAVEPOINT {}", savepoint.name()))
            .await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        if self.in_txn {
            self.client.batch_execute("ROLLBACK").await?;
            self.in_txn = false;
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        if self.in_txn {
            self.client.batch_execute("COMMIT").await?;
            self.in_txn = false;
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        // Dropping the client tears down the connection task.
        Ok(())
    }

    fn cancel_handle(&self) -> StatementCancel {
        StatementCancel::Postgres(self.client.cancel_token())
    }
}
