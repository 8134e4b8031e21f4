use crate::connection::{DbConnection, Savepoint, StatementCancel};
use crate::error::{ConnectorError, DbError};
use async_trait::async_trait;
use model::core::db::IsolationLevel;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Row, Value};
use std::sync::Arc;

/// One MySQL / MariaDB session with explicit transaction control.
pub struct MySqlConnection {
    conn: Conn,
    url: Arc<str>,
    auto_commit: bool,
    savepoint_seq: u64,
}

impl MySqlConnection {
    pub async fn connect(url: &str) -> Result<Self, ConnectorError> {
        let opts =
            Opts::from_url(url).map_err(|err| ConnectorError::InvalidUrl(err.to_string()))?;
        let conn = Conn::new(opts).await?;
        Ok(Self {
            conn,
            url: Arc::from(url),
            auto_commit: true,
            savepoint_seq: 0,
        })
    }

    fn render_value(value: &Value) -> Option<String> {
        match value {
            Value::NULL => None,
            Value::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            Value::Int(n) => Some(n.to_string()),
            Value::UInt(n) => Some(n.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Double(f) => Some(f.to_string()),
            other => Some(format!("{other:?}")),
        }
    }
}

#[async_trait]
impl DbConnection for MySqlConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64, DbError> {
        self.conn.query_drop(sql).await?;
        Ok(self.conn.affected_rows())
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Vec<Option<String>>>, DbError> {
        let rows: Vec<Row> = self.conn.query(sql).await?;
        Ok(rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|idx| row.as_ref(idx).and_then(Self::render_value))
                    .collect()
            })
            .collect())
    }

    async fn set_auto_commit(&mut self, enabled: bool) -> Result<(), DbError> {
        let flag = if enabled { 1 } else { 0 };
        self.conn.query_drop(format!("SET autocommit={flag}")).await?;
        self.auto_commit = enabled;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    async fn set_isolation(&mut self, level: IsolationLevel) -> Result<(), DbError> {
        self.conn
            .query_drop(format!(
                "SET SESSION TRANSACTION ISOLATION LEVEL {}",
                level.sql_name()
            ))
            .await?;
        Ok(())
    }

    async fn savepoint(&mut self, name: Option<&str>) -> Result<Savepoint, DbError> {
        let savepoint = match name {
            Some(name) => Savepoint::named(name),
            None => {
                self.savepoint_seq += 1;
                Savepoint::generated(self.savepoint_seq)
            }
        };
        self.conn
            .query_drop(format!("SAVEPOINT {}", savepoint.name()))
            .await?;
        Ok(savepoint)
    }

    async fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<(), DbError> {
        self.conn
            .query_drop(format!("RELEASE SAVEPOINT {}", savepoint.name()))
            .await?;
        Ok(())
    }

    async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<(), DbError> {
        self.conn
            .query_drop(format!("ROLLBACK TO SAVEPOINT {}", savepoint.name()))
            .await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DbError> {
        self.conn.query_drop("ROLLBACK").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DbError> {
        self.conn.query_drop("COMMIT").await?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), DbError> {
        self.conn.disconnect().await?;
        Ok(())
    }

    fn cancel_handle(&self) -> StatementCancel {
        StatementCancel::MySql {
            url: self.url.clone(),
            conn_id: self.conn.id(),
        }
    }
}
