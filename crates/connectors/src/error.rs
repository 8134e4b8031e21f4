use thiserror::Error;

/// All errors coming from the database layer during a run.
#[derive(Debug, Error)]
pub enum DbError {
    /// Any MySQL driver error.
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    /// Any Postgres driver error.
    #[error("Postgres error: {0}")]
    Pg(#[from] tokio_postgres::Error),

    /// A server error reported outside the two concrete drivers, e.g.
    /// by a benchmark-supplied connection for a classifier-only
    /// dialect.
    #[error("Server error {code} (sqlstate {sql_state:?}): {message}")]
    Server {
        code: i32,
        sql_state: Option<String>,
        message: String,
    },
}

impl DbError {
    /// Vendor-specific error code. Postgres has none; the classifier
    /// table uses 0 for the whole Postgres family.
    pub fn vendor_code(&self) -> i32 {
        match self {
            DbError::MySql(mysql_async::Error::Server(server)) => i32::from(server.code),
            DbError::MySql(_) => 0,
            DbError::Pg(_) => 0,
            DbError::Server { code, .. } => *code,
        }
    }

    /// Five-character SQLSTATE, when the server reported one.
    pub fn sql_state(&self) -> Option<String> {
        match self {
            DbError::MySql(mysql_async::Error::Server(server)) => Some(server.state.clone()),
            DbError::MySql(_) => None,
            DbError::Pg(err) => err.code().map(|code| code.code().to_string()),
            DbError::Server { sql_state, .. } => sql_state.clone(),
        }
    }
}

/// Errors happening during connection setup.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The MySQL driver failed to build the connection.
    #[error("MySQL connector creation failed: {0}")]
    MySql(#[from] mysql_async::Error),

    /// The Postgres driver failed to build the connection.
    #[error("Postgres connector creation failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// An invalid database URL was provided.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// The dialect is known to the classifier but has no driver here.
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),
}
