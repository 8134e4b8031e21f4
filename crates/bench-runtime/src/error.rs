use bench_core::error::CatalogError;
use connectors::error::{ConnectorError, DbError};
use model::core::db::DatabaseType;
use model::core::state::GlobalState;
use thiserror::Error;

/// Failures that terminate one worker. Everything recoverable (user
/// aborts, transient errors, cancellations) is absorbed by the retry
/// loop before it gets here.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("worker {worker_id} could not acquire a {db_type} connection for {txn}: {source}")]
    ConnectionAcquisition {
        worker_id: usize,
        db_type: DatabaseType,
        txn: String,
        source: ConnectorError,
    },

    #[error(
        "fatal {db_type} error on {txn} (code {code}, sqlstate {sql_state:?}): {source}"
    )]
    FatalDatabase {
        db_type: DatabaseType,
        txn: String,
        code: i32,
        sql_state: Option<String>,
        source: DbError,
    },

    /// Transaction plumbing (rollback, isolation, auto-commit) failed
    /// outside the classified attempt path.
    #[error("worker {worker_id}: database failure around {txn}: {source}")]
    Database {
        worker_id: usize,
        txn: String,
        source: DbError,
    },

    /// Environmental or programming failure raised by `execute_work`.
    #[error("fatal procedure error on {txn}: {source}")]
    FatalProcedure {
        txn: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The workload mix referenced a transaction the benchmark never
    /// registered. A bug, not a runtime condition.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("serial phase exhausted in unexpected state {0}")]
    UnexpectedEndOfSerial(GlobalState),
}

/// Top-level errors for a benchmark run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("worker failed: {0}")]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A worker task was cancelled or panicked.
    #[error("task join error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
