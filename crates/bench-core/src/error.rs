use connectors::error::DbError;
use thiserror::Error;

/// Catalog lookups fail with a not-found signal; the work loop treats
/// an id miss as a programming error in the workload mix.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no procedure registered for transaction type id {0}")]
    IdNotFound(usize),

    #[error("no procedure registered for transaction name {0}")]
    NameNotFound(String),

    #[error("no transaction type registered for this procedure class")]
    ClassNotFound,

    #[error("transaction type {0} registered more than once")]
    Duplicate(String),
}

/// What a benchmark procedure can raise from `execute_work`.
#[derive(Debug, Error)]
pub enum ProcedureError {
    /// Benchmark-intentional rollback (e.g. the 1% NewOrder abort).
    /// Not a failure.
    #[error("user abort: {0}")]
    UserAbort(String),

    /// A database error, to be classified by dialect.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Environmental or programming failure. Terminates the worker.
    #[error("fatal procedure error: {0}")]
    Fatal(Box<dyn std::error::Error + Send + Sync>),
}
