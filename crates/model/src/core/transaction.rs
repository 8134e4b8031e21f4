use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Identifier of the sentinel transaction type. Real types start at 1.
pub const INVALID_TYPE_ID: usize = 0;

/// A transaction type registered by a benchmark.
///
/// Equality and hashing follow the numeric id; the name exists for
/// reporting and for the deprecated name-based catalog lookup.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionType {
    id: usize,
    name: Arc<str>,
}

impl TransactionType {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Arc::from(name.into()),
        }
    }

    /// The `INVALID` sentinel, id 0.
    pub fn invalid() -> Self {
        Self::new(INVALID_TYPE_ID, "INVALID")
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_invalid(&self) -> bool {
        self.id == INVALID_TYPE_ID
    }
}

impl PartialEq for TransactionType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TransactionType {}

impl std::hash::Hash for TransactionType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TransactionType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TransactionType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:02}", self.name, self.id)
    }
}

/// Outcome of a single transaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    /// The transaction committed.
    Success,
    /// The benchmark intentionally rolled the transaction back.
    UserAborted,
    /// A transient database error; the same transaction should be
    /// re-attempted.
    Retry,
    /// The attempt was cancelled or returned no results; the worker
    /// should move on to a different transaction.
    RetryDifferent,
    /// The attempt failed with a database error.
    Error,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Success => "success",
            TransactionStatus::UserAborted => "user-aborted",
            TransactionStatus::Retry => "retry",
            TransactionStatus::RetryDifferent => "retry-different",
            TransactionStatus::Error => "error",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
