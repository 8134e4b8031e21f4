use crate::error::ProcedureError;
use async_trait::async_trait;
use connectors::connection::DbConnection;
use connectors::error::ConnectorError;
use model::core::transaction::{TransactionStatus, TransactionType};
use model::execution::config::WorkloadConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One benchmark transaction body.
///
/// Implementations run exactly one transaction's statements on the
/// supplied connection and either return a status or raise a user
/// abort / database error. They never commit or roll back themselves;
/// the worker owns transaction boundaries.
#[async_trait]
pub trait Procedure: Any + Send + Sync + std::fmt::Debug {
    async fn execute_work(
        &self,
        conn: &mut dyn DbConnection,
        txn_type: &TransactionType,
    ) -> Result<TransactionStatus, ProcedureError>;
}

/// The contract a benchmark plugin exposes to the worker pool.
#[async_trait]
pub trait BenchmarkModule: Send + Sync {
    fn name(&self) -> &str;

    /// A fresh, ready-to-use connection. Workers acquire one per work
    /// item and release it on every exit path.
    async fn get_connection(&self) -> Result<Box<dyn DbConnection>, ConnectorError>;

    /// Snapshot of the procedure registry, one procedure per type.
    fn procedures(&self) -> BTreeMap<TransactionType, Arc<dyn Procedure>>;

    fn workload_config(&self) -> &WorkloadConfig;

    /// Deterministic per-worker randomness for benchmark-specific
    /// parameter generation.
    fn rng(&self, worker_id: usize) -> StdRng {
        StdRng::seed_from_u64(0x62656e6368 ^ worker_id as u64)
    }
}
