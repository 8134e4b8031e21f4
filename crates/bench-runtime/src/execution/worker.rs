use crate::error::WorkerError;
use bench_core::benchmark::{BenchmarkModule, Procedure};
use bench_core::catalog::TransactionCatalog;
use bench_core::histogram::{Histogram, truncate_abort_message};
use bench_core::latency::LatencyRecord;
use bench_core::workload::{Fetched, WorkloadState};
use connectors::classify::{ErrorAction, classify};
use connectors::connection::{DbConnection, Savepoint, StatementCancel};
use connectors::error::DbError;
use model::core::db::{DatabaseType, IsolationLevel};
use model::core::state::GlobalState;
use model::core::transaction::{TransactionStatus, TransactionType};
use model::execution::work::SubmittedProcedure;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// A transaction is re-attempted at most this many times after a
/// transient error before the worker moves on.
pub const MAX_RETRY_COUNT: u64 = 3;

/// CockroachDB only retries serialization failures rolled back to a
/// savepoint with this exact name.
const COCKROACH_SAVEPOINT: &str = "cockroach_restart";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-worker outcome histograms, merged by the driver after the run.
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub txn_success: Histogram<TransactionType>,
    pub txn_abort: Histogram<TransactionType>,
    pub txn_retry: Histogram<TransactionType>,
    pub txn_errors: Histogram<TransactionType>,
    pub txn_abort_messages: BTreeMap<TransactionType, Histogram<String>>,
}

/// Everything a worker hands back when it stops.
#[derive(Debug)]
pub struct WorkerOutput {
    pub stats: WorkerStats,
    pub latencies: LatencyRecord,
}

/// Driver-side view of a running worker: the interval throughput
/// counter and the cancel slot for its in-flight statement.
#[derive(Clone)]
pub struct WorkerHandle {
    interval_requests: Arc<AtomicU64>,
    curr_statement: Arc<Mutex<Option<StatementCancel>>>,
}

impl WorkerHandle {
    /// Linearizable read-and-reset of the interval request counter.
    pub fn sample_interval_requests(&self) -> u64 {
        self.interval_requests.swap(0, Ordering::SeqCst)
    }

    /// Cancel handle for the statement currently executing, if any.
    pub fn current_cancel(&self) -> Option<StatementCancel> {
        lock(&self.curr_statement).clone()
    }
}

/// One persistent client context: fetches work from the shared state
/// machine, executes it with retry/savepoint/abort semantics, and
/// accumulates phase-gated samples and outcome histograms.
pub struct Worker {
    id: usize,
    module: Arc<dyn BenchmarkModule>,
    catalog: Arc<TransactionCatalog>,
    state: Arc<WorkloadState>,
    latencies: LatencyRecord,
    stats: WorkerStats,
    interval_requests: Arc<AtomicU64>,
    curr_statement: Arc<Mutex<Option<StatementCancel>>>,
    seen_done: bool,
}

impl Worker {
    pub fn new(
        id: usize,
        module: Arc<dyn BenchmarkModule>,
        catalog: Arc<TransactionCatalog>,
        state: Arc<WorkloadState>,
    ) -> Self {
        Self {
            id,
            module,
            catalog,
            state,
            latencies: LatencyRecord::new(),
            stats: WorkerStats::default(),
            interval_requests: Arc::new(AtomicU64::new(0)),
            curr_statement: Arc::new(Mutex::new(None)),
            seen_done: false,
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            interval_requests: self.interval_requests.clone(),
            curr_statement: self.curr_statement.clone(),
        }
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn latencies(&self) -> &LatencyRecord {
        &self.latencies
    }

    /// The worker loop. Returns the accumulated stats once `Done` is
    /// observed, or the first fatal error.
    pub async fn run(mut self) -> Result<WorkerOutput, WorkerError> {
        self.state.block_for_start().await;
        debug!(worker = self.id, "Released from start gate");

        loop {
            if self.state.global_state() == GlobalState::Done {
                if !self.seen_done {
                    self.seen_done = true;
                    self.state.signal_done();
                }
                break;
            }

            self.state.stay_awake().await;
            let Some(phase) = self.state.current_phase() else {
                continue;
            };

            let work = match self.state.fetch_work().await {
                Fetched::Work(work) => work,
                Fetched::StateChanged => continue,
                Fetched::EndOfSerial => {
                    self.handle_end_of_serial(phase.id)?;
                    continue;
                }
            };

            // Re-snapshot after the potentially blocking fetch. A phase
            // that vanished here loops without a paired finished_work.
            let pre_state = self.state.global_state();
            let Some(phase) = self.state.current_phase() else {
                continue;
            };
            if pre_state.is_draining() {
                continue;
            }

            let start_ns = work.start_time_ns;
            let txn_type = self.do_work(pre_state == GlobalState::Measure, &work).await?;
            let end_ns = self.state.now_ns();

            let post_state = self.state.global_state();
            let same_phase = self.state.current_phase().map(|p| p.id) == Some(phase.id);
            if pre_state == GlobalState::Measure
                && post_state == GlobalState::Measure
                && same_phase
                && let Some(txn_type) = &txn_type
            {
                self.latencies
                    .append(txn_type.id(), start_ns, end_ns, self.id, phase.id);
                self.interval_requests.fetch_add(1, Ordering::Relaxed);
                if phase.is_latency_run() {
                    self.state.start_cold_query();
                }
            }
            if pre_state == GlobalState::ColdQuery && post_state == GlobalState::ColdQuery {
                self.state.start_hot_query();
            }

            self.state.finished_work();
        }

        info!(
            worker = self.id,
            success = self.stats.txn_success.total(),
            aborts = self.stats.txn_abort.total(),
            retries = self.stats.txn_retry.total(),
            errors = self.stats.txn_errors.total(),
            "Worker finished"
        );
        Ok(WorkerOutput {
            stats: self.stats,
            latencies: self.latencies,
        })
    }

    /// The serial query list ran out. Warmup wraps inside the state
    /// machine; during the cold/hot cycle this is the end of the phase.
    fn handle_end_of_serial(&mut self, phase_id: u32) -> Result<(), WorkerError> {
        match self.state.global_state() {
            GlobalState::Warmup => Ok(()),
            GlobalState::ColdQuery | GlobalState::Measure => {
                if self.state.current_phase().map(|p| p.id) == Some(phase_id) {
                    debug!(worker = self.id, phase = phase_id, "Serial phase complete");
                    self.state.signal_latency_complete();
                }
                Ok(())
            }
            // Another worker beat us to the signal.
            GlobalState::LatencyComplete => Ok(()),
            other => Err(WorkerError::UnexpectedEndOfSerial(other)),
        }
    }

    /// Execute one work item: acquire a connection, run the retry loop,
    /// restore auto-commit, release the connection on every path.
    ///
    /// Returns the executed type only when the final status is
    /// `Success`; abandoned, aborted, and exhausted attempts yield
    /// `None` so the caller never records a sample for them.
    pub(crate) async fn do_work(
        &mut self,
        measure: bool,
        work: &SubmittedProcedure,
    ) -> Result<Option<TransactionType>, WorkerError> {
        let (txn_type, procedure) = self.catalog.by_id(work.type_id)?;
        let txn_type = txn_type.clone();
        let procedure = procedure.clone();

        let config = self.module.workload_config();
        let db_type = config.db_type;
        let isolation = config.isolation;
        let record_messages = config.record_abort_messages;

        let mut conn = self.module.get_connection().await.map_err(|source| {
            WorkerError::ConnectionAcquisition {
                worker_id: self.id,
                db_type,
                txn: txn_type.name().to_string(),
                source,
            }
        })?;
        *lock(&self.curr_statement) = Some(conn.cancel_handle());
        debug!(worker = self.id, txn = %txn_type, measure, "Starting transaction");

        let outcome = self
            .run_attempts(
                conn.as_mut(),
                procedure.as_ref(),
                &txn_type,
                db_type,
                isolation,
                record_messages,
            )
            .await;
        lock(&self.curr_statement).take();

        let status = match outcome {
            Ok(status) => status,
            Err(err) => {
                // The connection drops here, releasing the socket even
                // on the fatal path.
                return Err(err);
            }
        };

        if conn.auto_commit() {
            warn!(worker = self.id, txn = %txn_type, "Auto-commit unexpectedly enabled after attempt");
        }
        conn.set_auto_commit(true)
            .await
            .map_err(|source| self.infra_error(&txn_type, source))?;
        if let Err(err) = conn.close().await {
            debug!(worker = self.id, "Connection close failed: {err}");
        }

        Ok((status == TransactionStatus::Success).then_some(txn_type))
    }

    /// The retry loop: savepoint, execute, commit; on failure roll back
    /// and act on the classified error. Exactly one commit-or-rollback
    /// per attempt.
    async fn run_attempts(
        &mut self,
        conn: &mut dyn DbConnection,
        procedure: &dyn Procedure,
        txn_type: &TransactionType,
        db_type: DatabaseType,
        isolation: IsolationLevel,
        record_messages: bool,
    ) -> Result<TransactionStatus, WorkerError> {
        if !conn.auto_commit() {
            warn!(worker = self.id, txn = %txn_type, "Auto-commit already disabled on a fresh connection");
        }
        conn.set_auto_commit(false)
            .await
            .map_err(|source| self.infra_error(txn_type, source))?;
        if db_type.supports_transactions() {
            conn.set_isolation(isolation)
                .await
                .map_err(|source| self.infra_error(txn_type, source))?;
        }

        let mut status = TransactionStatus::Retry;
        let mut retry_count: u64 = 0;

        while status == TransactionStatus::Retry
            && retry_count < MAX_RETRY_COUNT
            && self.state.global_state() != GlobalState::Done
        {
            let mut savepoint = None;
            let attempt = Self::execute_attempt(
                conn,
                procedure,
                txn_type,
                db_type,
                &mut savepoint,
            )
            .await;

            match attempt {
                Ok(returned) => {
                    status = returned;
                }
                Err(bench_core::error::ProcedureError::UserAbort(message)) => {
                    debug!(worker = self.id, txn = %txn_type, abort = %message, "User aborted transaction");
                    if record_messages {
                        self.stats
                            .txn_abort_messages
                            .entry(txn_type.clone())
                            .or_default()
                            .add(truncate_abort_message(&message));
                    }
                    self.rollback_attempt(conn, &savepoint, txn_type).await?;
                    status = TransactionStatus::UserAborted;
                }
                Err(bench_core::error::ProcedureError::Db(db_err)) => {
                    self.stats.txn_errors.add(txn_type.clone());
                    if db_type.supports_transactions() {
                        self.rollback_attempt(conn, &savepoint, txn_type).await?;
                    }

                    let code = db_err.vendor_code();
                    let sql_state = db_err.sql_state();
                    match classify(db_type, code, sql_state.as_deref()) {
                        ErrorAction::Retry => {
                            warn!(
                                worker = self.id,
                                txn = %txn_type,
                                code,
                                sql_state = sql_state.as_deref().unwrap_or("-"),
                                "Transient database error, will retry"
                            );
                            status = TransactionStatus::Retry;
                        }
                        ErrorAction::RetryDifferent => {
                            debug!(worker = self.id, txn = %txn_type, "Attempt discarded, moving on");
                            status = TransactionStatus::RetryDifferent;
                        }
                        ErrorAction::UnknownRetry => {
                            warn!(
                                worker = self.id,
                                txn = %txn_type,
                                code,
                                sql_state = sql_state.as_deref().unwrap_or("-"),
                                "Unknown database error, treating as retryable"
                            );
                            status = TransactionStatus::Retry;
                        }
                        ErrorAction::Fatal => {
                            error!(
                                db = %db_type,
                                txn = %txn_type,
                                code,
                                sql_state = sql_state.as_deref().unwrap_or("-"),
                                "Fatal database error"
                            );
                            return Err(WorkerError::FatalDatabase {
                                db_type,
                                txn: txn_type.name().to_string(),
                                code,
                                sql_state,
                                source: db_err,
                            });
                        }
                    }
                }
                Err(bench_core::error::ProcedureError::Fatal(source)) => {
                    return Err(WorkerError::FatalProcedure {
                        txn: txn_type.name().to_string(),
                        source,
                    });
                }
            }

            match status {
                TransactionStatus::Success => {
                    self.stats.txn_success.add(txn_type.clone());
                }
                TransactionStatus::UserAborted => {
                    self.stats.txn_abort.add(txn_type.clone());
                }
                TransactionStatus::Retry => {
                    self.stats.txn_retry.add(txn_type.clone());
                    retry_count += 1;
                    if retry_count >= MAX_RETRY_COUNT {
                        warn!(
                            worker = self.id,
                            txn = %txn_type,
                            retries = retry_count,
                            "Retries exhausted, moving on to the next work item"
                        );
                    }
                }
                TransactionStatus::RetryDifferent => {
                    self.stats.txn_retry.add(txn_type.clone());
                }
                TransactionStatus::Error => {}
            }
        }

        Ok(status)
    }

    /// One attempt's happy path. On error the savepoint (if created)
    /// stays in `savepoint` so the caller can roll back to it; it is
    /// released exactly once, on this commit path.
    async fn execute_attempt(
        conn: &mut dyn DbConnection,
        procedure: &dyn Procedure,
        txn_type: &TransactionType,
        db_type: DatabaseType,
        savepoint: &mut Option<Savepoint>,
    ) -> Result<TransactionStatus, bench_core::error::ProcedureError> {
        *savepoint = match db_type {
            DatabaseType::Postgres => Some(conn.savepoint(None).await?),
            DatabaseType::CockroachDb => Some(conn.savepoint(Some(COCKROACH_SAVEPOINT)).await?),
            _ => None,
        };

        let returned = procedure.execute_work(conn, txn_type).await?;

        if let Some(sp) = savepoint.take() {
            conn.release_savepoint(sp).await?;
        }
        conn.commit().await?;
        Ok(returned)
    }

    /// Roll back to the savepoint when one exists, otherwise the whole
    /// transaction. A rollback that itself fails is worker-fatal.
    async fn rollback_attempt(
        &self,
        conn: &mut dyn DbConnection,
        savepoint: &Option<Savepoint>,
        txn_type: &TransactionType,
    ) -> Result<(), WorkerError> {
        let result = match savepoint {
            Some(sp) => conn.rollback_to(sp).await,
            None => conn.rollback().await,
        };
        result.map_err(|source| self.infra_error(txn_type, source))
    }

    fn infra_error(&self, txn_type: &TransactionType, source: DbError) -> WorkerError {
        WorkerError::Database {
            worker_id: self.id,
            txn: txn_type.name().to_string(),
            source,
        }
    }
}
