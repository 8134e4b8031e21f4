use crate::error::RuntimeError;
use crate::execution::results::BenchmarkResults;
use crate::execution::worker::{Worker, WorkerHandle};
use bench_core::benchmark::BenchmarkModule;
use bench_core::catalog::TransactionCatalog;
use bench_core::workload::WorkloadState;
use bench_core::workload::pacer::run_pacer;
use model::core::state::GlobalState;
use model::execution::config::WorkloadConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Cadence of the live throughput log line.
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// How long the driver waits for workers to acknowledge `Done` before
/// joining them regardless.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Run the whole benchmark: spawn the worker pool, drive the phase
/// schedule, and aggregate per-worker results at the end.
///
/// Cancelling `cancel` ends the schedule early; the run still drains
/// and returns whatever was measured.
pub async fn run(
    module: Arc<dyn BenchmarkModule>,
    cancel: CancellationToken,
) -> Result<BenchmarkResults, RuntimeError> {
    let config = module.workload_config().clone();
    if config.phases.is_empty() {
        warn!("No phases configured, nothing to run");
        return Ok(BenchmarkResults::default());
    }
    let catalog = Arc::new(TransactionCatalog::new(module.procedures())?);
    let state = Arc::new(WorkloadState::new());

    info!(
        benchmark = module.name(),
        db = %config.db_type,
        terminals = config.terminals,
        phases = config.phases.len(),
        "Launching workers"
    );

    let mut handles = Vec::with_capacity(config.terminals);
    let mut workers: Vec<JoinHandle<_>> = Vec::with_capacity(config.terminals);
    for worker_id in 0..config.terminals {
        let worker = Worker::new(worker_id, module.clone(), catalog.clone(), state.clone());
        handles.push(worker.handle());
        workers.push(tokio::spawn(worker.run()));
    }
    let handles = Arc::new(handles);

    let helper_cancel = cancel.child_token();
    let pacer = tokio::spawn(run_pacer(
        state.clone(),
        StdRng::from_entropy(),
        helper_cancel.clone(),
    ));
    let sampler = tokio::spawn(run_interval_sampler(
        state.clone(),
        handles.clone(),
        helper_cancel.clone(),
    ));

    run_schedule(&state, &config, &handles, &cancel).await;

    // Wind down: Done is terminal, in-flight statements get cancelled,
    // workers acknowledge and return their stats.
    state.set_state(GlobalState::Done);
    cancel_statements(&handles);
    if tokio::time::timeout(SHUTDOWN_GRACE, state.await_workers_done(config.terminals))
        .await
        .is_err()
    {
        debug!("Not all workers acknowledged Done within the grace period");
    }
    helper_cancel.cancel();
    let _ = pacer.await;
    let _ = sampler.await;

    let mut results = BenchmarkResults::default();
    let mut failure: Option<RuntimeError> = None;
    for handle in workers {
        match handle.await {
            Ok(Ok(output)) => results.merge_worker(output),
            Ok(Err(worker_err)) => {
                error!("Worker failed: {worker_err}");
                failure.get_or_insert(RuntimeError::Worker(worker_err));
            }
            Err(join_err) => {
                failure.get_or_insert(RuntimeError::TaskJoin(join_err));
            }
        }
    }
    if let Some(err) = failure {
        return Err(err);
    }

    info!(
        requests = results.total_requests(),
        samples = results.samples.len(),
        "Run complete"
    );
    Ok(results)
}

/// Advance global state and phases on the configured schedule.
async fn run_schedule(
    state: &Arc<WorkloadState>,
    config: &WorkloadConfig,
    handles: &Arc<Vec<WorkerHandle>>,
    cancel: &CancellationToken,
) {
    let first = Arc::new(config.phases[0].clone());
    state.start_run(Some(first));

    if config.warmup_secs > 0 {
        info!(secs = config.warmup_secs, "Warm-up");
        if sleep_or_cancelled(config.warmup(), cancel).await {
            return;
        }
    }

    for (idx, phase) in config.phases.iter().enumerate() {
        if cancel.is_cancelled() {
            return;
        }
        let phase = Arc::new(phase.clone());
        if idx > 0 {
            state.advance_phase(Some(phase.clone()));
            cancel_statements(handles);
        }

        if phase.is_latency_run() {
            info!(phase = phase.id, "Latency phase: serial cold/hot cycle");
            state.begin_cold_pass();
            cancel_statements(handles);
            tokio::select! {
                _ = state.await_state(GlobalState::LatencyComplete) => {}
                _ = cancel.cancelled() => return,
            }
        } else {
            info!(
                phase = phase.id,
                secs = phase.duration_secs,
                rate = ?phase.rate,
                "Measurement window open"
            );
            state.set_state(GlobalState::Measure);
            cancel_statements(handles);
            if sleep_or_cancelled(phase.duration(), cancel).await {
                return;
            }
        }
    }

    state.set_state(GlobalState::Exit);
    cancel_statements(handles);
}

/// Fire every worker's current statement cancel, detached. Invoked on
/// each state advance so in-flight statements do not outlive their
/// measurement window.
fn cancel_statements(handles: &Arc<Vec<WorkerHandle>>) {
    for handle in handles.iter() {
        if let Some(cancel) = handle.current_cancel() {
            tokio::spawn(async move {
                if let Err(err) = cancel.cancel().await {
                    debug!("Statement cancel failed: {err}");
                }
            });
        }
    }
}

/// Reads-and-resets every worker's interval counter once a second and
/// logs the summed live throughput.
async fn run_interval_sampler(
    state: Arc<WorkloadState>,
    handles: Arc<Vec<WorkerHandle>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let requests: u64 = handles
                    .iter()
                    .map(WorkerHandle::sample_interval_requests)
                    .sum();
                if state.global_state() == GlobalState::Measure {
                    info!(requests_per_sec = requests, "Throughput");
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}

/// Sleep the given duration; true when the token fired instead.
async fn sleep_or_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = cancel.cancelled() => true,
    }
}
