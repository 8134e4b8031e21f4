use crate::error::WorkerError;
use crate::execution::worker::{MAX_RETRY_COUNT, Worker};
use crate::tests::mocks::{
    MockModule, ScriptStep, ScriptedProcedure, ops_matching, throughput_phase, txn_type,
};
use bench_core::benchmark::BenchmarkModule;
use bench_core::catalog::TransactionCatalog;
use bench_core::error::CatalogError;
use bench_core::workload::WorkloadState;
use model::core::db::DatabaseType;
use model::core::state::GlobalState;
use model::execution::work::SubmittedProcedure;
use std::sync::Arc;
use std::time::Duration;

fn fixture(db_type: DatabaseType, steps: Vec<ScriptStep>) -> (Worker, Arc<MockModule>, Arc<WorkloadState>) {
    let module = Arc::new(MockModule::new(
        db_type,
        Arc::new(ScriptedProcedure::new(steps)),
    ));
    build_worker(module)
}

fn build_worker(module: Arc<MockModule>) -> (Worker, Arc<MockModule>, Arc<WorkloadState>) {
    let catalog = Arc::new(TransactionCatalog::new(module.procedures()).unwrap());
    let state = Arc::new(WorkloadState::new());
    let worker = Worker::new(0, module.clone(), catalog, state.clone());
    (worker, module, state)
}

fn work() -> SubmittedProcedure {
    SubmittedProcedure::new(1, 0)
}

#[tokio::test]
async fn happy_path_on_postgres() {
    let (mut worker, module, _state) = fixture(DatabaseType::Postgres, vec![ScriptStep::Succeed]);

    let executed = worker.do_work(true, &work()).await.unwrap();
    assert_eq!(executed, Some(txn_type()));

    assert_eq!(ops_matching(&module.ops, "savepoint sp_1"), 1);
    assert_eq!(ops_matching(&module.ops, "release sp_1"), 1);
    assert_eq!(ops_matching(&module.ops, "commit"), 1);
    assert_eq!(ops_matching(&module.ops, "rollback"), 0);
    assert_eq!(ops_matching(&module.ops, "close"), 1);

    let stats = worker.stats();
    assert_eq!(stats.txn_success.get(&txn_type()), 1);
    assert!(stats.txn_abort.is_empty());
    assert!(stats.txn_retry.is_empty());
    assert!(stats.txn_errors.is_empty());
}

#[tokio::test]
async fn deadlock_retry_on_mysql() {
    let deadlock = ScriptStep::ServerError {
        code: 1213,
        state: "40001",
    };
    let (mut worker, module, _state) = fixture(
        DatabaseType::MySql,
        vec![deadlock.clone(), deadlock, ScriptStep::Succeed],
    );

    let executed = worker.do_work(true, &work()).await.unwrap();
    assert_eq!(executed, Some(txn_type()));

    // Two full rollbacks (no savepoint on MySQL), then one commit.
    assert_eq!(ops_matching(&module.ops, "rollback"), 2);
    assert_eq!(ops_matching(&module.ops, "savepoint"), 0);
    assert_eq!(ops_matching(&module.ops, "commit"), 1);

    let stats = worker.stats();
    assert_eq!(stats.txn_retry.get(&txn_type()), 2);
    assert_eq!(stats.txn_errors.get(&txn_type()), 2);
    assert_eq!(stats.txn_success.get(&txn_type()), 1);
}

#[tokio::test]
async fn retry_exhaustion_on_oracle() {
    let serialization = ScriptStep::ServerError {
        code: 8177,
        state: "72000",
    };
    let (mut worker, module, _state) = fixture(
        DatabaseType::Oracle,
        vec![serialization.clone(), serialization.clone(), serialization],
    );

    let executed = worker.do_work(true, &work()).await.unwrap();
    assert_eq!(executed, None, "an exhausted attempt yields no type");

    assert_eq!(ops_matching(&module.ops, "rollback"), 3);
    assert_eq!(ops_matching(&module.ops, "commit"), 0);

    let stats = worker.stats();
    assert_eq!(stats.txn_retry.get(&txn_type()), MAX_RETRY_COUNT);
    assert_eq!(stats.txn_errors.get(&txn_type()), MAX_RETRY_COUNT);
    assert!(stats.txn_success.is_empty());
}

#[tokio::test]
async fn user_abort_records_truncated_message() {
    let (mut worker, module, _state) = fixture(
        DatabaseType::Postgres,
        vec![ScriptStep::UserAbort("item_not_found_in_stock")],
    );

    let executed = worker.do_work(true, &work()).await.unwrap();
    assert_eq!(executed, None);

    // Rolled back to the savepoint, which is never released.
    assert_eq!(ops_matching(&module.ops, "savepoint sp_1"), 1);
    assert_eq!(ops_matching(&module.ops, "rollback_to sp_1"), 1);
    assert_eq!(ops_matching(&module.ops, "release"), 0);
    assert_eq!(ops_matching(&module.ops, "commit"), 0);

    let stats = worker.stats();
    assert_eq!(stats.txn_abort.get(&txn_type()), 1);
    assert!(stats.txn_retry.is_empty(), "a user abort is not retried");
    let messages = stats.txn_abort_messages.get(&txn_type()).unwrap();
    assert_eq!(messages.get(&"item_not_found_in_st…".to_string()), 1);
}

#[tokio::test]
async fn cancellation_is_retry_different() {
    let (mut worker, module, _state) = fixture(
        DatabaseType::Postgres,
        vec![ScriptStep::ServerError {
            code: 0,
            state: "57014",
        }],
    );

    let executed = worker.do_work(true, &work()).await.unwrap();
    assert_eq!(executed, None);

    assert_eq!(ops_matching(&module.ops, "rollback_to sp_1"), 1);
    assert_eq!(ops_matching(&module.ops, "commit"), 0);

    let stats = worker.stats();
    assert_eq!(stats.txn_retry.get(&txn_type()), 1);
    assert_eq!(stats.txn_errors.get(&txn_type()), 1);
    assert!(stats.txn_success.is_empty());
}

#[tokio::test]
async fn unknown_error_is_retried() {
    let duplicate_key = ScriptStep::ServerError {
        code: 1062,
        state: "23000",
    };
    let (mut worker, _module, _state) =
        fixture(DatabaseType::MySql, vec![duplicate_key, ScriptStep::Succeed]);

    let executed = worker.do_work(true, &work()).await.unwrap();
    assert_eq!(executed, Some(txn_type()));

    let stats = worker.stats();
    assert_eq!(stats.txn_retry.get(&txn_type()), 1);
    assert_eq!(stats.txn_errors.get(&txn_type()), 1);
    assert_eq!(stats.txn_success.get(&txn_type()), 1);
}

#[tokio::test]
async fn fatal_database_error_propagates() {
    let (mut worker, _module, _state) = fixture(
        DatabaseType::Postgres,
        vec![ScriptStep::ServerError {
            code: 0,
            state: "53200",
        }],
    );

    let err = worker.do_work(true, &work()).await.unwrap_err();
    match err {
        WorkerError::FatalDatabase {
            db_type,
            code,
            sql_state,
            ..
        } => {
            assert_eq!(db_type, DatabaseType::Postgres);
            assert_eq!(code, 0);
            assert_eq!(sql_state.as_deref(), Some("53200"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn fatal_procedure_error_propagates() {
    let (mut worker, _module, _state) =
        fixture(DatabaseType::MySql, vec![ScriptStep::Fatal("out of range")]);

    let err = worker.do_work(true, &work()).await.unwrap_err();
    assert!(matches!(err, WorkerError::FatalProcedure { .. }));
}

#[tokio::test]
async fn connection_failure_names_worker_and_txn() {
    let module = Arc::new(
        MockModule::new(
            DatabaseType::MySql,
            Arc::new(ScriptedProcedure::new(Vec::new())),
        )
        .failing_connections(),
    );
    let (mut worker, _module, _state) = build_worker(module);

    let err = worker.do_work(true, &work()).await.unwrap_err();
    match err {
        WorkerError::ConnectionAcquisition {
            worker_id,
            db_type,
            txn,
            ..
        } => {
            assert_eq!(worker_id, 0);
            assert_eq!(db_type, DatabaseType::MySql);
            assert_eq!(txn, "MockTxn");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_type_id_is_a_programming_error() {
    let (mut worker, _module, _state) = fixture(DatabaseType::MySql, Vec::new());

    let err = worker
        .do_work(true, &SubmittedProcedure::new(99, 0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkerError::Catalog(CatalogError::IdNotFound(99))
    ));
}

#[tokio::test]
async fn measured_success_appends_one_sample() {
    let (worker, _module, state) = fixture(DatabaseType::Postgres, Vec::new());
    let handle = worker.handle();
    let running = tokio::spawn(worker.run());

    state.start_run(Some(Arc::new(throughput_phase())));
    state.set_state(GlobalState::Measure);
    assert!(state.submit_work(1).await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    state.set_state(GlobalState::Done);

    let output = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("worker drained")
        .unwrap()
        .unwrap();

    assert_eq!(output.latencies.len(), 1);
    let sample = output.latencies.iter().next().unwrap();
    assert!(sample.end_ns >= sample.start_ns);
    assert_eq!(sample.phase_id, 1);
    assert_eq!(sample.worker_id, 0);
    assert_eq!(output.stats.txn_success.get(&txn_type()), 1);
    // The interval counter saw exactly the measured samples.
    assert_eq!(handle.sample_interval_requests(), 1);
    assert_eq!(handle.sample_interval_requests(), 0, "read-and-reset");
}

#[tokio::test]
async fn phase_transition_mid_execution_drops_the_sample() {
    let flip_state = Arc::new(WorkloadState::new());
    let hooked = flip_state.clone();
    let procedure = Arc::new(ScriptedProcedure::with_hook(
        Vec::new(),
        Arc::new(move || hooked.set_state(GlobalState::Exit)),
    ));
    let module = Arc::new(MockModule::new(DatabaseType::Postgres, procedure));
    let catalog = Arc::new(TransactionCatalog::new(module.procedures()).unwrap());
    let worker = Worker::new(0, module, catalog, flip_state.clone());
    let running = tokio::spawn(worker.run());

    flip_state.start_run(Some(Arc::new(throughput_phase())));
    flip_state.set_state(GlobalState::Measure);
    assert!(flip_state.submit_work(1).await);

    tokio::time::sleep(Duration::from_millis(100)).await;
    flip_state.set_state(GlobalState::Done);

    let output = tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("worker drained")
        .unwrap()
        .unwrap();

    // The outcome still counts; the measurement window does not.
    assert_eq!(output.stats.txn_success.get(&txn_type()), 1);
    assert_eq!(output.latencies.len(), 0);
}
