pub mod pacer;

use model::core::phase::Phase;
use model::core::state::GlobalState;
use model::execution::work::SubmittedProcedure;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{Notify, watch};
use tracing::debug;

/// Cap on queued-but-unfetched work items; the pacer blocks once the
/// workers fall this far behind.
pub const RATE_QUEUE_LIMIT: usize = 1024;

/// Outcome of a [`WorkloadState::fetch_work`] call.
///
/// End-of-serial-phase is an explicit sentinel, not an out-of-range
/// failure; the worker branches on this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Work(SubmittedProcedure),
    /// A serial latency phase has no queries left.
    EndOfSerial,
    /// The global state or phase changed while waiting; re-check and
    /// loop.
    StateChanged,
}

#[derive(Debug, Default)]
struct SerialCursor {
    idx: usize,
    list: Vec<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Global phase controller and work dispatcher shared by the driver
/// and all workers.
///
/// Workers only see the documented operations; the driver additionally
/// advances phases, flips global state, and feeds the queue through
/// the pacer. Phase transitions become visible to a worker at most one
/// fetch late; `Done` is terminal and persistent.
pub struct WorkloadState {
    state: AtomicU8,
    phase: Mutex<Option<Arc<Phase>>>,
    serial: Mutex<SerialCursor>,
    queue: Mutex<VecDeque<SubmittedProcedure>>,
    pending: AtomicU64,
    work_notify: Notify,
    space_notify: Notify,
    start_tx: watch::Sender<bool>,
    change_tx: watch::Sender<u64>,
    workers_done: AtomicUsize,
    done_notify: Notify,
    base: Instant,
}

impl WorkloadState {
    pub fn new() -> Self {
        let (start_tx, _) = watch::channel(false);
        let (change_tx, _) = watch::channel(0);
        Self {
            state: AtomicU8::new(GlobalState::Warmup.as_u8()),
            phase: Mutex::new(None),
            serial: Mutex::new(SerialCursor::default()),
            queue: Mutex::new(VecDeque::new()),
            pending: AtomicU64::new(0),
            work_notify: Notify::new(),
            space_notify: Notify::new(),
            start_tx,
            change_tx,
            workers_done: AtomicUsize::new(0),
            done_notify: Notify::new(),
            base: Instant::now(),
        }
    }

    /// Monotonic nanoseconds since the shared test-start base.
    pub fn now_ns(&self) -> u64 {
        self.base.elapsed().as_nanos() as u64
    }

    // ---- worker-facing operations -------------------------------------

    /// Blocks until the driver signals the run has begun. No worker
    /// proceeds past this before the driver has armed all workers.
    pub async fn block_for_start(&self) {
        let mut rx = self.start_tx.subscribe();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Blocks until there may be work or the phase/state changed.
    /// Returns with no guarantee that work is available.
    pub async fn stay_awake(&self) {
        let notified = self.work_notify.notified();
        if self.wakeup_due() {
            return;
        }
        let mut rx = self.change_tx.subscribe();
        tokio::select! {
            _ = notified => {}
            _ = rx.changed() => {}
        }
    }

    fn wakeup_due(&self) -> bool {
        let state = self.global_state();
        if state == GlobalState::Done {
            return true;
        }
        // Exit/LatencyComplete block here until the driver moves on.
        if state.is_draining() {
            return false;
        }
        match lock(&self.phase).as_ref() {
            // Serial work is always immediately fetchable.
            Some(phase) if phase.is_latency_run() => true,
            Some(_) => !lock(&self.queue).is_empty(),
            None => false,
        }
    }

    /// Snapshot of the active phase, `None` between phases.
    pub fn current_phase(&self) -> Option<Arc<Phase>> {
        lock(&self.phase).clone()
    }

    pub fn global_state(&self) -> GlobalState {
        GlobalState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Next unit of work. Blocks until work exists, the serial list is
    /// exhausted, or the state/phase changes under the caller. Work
    /// units are disjoint across concurrent callers.
    pub async fn fetch_work(&self) -> Fetched {
        loop {
            let notified = self.work_notify.notified();
            let state = self.global_state();
            if state.is_draining() {
                return Fetched::StateChanged;
            }
            let Some(phase) = self.current_phase() else {
                return Fetched::StateChanged;
            };

            if phase.is_latency_run() {
                return self.fetch_serial();
            }

            if let Some(item) = lock(&self.queue).pop_front() {
                self.pending.fetch_add(1, Ordering::SeqCst);
                self.space_notify.notify_one();
                return Fetched::Work(item);
            }

            let mut rx = self.change_tx.subscribe();
            tokio::select! {
                _ = notified => {}
                _ = rx.changed() => {}
            }
        }
    }

    /// Serial-phase fetch. The warmup cursor wraps; a cold fetch does
    /// not advance (the subsequent hot fetch of the same query does).
    ///
    /// The state snapshot is taken under the cursor lock so a
    /// concurrent [`begin_cold_pass`] cannot interleave between the
    /// two.
    fn fetch_serial(&self) -> Fetched {
        let mut serial = lock(&self.serial);
        let state = self.global_state();
        if serial.list.is_empty() {
            return Fetched::EndOfSerial;
        }
        if serial.idx >= serial.list.len() {
            if state != GlobalState::Warmup {
                return Fetched::EndOfSerial;
            }
            serial.idx = 0;
        }
        let type_id = serial.list[serial.idx];
        if state != GlobalState::ColdQuery {
            serial.idx += 1;
        }
        drop(serial);
        self.pending.fetch_add(1, Ordering::SeqCst);
        Fetched::Work(SubmittedProcedure::new(type_id, self.now_ns()))
    }

    /// One fetched work item has completed.
    pub fn finished_work(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                pending.checked_sub(1)
            });
        self.space_notify.notify_one();
    }

    pub fn pending_work(&self) -> u64 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Worker acknowledgement after observing `Done`.
    pub fn signal_done(&self) {
        self.workers_done.fetch_add(1, Ordering::SeqCst);
        self.done_notify.notify_waiters();
    }

    /// A serial phase exhausted its query list mid-measurement.
    pub fn signal_latency_complete(&self) {
        self.set_state(GlobalState::LatencyComplete);
    }

    /// The next serial query should run cold. Invoked by workers after
    /// each measured query; the cursor position is preserved.
    pub fn start_cold_query(&self) {
        self.set_state(GlobalState::ColdQuery);
    }

    /// The cold run finished; measure the same query hot.
    pub fn start_hot_query(&self) {
        self.set_state(GlobalState::Measure);
    }

    // ---- driver-facing operations -------------------------------------

    /// Arm the workers: install the first phase and release the start
    /// gate.
    pub fn start_run(&self, first_phase: Option<Arc<Phase>>) {
        self.advance_phase(first_phase);
        self.state
            .store(GlobalState::Warmup.as_u8(), Ordering::SeqCst);
        self.start_tx.send_replace(true);
        self.bump_change();
    }

    /// Open a latency phase's measured cold/hot cycle: rewind the
    /// serial cursor (warmup may have left it mid-list) and go cold.
    /// Driver-side counterpart of the workers' [`start_cold_query`].
    pub fn begin_cold_pass(&self) {
        // Held across the state flip so no fetch sees the new state
        // with the old cursor or vice versa.
        let mut serial = lock(&self.serial);
        serial.idx = 0;
        self.set_state(GlobalState::ColdQuery);
    }

    /// Install the next phase (or none). Stale queued work from the
    /// previous phase is dropped so fetches never cross phases.
    pub fn advance_phase(&self, next: Option<Arc<Phase>>) {
        {
            let mut phase = lock(&self.phase);
            let mut serial = lock(&self.serial);
            lock(&self.queue).clear();
            *serial = match next.as_deref() {
                Some(p) if p.is_latency_run() => SerialCursor {
                    idx: 0,
                    list: p.active_type_ids(),
                },
                _ => SerialCursor::default(),
            };
            *phase = next;
        }
        self.bump_change();
        self.work_notify.notify_waiters();
        self.space_notify.notify_waiters();
    }

    /// Advance the global state. `Done` is terminal: once set, every
    /// later transition is ignored.
    pub fn set_state(&self, next: GlobalState) {
        let mut current = self.state.load(Ordering::SeqCst);
        loop {
            if GlobalState::from_u8(current) == GlobalState::Done {
                return;
            }
            match self.state.compare_exchange(
                current,
                next.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        debug!(state = %next, "Global state advanced");
        self.bump_change();
        self.work_notify.notify_waiters();
        self.space_notify.notify_waiters();
    }

    /// Pacer entry point: enqueue one work item, stamping its
    /// submission time after any backpressure wait. Returns `false`
    /// once the run is over.
    pub async fn submit_work(&self, type_id: usize) -> bool {
        loop {
            if self.global_state() == GlobalState::Done {
                return false;
            }
            let space = self.space_notify.notified();
            {
                let mut queue = lock(&self.queue);
                if queue.len() < RATE_QUEUE_LIMIT {
                    queue.push_back(SubmittedProcedure::new(type_id, self.now_ns()));
                    drop(queue);
                    self.work_notify.notify_one();
                    return true;
                }
            }
            let mut rx = self.change_tx.subscribe();
            tokio::select! {
                _ = space => {}
                _ = rx.changed() => {}
            }
        }
    }

    /// Wait until the state equals `target` (or the channel dies).
    pub async fn await_state(&self, target: GlobalState) {
        let mut rx = self.change_tx.subscribe();
        loop {
            if self.global_state() == target {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait until `count` workers have acknowledged `Done`.
    pub async fn await_workers_done(&self, count: usize) {
        loop {
            let notified = self.done_notify.notified();
            if self.workers_done.load(Ordering::SeqCst) >= count {
                return;
            }
            notified.await;
        }
    }

    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.change_tx.subscribe()
    }

    fn bump_change(&self) {
        self.change_tx.send_modify(|epoch| *epoch += 1);
    }
}

impl Default for WorkloadState {
    fn default() -> Self {
        Self::new()
    }
}
