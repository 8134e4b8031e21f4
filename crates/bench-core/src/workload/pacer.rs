use crate::workload::WorkloadState;
use model::core::state::GlobalState;
use rand::Rng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Feeds throughput phases: picks transaction types by weight and
/// submits them at the phase's target rate, stamping each item's
/// submission time inside [`WorkloadState::submit_work`]. Latency
/// phases feed themselves from the serial cursor, so the pacer idles
/// through them.
pub async fn run_pacer(state: Arc<WorkloadState>, mut rng: StdRng, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() || state.global_state() == GlobalState::Done {
            debug!("Pacer stopping");
            return;
        }

        let global = state.global_state();
        let phase = state.current_phase();
        match phase {
            Some(phase)
                if !phase.is_latency_run()
                    && matches!(global, GlobalState::Warmup | GlobalState::Measure) =>
            {
                let type_id = choose_weighted(&mut rng, &phase.weights);
                if !state.submit_work(type_id).await {
                    return;
                }
                if let Some(interval) = phase.rate.submit_interval() {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = cancel.cancelled() => return,
                    }
                }
            }
            _ => {
                let mut rx = state.subscribe_changes();
                tokio::select! {
                    _ = rx.changed() => {}
                    _ = cancel.cancelled() => return,
                }
            }
        }
    }
}

/// Weighted pick over the phase mix; returns a 1-based type id.
/// Total weight is nonzero by config validation.
fn choose_weighted(rng: &mut StdRng, weights: &[u32]) -> usize {
    let total: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    let mut pick = rng.gen_range(0..total);
    for (idx, weight) in weights.iter().enumerate() {
        let weight = u64::from(*weight);
        if pick < weight {
            return idx + 1;
        }
        pick -= weight;
    }
    weights.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::Fetched;
    use model::core::phase::{Phase, PhaseKind, Rate};
    use rand::SeedableRng;
    use std::time::Duration;

    #[test]
    fn weighted_choice_skips_zero_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let picked = choose_weighted(&mut rng, &[0, 3, 0, 1]);
            assert!(picked == 2 || picked == 4, "picked type {picked}");
        }
    }

    #[test]
    fn weighted_choice_covers_the_whole_mix() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [false; 3];
        for _ in 0..1000 {
            seen[choose_weighted(&mut rng, &[1, 1, 1]) - 1] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[tokio::test]
    async fn pacer_feeds_a_throughput_phase() {
        let state = Arc::new(WorkloadState::new());
        state.start_run(Some(Arc::new(Phase {
            id: 1,
            kind: PhaseKind::Throughput,
            rate: Rate::Limited(10_000),
            weights: vec![1],
            duration_secs: 10,
        })));

        let cancel = CancellationToken::new();
        let pacer = tokio::spawn(run_pacer(
            state.clone(),
            StdRng::seed_from_u64(1),
            cancel.clone(),
        ));

        for _ in 0..3 {
            let fetched = tokio::time::timeout(Duration::from_secs(1), state.fetch_work())
                .await
                .expect("pacer produced work");
            match fetched {
                Fetched::Work(work) => {
                    assert_eq!(work.type_id, 1);
                    state.finished_work();
                }
                other => panic!("unexpected fetch result: {other:?}"),
            }
        }

        cancel.cancel();
        let _ = pacer.await;
    }
}
