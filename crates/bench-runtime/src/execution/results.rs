use crate::execution::worker::WorkerOutput;
use bench_core::histogram::Histogram;
use model::core::transaction::TransactionType;
use model::execution::sample::Sample;
use std::collections::BTreeMap;

/// Aggregate of every worker's histograms and latency samples,
/// assembled by the driver once all workers have stopped.
#[derive(Debug, Default)]
pub struct BenchmarkResults {
    pub txn_success: Histogram<TransactionType>,
    pub txn_abort: Histogram<TransactionType>,
    pub txn_retry: Histogram<TransactionType>,
    pub txn_errors: Histogram<TransactionType>,
    pub txn_abort_messages: BTreeMap<TransactionType, Histogram<String>>,
    pub samples: Vec<Sample>,
}

impl BenchmarkResults {
    pub fn merge_worker(&mut self, output: WorkerOutput) {
        self.txn_success.merge(&output.stats.txn_success);
        self.txn_abort.merge(&output.stats.txn_abort);
        self.txn_retry.merge(&output.stats.txn_retry);
        self.txn_errors.merge(&output.stats.txn_errors);
        for (txn_type, messages) in output.stats.txn_abort_messages {
            self.txn_abort_messages
                .entry(txn_type)
                .or_default()
                .merge(&messages);
        }
        self.samples.extend(output.latencies.into_samples());
    }

    /// Samples ordered by submission time, for percentile computation
    /// and serialization.
    pub fn sorted_samples(&mut self) -> &[Sample] {
        self.samples.sort_by_key(|s| s.start_ns);
        &self.samples
    }

    pub fn total_requests(&self) -> u64 {
        self.txn_success.total() + self.txn_abort.total() + self.txn_errors.total()
    }

    /// Latency at `quantile` (0.0–1.0) across all samples, in
    /// nanoseconds.
    pub fn latency_quantile_ns(&self, quantile: f64) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut latencies: Vec<u64> = self.samples.iter().map(Sample::latency_ns).collect();
        latencies.sort_unstable();
        let rank = ((latencies.len() - 1) as f64 * quantile.clamp(0.0, 1.0)).round() as usize;
        Some(latencies[rank])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::latency::LatencyRecord;

    use crate::execution::worker::WorkerStats;

    fn output(type_id: usize, latency_ns: u64) -> WorkerOutput {
        let mut stats = WorkerStats::default();
        stats.txn_success.add(TransactionType::new(type_id, "t"));
        let mut latencies = LatencyRecord::new();
        latencies.append(type_id, 0, latency_ns, 0, 1);
        WorkerOutput { stats, latencies }
    }

    #[test]
    fn merges_workers_and_computes_quantiles() {
        let mut results = BenchmarkResults::default();
        results.merge_worker(output(1, 100));
        results.merge_worker(output(1, 300));
        results.merge_worker(output(2, 200));

        assert_eq!(results.txn_success.get(&TransactionType::new(1, "t")), 2);
        assert_eq!(results.txn_success.get(&TransactionType::new(2, "t")), 1);
        assert_eq!(results.total_requests(), 3);
        assert_eq!(results.latency_quantile_ns(0.0), Some(100));
        assert_eq!(results.latency_quantile_ns(0.5), Some(200));
        assert_eq!(results.latency_quantile_ns(1.0), Some(300));
        assert_eq!(results.samples.len(), 3);
    }

    #[test]
    fn quantile_on_empty_results_is_none() {
        let results = BenchmarkResults::default();
        assert_eq!(results.latency_quantile_ns(0.95), None);
    }
}
