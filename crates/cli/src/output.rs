use crate::error::CliError;
use bench_runtime::execution::results::BenchmarkResults;
use model::execution::config::WorkloadConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Flattened, serializable view of a finished run.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub benchmark: String,
    pub db_type: String,
    pub terminals: usize,
    pub total_requests: u64,
    pub measured_samples: usize,
    pub success: BTreeMap<String, u64>,
    pub aborts: BTreeMap<String, u64>,
    pub retries: BTreeMap<String, u64>,
    pub errors: BTreeMap<String, u64>,
    pub abort_messages: BTreeMap<String, BTreeMap<String, u64>>,
    pub latency_ms: LatencySummary,
}

#[derive(Debug, Serialize, Default)]
pub struct LatencySummary {
    pub p50: Option<f64>,
    pub p95: Option<f64>,
    pub p99: Option<f64>,
}

fn to_ms(ns: u64) -> f64 {
    ns as f64 / 1_000_000.0
}

impl ReportSummary {
    pub fn new(benchmark: &str, config: &WorkloadConfig, results: &BenchmarkResults) -> Self {
        let named = |histogram: &bench_core::histogram::Histogram<
            model::core::transaction::TransactionType,
        >| {
            histogram
                .iter()
                .map(|(t, n)| (t.name().to_string(), n))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            benchmark: benchmark.to_string(),
            db_type: config.db_type.to_string(),
            terminals: config.terminals,
            total_requests: results.total_requests(),
            measured_samples: results.samples.len(),
            success: named(&results.txn_success),
            aborts: named(&results.txn_abort),
            retries: named(&results.txn_retry),
            errors: named(&results.txn_errors),
            abort_messages: results
                .txn_abort_messages
                .iter()
                .map(|(t, h)| {
                    (
                        t.name().to_string(),
                        h.iter().map(|(m, n)| (m.clone(), n)).collect(),
                    )
                })
                .collect(),
            latency_ms: LatencySummary {
                p50: results.latency_quantile_ns(0.50).map(to_ms),
                p95: results.latency_quantile_ns(0.95).map(to_ms),
                p99: results.latency_quantile_ns(0.99).map(to_ms),
            },
        }
    }

    pub fn log(&self) {
        info!(
            benchmark = %self.benchmark,
            db = %self.db_type,
            requests = self.total_requests,
            samples = self.measured_samples,
            p50_ms = self.latency_ms.p50,
            p95_ms = self.latency_ms.p95,
            p99_ms = self.latency_ms.p99,
            "Run summary"
        );
        for (txn, count) in &self.success {
            info!(txn = %txn, count, "Committed");
        }
        for (txn, count) in &self.aborts {
            info!(txn = %txn, count, "User-aborted");
        }
        for (txn, count) in &self.errors {
            info!(txn = %txn, count, "Errored");
        }
    }

    pub async fn write(&self, path: &str) -> Result<(), CliError> {
        let json = serde_json::to_string_pretty(self).map_err(CliError::JsonSerialize)?;
        tokio::fs::write(path, json).await?;
        info!(path, "Report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::histogram::Histogram;
    use model::core::db::{DatabaseType, IsolationLevel};
    use model::core::transaction::TransactionType;
    use model::execution::sample::Sample;

    #[test]
    fn summarizes_results_by_transaction_name() {
        let mut results = BenchmarkResults::default();
        let read = TransactionType::new(1, "ReadRecord");
        results.txn_success.add_n(read.clone(), 10);
        results.txn_retry.add(read.clone());
        let mut messages = Histogram::new();
        messages.add("conflict".to_string());
        results.txn_abort_messages.insert(read, messages);
        for latency in [1_000_000u64, 2_000_000, 3_000_000] {
            results.samples.push(Sample {
                type_id: 1,
                start_ns: 0,
                end_ns: latency,
                worker_id: 0,
                phase_id: 1,
            });
        }

        let config = WorkloadConfig {
            db_type: DatabaseType::Postgres,
            url: String::new(),
            isolation: IsolationLevel::Serializable,
            terminals: 2,
            record_abort_messages: true,
            warmup_secs: 0,
            phases: Vec::new(),
        };
        let summary = ReportSummary::new("ycsb-lite", &config, &results);

        assert_eq!(summary.success.get("ReadRecord"), Some(&10));
        assert_eq!(summary.retries.get("ReadRecord"), Some(&1));
        assert_eq!(summary.latency_ms.p50, Some(2.0));
        assert_eq!(
            summary.abort_messages["ReadRecord"].get("conflict"),
            Some(&1)
        );
        assert_eq!(summary.measured_samples, 3);
    }
}
