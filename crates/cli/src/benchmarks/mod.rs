pub mod ycsb;

use crate::config::RunConfig;
use crate::error::CliError;
use async_trait::async_trait;
use bench_core::benchmark::BenchmarkModule;
use std::sync::Arc;

/// A benchmark the CLI can drive end to end: the worker-pool contract
/// plus schema creation and bulk loading.
#[async_trait]
pub trait CliBenchmark: BenchmarkModule {
    async fn create_schema(&self) -> Result<(), CliError>;
    async fn load_data(&self) -> Result<(), CliError>;
}

/// Number of transaction types the named benchmark registers; the
/// phase weight vectors must match it.
pub fn transaction_count(name: &str) -> Result<usize, CliError> {
    match name {
        "ycsb" | "ycsb-lite" => Ok(ycsb::TRANSACTION_COUNT),
        other => Err(CliError::UnknownBenchmark(other.to_string())),
    }
}

pub fn build(name: &str, config: &RunConfig) -> Result<Arc<dyn CliBenchmark>, CliError> {
    match name {
        "ycsb" | "ycsb-lite" => Ok(Arc::new(ycsb::YcsbBenchmark::new(config))),
        other => Err(CliError::UnknownBenchmark(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_rejects_unknown_benchmarks() {
        assert!(matches!(
            transaction_count("tpcc"),
            Err(CliError::UnknownBenchmark(_))
        ));
        assert_eq!(transaction_count("ycsb-lite").unwrap(), 5);
    }
}
