use bench_runtime::error::RuntimeError;
use connectors::error::{ConnectorError, DbError};
use model::execution::config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read the configuration file: {0}")]
    ConfigFileRead(#[from] std::io::Error),

    #[error("Failed to parse the configuration file as JSON: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown benchmark: {0}")]
    UnknownBenchmark(String),

    #[error("Failed to run the benchmark: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Connector error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Failed to serialize the report to JSON: {0}")]
    JsonSerialize(serde_json::Error),

    #[error("Nothing to do: pass --create, --load and/or --execute")]
    NoAction,

    #[error("Shutdown requested")]
    ShutdownRequested,
}
