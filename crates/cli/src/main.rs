use crate::config::RunConfig;
use crate::error::CliError;
use crate::output::ReportSummary;
use crate::shutdown::{EXIT_INTERRUPTED, RunInterrupt};
use bench_core::benchmark::BenchmarkModule;
use clap::Parser;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};

mod benchmarks;
mod config;
mod error;
mod output;
mod shutdown;

#[derive(Parser)]
#[command(
    name = "benchpress",
    version = "0.1.0",
    about = "Multi-DBMS benchmark harness"
)]
struct Cli {
    /// Benchmark to run (e.g. ycsb-lite)
    #[arg(short = 'b', long = "bench")]
    benchmark: String,

    /// Path to the JSON run configuration
    #[arg(short = 'c', long = "config")]
    config: String,

    /// Create the benchmark schema (drops an existing one)
    #[arg(long)]
    create: bool,

    /// Load the benchmark data
    #[arg(long)]
    load: bool,

    /// Execute the workload
    #[arg(long)]
    execute: bool,

    /// If specified, writes the JSON report to this file
    #[arg(long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let exit_code = match run_cli().await {
        Ok(()) => 0,
        Err(CliError::ShutdownRequested) => {
            info!("Run stopped by operator");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            tracing::error!("Application error: {}", e);
            1
        }
    };

    process::exit(exit_code);
}

async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    if !cli.create && !cli.load && !cli.execute {
        return Err(CliError::NoAction);
    }

    let cancel = CancellationToken::new();
    let interrupt = RunInterrupt::new(cancel.clone());
    interrupt.listen(&cli.benchmark);

    let raw = tokio::fs::read_to_string(&cli.config).await?;
    let run_config = RunConfig::from_json(&raw, benchmarks::transaction_count(&cli.benchmark)?)?;
    let benchmark = benchmarks::build(&cli.benchmark, &run_config)?;

    if cli.create {
        info!(benchmark = %cli.benchmark, "Creating schema");
        benchmark.create_schema().await?;
    }
    if cli.load {
        info!(benchmark = %cli.benchmark, "Loading data");
        benchmark.load_data().await?;
    }
    if cli.execute {
        let module: Arc<dyn BenchmarkModule> = benchmark.clone();
        let results = bench_runtime::execution::executor::run(module, cancel.clone()).await?;

        let summary = ReportSummary::new(&cli.benchmark, &run_config.workload, &results);
        summary.log();
        if let Some(path) = &cli.output {
            summary.write(path).await?;
        }

        if interrupt.was_interrupted() {
            return Err(CliError::ShutdownRequested);
        }
    }

    Ok(())
}
