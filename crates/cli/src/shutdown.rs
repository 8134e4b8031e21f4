use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Standard exit code for a SIGINT-terminated process.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Maps operator signals onto the run lifecycle.
///
/// The first SIGINT or SIGTERM cancels the workload token: the driver
/// stops the phase schedule, cancels in-flight statements, drains the
/// workers and still reports whatever was measured. A second signal
/// means the operator does not want to wait for the drain; the process
/// exits immediately without a report.
#[derive(Clone)]
pub struct RunInterrupt {
    cancel_token: CancellationToken,
    interrupted: Arc<AtomicBool>,
}

impl RunInterrupt {
    pub fn new(cancel_token: CancellationToken) -> Self {
        Self {
            cancel_token,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn listen(&self, benchmark: &str) {
        let cancel_token = self.cancel_token.clone();
        let interrupted = self.interrupted.clone();
        let benchmark = benchmark.to_string();

        tokio::spawn(async move {
            next_signal().await;
            warn!(
                benchmark = %benchmark,
                "Interrupt received, draining workers; the report will cover what was measured"
            );
            interrupted.store(true, Ordering::SeqCst);
            cancel_token.cancel();

            next_signal().await;
            warn!(benchmark = %benchmark, "Second interrupt, aborting without a report");
            process::exit(EXIT_INTERRUPTED);
        });
    }

    /// Whether the run ended because of a signal rather than the phase
    /// schedule.
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}

/// Completes on the next SIGINT, or SIGTERM where that exists.
async fn next_signal() {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
