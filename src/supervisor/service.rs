//! Worker supervision with graceful shutdown
//!
//! A [`Service`] runs every [`Worker`] concurrently until either an OS signal
//! arrives or a worker fails. It then cancels the shared token, asks each
//! worker to halt, and gives them the grace period to return.

use async_trait::async_trait;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::coordination::shutdown::{shutdown_signal, ShutdownToken};
use crate::error::{LeagueError, Result};

/// A long-running unit of work owned by a [`Service`]
#[async_trait]
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    /// Run until `token` is cancelled or the work is done
    async fn run(&self, token: ShutdownToken) -> Result<()>;

    /// Ask a running worker to wind down
    async fn halt(&self) -> Result<()> {
        Ok(())
    }
}

pub struct Service {
    name: String,
    grace_period: Duration,
    workers: Vec<Arc<dyn Worker>>,
}

impl Service {
    pub fn new(name: impl Into<String>, grace_period: Duration) -> Self {
        Self {
            name: name.into(),
            grace_period,
            workers: Vec::new(),
        }
    }

    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn worker_names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name()).collect()
    }

    /// Run until SIGINT/SIGTERM or a worker failure; returns the process exit code
    pub async fn run_all(&self) -> i32 {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `trigger` resolves or a worker failure; returns the process exit code
    pub async fn run_until<F>(&self, trigger: F) -> i32
    where
        F: Future + Send,
    {
        let root = ShutdownToken::new();
        let mut tasks = JoinSet::new();

        info!(service = %self.name, workers = self.workers.len(), "Starting service");
        for worker in &self.workers {
            let worker = Arc::clone(worker);
            let token = root.child();
            tasks.spawn(async move {
                let name = worker.name().to_string();
                let result = worker.run(token).await;
                (name, result)
            });
        }

        let mut failed = false;
        tokio::pin!(trigger);

        loop {
            tokio::select! {
                _ = &mut trigger => {
                    info!(service = %self.name, "Shutdown triggered");
                    break;
                }
                joined = tasks.join_next() => match joined {
                    None => {
                        info!(service = %self.name, "All workers finished");
                        break;
                    }
                    Some(outcome) => {
                        if !record_outcome(outcome) {
                            failed = true;
                            break;
                        }
                    }
                }
            }
        }

        root.cancel();

        let halts = join_all(self.workers.iter().map(|w| async move {
            if let Err(e) = w.halt().await {
                error!(worker = %w.name(), error = %e, "Worker halt failed");
                return false;
            }
            true
        }));

        let drain = async {
            let halted = halts.await.into_iter().all(|ok| ok);
            let mut clean = halted;
            while let Some(outcome) = tasks.join_next().await {
                clean &= record_outcome(outcome);
            }
            clean
        };

        match tokio::time::timeout(self.grace_period, drain).await {
            Ok(clean) => failed |= !clean,
            Err(_) => {
                warn!(
                    service = %self.name,
                    grace_secs = self.grace_period.as_secs_f64(),
                    "Workers did not stop within grace period"
                );
                failed = true;
            }
        }
        tasks.abort_all();

        let code = if failed { 1 } else { 0 };
        info!(service = %self.name, exit_code = code, "Service stopped");
        code
    }
}

/// Log a finished worker; `false` when it failed
fn record_outcome(
    outcome: std::result::Result<(String, Result<()>), tokio::task::JoinError>,
) -> bool {
    match outcome {
        Ok((name, Ok(()))) => {
            info!(worker = %name, "Worker stopped");
            true
        }
        Ok((name, Err(e))) => {
            for err in e.flatten() {
                error!(worker = %name, error = %err, "Worker failed");
            }
            false
        }
        Err(join_err) => {
            let err = LeagueError::Transient(format!("worker task aborted: {}", join_err));
            error!(error = %err, "Worker panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runs until cancelled; halts after `halt_delay`
    struct Idle {
        halt_delay: Duration,
        halted: AtomicUsize,
    }

    impl Idle {
        fn new(halt_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                halt_delay,
                halted: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Worker for Idle {
        fn name(&self) -> &str {
            "idle"
        }

        async fn run(&self, token: ShutdownToken) -> Result<()> {
            token.cancelled().await;
            Ok(())
        }

        async fn halt(&self) -> Result<()> {
            tokio::time::sleep(self.halt_delay).await;
            self.halted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Worker for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self, _token: ShutdownToken) -> Result<()> {
            Err(LeagueError::Internal("boom".into()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Worker for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn run(&self, _token: ShutdownToken) -> Result<()> {
            panic!("worker exploded");
        }
    }

    #[tokio::test]
    async fn test_clean_shutdown_exits_zero() {
        let idle = Idle::new(Duration::ZERO);
        let service = Service::new("test", Duration::from_secs(1))
            .with_worker(idle.clone())
            .with_worker(Idle::new(Duration::ZERO));

        let code = service.run_until(tokio::time::sleep(Duration::from_millis(20))).await;
        assert_eq!(code, 0);
        assert_eq!(idle.halted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_error_stops_everyone() {
        let idle = Idle::new(Duration::ZERO);
        let service = Service::new("test", Duration::from_secs(1))
            .with_worker(idle.clone())
            .with_worker(Arc::new(Failing));

        let code = service.run_until(std::future::pending::<()>()).await;
        assert_eq!(code, 1);
        assert_eq!(idle.halted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let service = Service::new("test", Duration::from_secs(1))
            .with_worker(Idle::new(Duration::ZERO))
            .with_worker(Arc::new(Panicking));

        assert_eq!(service.run_until(std::future::pending::<()>()).await, 1);
    }

    #[tokio::test]
    async fn test_slow_halt_exceeds_grace() {
        let service = Service::new("test", Duration::from_millis(50))
            .with_worker(Idle::new(Duration::from_secs(5)));

        let started = std::time::Instant::now();
        let code = service.run_until(async {}).await;
        assert_eq!(code, 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
