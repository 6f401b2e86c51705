//! Cron-driven job host
//!
//! Registered [`Job`]s are fired by a `tokio-cron-scheduler` instance: cron
//! specs in the configured timezone, `@every` specs as repeated jobs. A tick
//! runs on a separate task under a timeout and a child cancellation token,
//! so a hung or panicking job only loses that tick. Ticks of one job never
//! overlap.

use async_trait::async_trait;
use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler, JobSchedulerError};
use tracing::{error, info, info_span, warn, Instrument};

use super::cron::{CronSpec, Schedule};
use super::shutdown::ShutdownToken;
use crate::error::{LeagueError, Result};
use crate::supervisor::Worker;

/// Unit of scheduled work
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    /// One tick; should return promptly once `token` is cancelled
    async fn run(&self, token: ShutdownToken) -> Result<()>;
}

struct Entry {
    spec: CronSpec,
    job: Arc<dyn Job>,
}

/// Hosts a set of jobs as a single supervisor worker
pub struct Scheduler {
    tz: Tz,
    job_timeout: Duration,
    entries: Vec<Entry>,
}

fn scheduler_error(e: JobSchedulerError) -> LeagueError {
    LeagueError::Internal(format!("job scheduler: {}", e))
}

impl Scheduler {
    pub fn new(tz: Tz, job_timeout: Duration) -> Self {
        Self {
            tz,
            job_timeout,
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, spec: CronSpec, job: Arc<dyn Job>) {
        info!(job = %job.name(), spec = %spec, "Registered job");
        self.entries.push(Entry { spec, job });
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.job.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wrap `entry` as a scheduler job; every tick holds a read guard on `in_flight`
    fn cron_job(
        &self,
        entry: &Entry,
        token: &ShutdownToken,
        in_flight: &Arc<RwLock<()>>,
    ) -> Result<CronJob> {
        let job = Arc::clone(&entry.job);
        let running = Arc::new(AtomicBool::new(false));
        let timeout = self.job_timeout;
        let token = token.clone();
        let in_flight = Arc::clone(in_flight);

        let fire = move |_: uuid::Uuid, _: JobScheduler| {
            let job = Arc::clone(&job);
            let running = Arc::clone(&running);
            let token = token.clone();
            let in_flight = Arc::clone(&in_flight);
            Box::pin(async move {
                let _guard = in_flight.read().await;
                if token.is_cancelled() {
                    return;
                }
                if running.swap(true, Ordering::SeqCst) {
                    warn!(job = %job.name(), "Previous tick still running, skipping");
                    return;
                }

                let span = info_span!("job", job = %job.name());
                async {
                    info!("Tick started");
                    let result = execute_tick(Arc::clone(&job), token.child(), timeout).await;
                    log_tick(result);
                }
                .instrument(span)
                .await;
                running.store(false, Ordering::SeqCst);
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
        };

        match entry.spec.schedule() {
            Schedule::Cron(expression) => {
                CronJob::new_async_tz(expression.as_str(), self.tz, fire)
            }
            Schedule::Every(interval) => CronJob::new_repeated_async(*interval, fire),
        }
        .map_err(scheduler_error)
    }
}

#[async_trait]
impl Worker for Scheduler {
    fn name(&self) -> &str {
        "scheduler"
    }

    async fn run(&self, token: ShutdownToken) -> Result<()> {
        let in_flight = Arc::new(RwLock::new(()));
        let mut cron = JobScheduler::new().await.map_err(scheduler_error)?;
        for entry in &self.entries {
            cron.add(self.cron_job(entry, &token, &in_flight)?)
                .await
                .map_err(scheduler_error)?;
        }
        cron.start().await.map_err(scheduler_error)?;

        token.cancelled().await;
        if let Err(e) = cron.shutdown().await {
            error!(error = %e, "Job scheduler did not shut down cleanly");
        }

        // Let running ticks observe cancellation and finish
        let _ = in_flight.write().await;
        Ok(())
    }
}

/// Run one tick under `timeout`, converting panics and timeouts to `Transient`
pub async fn execute_tick(
    job: Arc<dyn Job>,
    token: ShutdownToken,
    timeout: Duration,
) -> Result<()> {
    let mut handle = {
        let token = token.clone();
        tokio::spawn(async move { job.run(token).await })
    };

    let outcome = tokio::select! {
        res = tokio::time::timeout(timeout, &mut handle) => res,
        _ = token.cancelled() => {
            handle.abort();
            return Err(LeagueError::Transient("tick cancelled by shutdown".into()));
        }
    };

    match outcome {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) if join_err.is_panic() => Err(LeagueError::Transient(format!(
            "tick panicked: {}",
            panic_message(join_err)
        ))),
        Ok(Err(join_err)) => Err(LeagueError::Transient(format!(
            "tick aborted: {}",
            join_err
        ))),
        Err(_) => {
            token.cancel();
            handle.abort();
            Err(LeagueError::Transient(format!(
                "tick exceeded {}s budget",
                timeout.as_secs_f64()
            )))
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// One log line per error; aggregates are expanded
fn log_tick(result: Result<()>) {
    match result {
        Ok(()) => info!("Tick complete"),
        Err(e) => {
            for err in e.flatten() {
                if err.is_transient() {
                    warn!(error = %err, "Tick failed, will retry on next run");
                } else {
                    error!(error = %err, "Tick failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        runs: AtomicUsize,
        sleep: Duration,
    }

    #[async_trait]
    impl Job for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self, _token: ShutdownToken) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.sleep).await;
            Ok(())
        }
    }

    struct Panicky;

    #[async_trait]
    impl Job for Panicky {
        fn name(&self) -> &str {
            "panicky"
        }

        async fn run(&self, _token: ShutdownToken) -> Result<()> {
            panic!("job blew up");
        }
    }

    #[tokio::test]
    async fn test_panic_becomes_transient() {
        let err = execute_tick(Arc::new(Panicky), ShutdownToken::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(&err, LeagueError::Transient(msg) if msg.contains("job blew up")));
    }

    #[tokio::test]
    async fn test_timeout_becomes_transient() {
        let job = Arc::new(Counting {
            runs: AtomicUsize::new(0),
            sleep: Duration::from_secs(10),
        });
        let token = ShutdownToken::new();
        let err = execute_tick(job, token.clone(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_error_passes_through() {
        struct Failing;

        #[async_trait]
        impl Job for Failing {
            fn name(&self) -> &str {
                "failing"
            }

            async fn run(&self, _token: ShutdownToken) -> Result<()> {
                Err(LeagueError::UnknownTeam("ZZZ".into()))
            }
        }

        let err = execute_tick(Arc::new(Failing), ShutdownToken::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::UnknownTeam(_)));
    }

    #[tokio::test]
    async fn test_ticks_never_overlap() {
        let job = Arc::new(Counting {
            runs: AtomicUsize::new(0),
            sleep: Duration::from_millis(1500),
        });
        let mut scheduler = Scheduler::new(chrono_tz::UTC, Duration::from_secs(5));
        scheduler.register(CronSpec::parse("@every 1s").unwrap(), job.clone());
        assert_eq!(scheduler.job_names(), vec!["counting"]);

        let token = ShutdownToken::new();
        let host = {
            let token = token.clone();
            tokio::spawn(async move { scheduler.run(token).await })
        };

        // Fires at ~1s (runs until ~2.5s); the ~2s fire is skipped
        tokio::time::sleep(Duration::from_millis(2300)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        token.cancel();
        tokio::time::timeout(Duration::from_secs(3), host)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
