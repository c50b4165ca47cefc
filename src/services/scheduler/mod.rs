//! Cron dispatcher driving the built-in jobs (§4.D). One long-lived
//! dispatcher loop decides when each job is due and hands it to a bounded
//! worker pool; a job already running is never re-entered (skip-if-running),
//! and rate-limit annotations gate enqueue, not execution.

pub mod jobs;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::services::integrations::rate_limit::RateLimiter;

pub use jobs::{build_job_table, SchedulerContext};

/// Pool size from §4.D: default 4 concurrent job executions.
const POOL_SIZE: usize = 4;
/// Soft/hard per-task time limits from §4.D.
const SOFT_TIME_LIMIT: Duration = Duration::from_secs(55 * 60);
const HARD_TIME_LIMIT: Duration = Duration::from_secs(60 * 60);
/// Grace period given to in-flight tasks on shutdown before they're aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
/// How often the dispatcher loop checks for due jobs.
const TICK_INTERVAL: Duration = Duration::from_secs(15);

/// Structured per-job outcome, logged at job completion (never user-facing).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobOutcome {
    pub processed: i64,
    pub grabbed: i64,
    pub errors: i64,
}

type HandlerFn = Arc<
    dyn Fn(SchedulerContext) -> Pin<Box<dyn Future<Output = JobOutcome> + Send>> + Send + Sync,
>;

pub struct JobDefinition {
    pub name: &'static str,
    pub schedule: Schedule,
    pub rate_limit: Option<RateLimiter>,
    pub handler: HandlerFn,
    running: Arc<AtomicBool>,
}

impl JobDefinition {
    pub fn new(
        name: &'static str,
        cron_expr: &str,
        rate_limit: Option<RateLimiter>,
        handler: HandlerFn,
    ) -> Self {
        let schedule = Schedule::try_from(cron_expr)
            .unwrap_or_else(|e| panic!("invalid cron expression for job {name}: {e}"));
        Self {
            name,
            schedule,
            rate_limit,
            handler,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_due(&self, last_tick: chrono::DateTime<Utc>) -> bool {
        self.schedule
            .after(&last_tick)
            .next()
            .map(|next| next <= Utc::now())
            .unwrap_or(false)
    }
}

/// Owns the job table and drives the tick loop. One instance per process;
/// single active-instance assumed (no distributed coordination).
pub struct Dispatcher {
    jobs: Vec<JobDefinition>,
    context: SchedulerContext,
    semaphore: Arc<Semaphore>,
    shutdown: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(jobs: Vec<JobDefinition>, context: SchedulerContext) -> Self {
        Self {
            jobs,
            context,
            semaphore: Arc::new(Semaphore::new(POOL_SIZE)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Runs until `shutdown_handle().notify_one()` is called, then waits out
    /// the grace period for in-flight tasks before aborting the rest.
    pub async fn run(self) {
        let mut last_tick: HashMap<&'static str, chrono::DateTime<Utc>> = HashMap::new();
        for job in &self.jobs {
            last_tick.insert(job.name, Utc::now());
        }

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!("scheduler shutting down, waiting up to {:?} for in-flight jobs", SHUTDOWN_GRACE);
                    let grace = tokio::time::sleep(SHUTDOWN_GRACE);
                    tokio::pin!(grace);
                    tokio::select! {
                        _ = drain(&mut in_flight) => {}
                        _ = &mut grace => {
                            warn!(remaining = in_flight.len(), "grace period elapsed, aborting remaining jobs");
                            in_flight.abort_all();
                        }
                    }
                    break;
                }
                _ = ticker.tick() => {
                    for job in &self.jobs {
                        let since = *last_tick.get(job.name).unwrap_or(&Utc::now());
                        if !job.is_due(since) {
                            continue;
                        }
                        last_tick.insert(job.name, Utc::now());

                        if job.running.swap(true, Ordering::SeqCst) {
                            debug!(job = job.name, "skipping tick, job already running");
                            continue;
                        }

                        if let Some(limiter) = &job.rate_limit {
                            limiter.acquire().await;
                        }

                        let Ok(permit) = self.semaphore.clone().acquire_owned().await else {
                            job.running.store(false, Ordering::SeqCst);
                            continue;
                        };

                        let handler = job.handler.clone();
                        let context = self.context.clone();
                        let running = job.running.clone();
                        let name = job.name;

                        in_flight.spawn(async move {
                            let _permit = permit;
                            let started = tokio::time::Instant::now();

                            let outcome = match tokio::time::timeout(HARD_TIME_LIMIT, handler(context)).await {
                                Ok(outcome) => outcome,
                                Err(_) => {
                                    warn!(job = name, "hard time limit exceeded, job aborted");
                                    JobOutcome::default()
                                }
                            };

                            if started.elapsed() > SOFT_TIME_LIMIT {
                                warn!(job = name, elapsed_secs = started.elapsed().as_secs(), "soft time limit exceeded");
                            }

                            info!(
                                job = name,
                                processed = outcome.processed,
                                grabbed = outcome.grabbed,
                                errors = outcome.errors,
                                "job completed"
                            );

                            running.store(false, Ordering::SeqCst);
                        });
                    }
                }
            }
        }
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while tasks.join_next().await.is_some() {}
}
