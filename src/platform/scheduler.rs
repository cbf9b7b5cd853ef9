use crate::mission::Mission;
use futures_util::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use strum::Display;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

mod backoff;

pub use backoff::BackoffPolicy;

/// Outcomes starting with this marker are failures.
pub const ERROR_MARKER: &str = "Error:";

pub fn is_failure_outcome(outcome: &str) -> bool {
    outcome.starts_with(ERROR_MARKER)
}

/// Runs one pass of a mission and returns its outcome text.
///
/// Implemented for any `Fn(String) -> impl Future<Output = anyhow::Result<String>>`,
/// so the mission runner can be injected as a closure.
pub trait MissionExecutor: Send + Sync {
    fn execute(
        &self,
        mission_id: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'static>>;
}

impl<F, Fut> MissionExecutor for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<String>> + Send + 'static,
{
    fn execute(
        &self,
        mission_id: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'static>> {
        Box::pin(self(mission_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobPhase {
    Active,
    Succeeded,
    GaveUp,
    Cancelled,
}

/// Snapshot of the most recent supervision of a mission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub mission_id: String,
    pub phase: JobPhase,
    pub invocations: u64,
    /// Consecutive failed attempts; reset to 0 by a success.
    pub attempt: u32,
    pub last_outcome: Option<String>,
}

struct MissionJob {
    cancel: CancellationToken,
    status: Arc<Mutex<JobStatus>>,
    handle: Option<JoinHandle<()>>,
}

impl MissionJob {
    fn is_active(&self) -> bool {
        !self.cancel.is_cancelled() && lock(&self.status).phase == JobPhase::Active
    }
}

/// Supervises missions: one task per mission, a per-mission lease and
/// concurrency gate, and retries with exponential backoff.
///
/// Must be used from within a Tokio runtime. Dropping the scheduler cancels
/// every job without waiting; call [`MissionScheduler::shutdown`] to wait.
pub struct MissionScheduler {
    executor: Arc<dyn MissionExecutor>,
    backoff: BackoffPolicy,
    jobs: Mutex<HashMap<String, MissionJob>>,
    leases: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MissionScheduler {
    pub fn new<E>(executor: E) -> Self
    where
        E: MissionExecutor + 'static,
    {
        Self::with_backoff(executor, BackoffPolicy::default())
    }

    pub fn with_backoff<E>(executor: E, backoff: BackoffPolicy) -> Self
    where
        E: MissionExecutor + 'static,
    {
        Self {
            executor: Arc::new(executor),
            backoff,
            jobs: Mutex::new(HashMap::new()),
            leases: Mutex::new(HashMap::new()),
        }
    }

    /// Starts supervising a mission. Returns `false` without side effects
    /// when the mission is already supervised.
    ///
    /// `interval` of `None` (or zero) runs the mission once.
    pub fn schedule(
        &self,
        mission_id: &str,
        interval: Option<Duration>,
        retry_limit: u32,
        max_concurrency: u32,
    ) -> bool {
        let mut jobs = lock(&self.jobs);
        if jobs.get(mission_id).is_some_and(MissionJob::is_active) {
            return false;
        }

        let interval = interval.filter(|d| !d.is_zero());
        let max_concurrency = usize::try_from(max_concurrency.max(1)).unwrap_or(1);
        let status = Arc::new(Mutex::new(JobStatus {
            mission_id: mission_id.to_string(),
            phase: JobPhase::Active,
            invocations: 0,
            attempt: 0,
            last_outcome: None,
        }));
        let cancel = CancellationToken::new();
        let run = JobRun {
            mission_id: mission_id.to_string(),
            interval,
            retry_limit,
            executor: Arc::clone(&self.executor),
            backoff: self.backoff,
            lease: self.lease_for(mission_id),
            gate: Arc::new(Semaphore::new(max_concurrency)),
            cancel: cancel.clone(),
            status: Arc::clone(&status),
        };

        tracing::info!(
            mission_id,
            interval_secs = interval.map(|d| d.as_secs()),
            retry_limit,
            max_concurrency,
            "mission scheduled"
        );
        let handle = tokio::spawn(run.supervise());
        jobs.insert(
            mission_id.to_string(),
            MissionJob {
                cancel,
                status,
                handle: Some(handle),
            },
        );
        true
    }

    /// Schedules a mission with its own interval, retry and concurrency
    /// settings.
    pub fn schedule_mission(&self, mission: &Mission) -> bool {
        self.schedule(
            &mission.mission_id,
            mission.schedule_interval(),
            mission.retry_limit,
            mission.max_concurrency,
        )
    }

    /// Flags the job cancelled and waits for its task to exit. An in-flight
    /// executor call is allowed to finish first.
    ///
    /// Returns whether an active job was cancelled.
    pub async fn cancel(&self, mission_id: &str) -> bool {
        let handle = {
            let mut jobs = lock(&self.jobs);
            let Some(job) = jobs.get_mut(mission_id) else {
                return false;
            };
            if !job.is_active() {
                return false;
            }
            job.cancel.cancel();
            job.handle.take()
        };

        if let Some(handle) = handle
            && let Err(error) = handle.await
        {
            tracing::warn!(mission_id, %error, "mission supervisor task ended abnormally");
        }
        tracing::info!(mission_id, "mission unscheduled");
        true
    }

    pub fn is_scheduled(&self, mission_id: &str) -> bool {
        lock(&self.jobs)
            .get(mission_id)
            .is_some_and(MissionJob::is_active)
    }

    /// Ids of all actively supervised missions, sorted.
    pub fn scheduled_missions(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.jobs)
            .iter()
            .filter(|(_, job)| job.is_active())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn job_status(&self, mission_id: &str) -> Option<JobStatus> {
        lock(&self.jobs)
            .get(mission_id)
            .map(|job| lock(&job.status).clone())
    }

    /// Cancels every job, waits for all of them to stop, then clears the
    /// job and lease tables.
    ///
    /// Jobs scheduled while shutdown is waiting are cancelled as well. A
    /// lease still held by a task that a concurrent [`cancel`](Self::cancel)
    /// is draining stays in the table, so a later reschedule waits for it.
    pub async fn shutdown(&self) {
        loop {
            let handles: Vec<(String, JoinHandle<()>)> = {
                let mut jobs = lock(&self.jobs);
                let handles: Vec<_> = jobs
                    .iter_mut()
                    .filter_map(|(id, job)| {
                        job.cancel.cancel();
                        job.handle.take().map(|handle| (id.clone(), handle))
                    })
                    .collect();
                if handles.is_empty() {
                    jobs.clear();
                    lock(&self.leases).retain(|_, lease| Arc::strong_count(lease) > 1);
                    break;
                }
                handles
            };

            for (mission_id, handle) in handles {
                if let Err(error) = handle.await {
                    tracing::warn!(
                        mission_id = %mission_id,
                        %error,
                        "mission supervisor task ended abnormally"
                    );
                }
            }
        }
        tracing::info!("mission scheduler shut down");
    }

    fn lease_for(&self, mission_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(
            lock(&self.leases)
                .entry(mission_id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

impl Drop for MissionScheduler {
    fn drop(&mut self) {
        for job in lock(&self.jobs).values() {
            job.cancel.cancel();
        }
    }
}

struct JobRun {
    mission_id: String,
    interval: Option<Duration>,
    retry_limit: u32,
    executor: Arc<dyn MissionExecutor>,
    backoff: BackoffPolicy,
    lease: Arc<tokio::sync::Mutex<()>>,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
    status: Arc<Mutex<JobStatus>>,
}

impl JobRun {
    async fn supervise(self) {
        let mission_id = self.mission_id.as_str();
        let mut attempt: u32 = 0;

        let phase = loop {
            if self.cancel.is_cancelled() {
                break JobPhase::Cancelled;
            }

            let outcome = {
                let _lease = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => break JobPhase::Cancelled,
                    guard = self.lease.lock() => guard,
                };
                if self.cancel.is_cancelled() {
                    break JobPhase::Cancelled;
                }

                let _permit = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => break JobPhase::Cancelled,
                    permit = self.gate.acquire() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break JobPhase::Cancelled,
                    },
                };
                if self.cancel.is_cancelled() {
                    break JobPhase::Cancelled;
                }

                invoke(self.executor.as_ref(), mission_id).await
            };

            let failed = is_failure_outcome(&outcome);
            if failed {
                attempt = attempt.saturating_add(1);
            } else {
                attempt = 0;
            }
            self.record(&outcome, attempt);

            if failed {
                if attempt > self.retry_limit {
                    tracing::warn!(
                        mission_id,
                        retry_limit = self.retry_limit,
                        "mission exhausted retries, giving up"
                    );
                    break JobPhase::GaveUp;
                }
                let delay = self.backoff.delay(attempt - 1);
                tracing::info!(
                    mission_id,
                    attempt,
                    retry_limit = self.retry_limit,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "mission failed, retrying"
                );
                if !self.sleep_unless_cancelled(delay).await {
                    break JobPhase::Cancelled;
                }
                continue;
            }

            let Some(interval) = self.interval else {
                break JobPhase::Succeeded;
            };
            if !self.sleep_unless_cancelled(interval).await {
                break JobPhase::Cancelled;
            }
        };

        lock(&self.status).phase = phase;
        tracing::debug!(mission_id, phase = %phase, "mission supervision ended");
    }

    fn record(&self, outcome: &str, attempt: u32) {
        let mut status = lock(&self.status);
        status.invocations = status.invocations.saturating_add(1);
        status.attempt = attempt;
        status.last_outcome = Some(outcome.to_string());
    }

    /// Returns `false` if cancelled before the delay elapsed.
    async fn sleep_unless_cancelled(&self, delay: Duration) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

/// Runs the executor once. Errors and panics become failure outcomes.
async fn invoke(executor: &dyn MissionExecutor, mission_id: &str) -> String {
    let call = async { executor.execute(mission_id.to_string()).await };
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(error)) => {
            tracing::error!(mission_id, error = %error, "mission executor failed");
            format!("{ERROR_MARKER} unexpected exception: {error}")
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(mission_id, panic = %message, "mission executor panicked");
            format!("{ERROR_MARKER} unexpected exception: {message}")
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
