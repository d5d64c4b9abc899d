//! Archive Transfer Job
//!
//! Runs the archive transfer on a fixed period:
//! - every 15 minutes (configurable), first run on startup
//! - a failed run is retried twice with a one minute delay
//! - missed periods are skipped, not caught up
//! - runs are awaited inline, so two runs never overlap
//!
//! Supports graceful shutdown via SIGINT.

use std::future::{Future, pending};
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::services::archiver::{Archiver, TransferOutcome};
use crate::services::sample_store::{ArchiveSampleStore, LiveSampleStore};
use crate::services::transfer_status::{TaskState, TransferStatusRecorder};

/// Workflow name, also the key of the status row
pub const JOB_NAME: &str = "ultra_simple_bitcoin_transfer";

/// The single task in the workflow
pub const TASK_ID: &str = "transfer_all";

/// Default period between runs (15 minutes)
pub const DEFAULT_PERIOD_SECS: u64 = 900;

/// Default retries after a failed attempt
pub const DEFAULT_RETRIES: u32 = 2;

/// Default delay before a retry (1 minute)
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct TransferSchedule {
    pub period: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
    /// Start the first run immediately instead of after one period
    pub run_on_start: bool,
}

impl Default for TransferSchedule {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(DEFAULT_PERIOD_SECS),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            run_on_start: true,
        }
    }
}

/// Final state of one scheduled run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: TaskState,
    pub attempts: u32,
    pub outcome: Option<TransferOutcome>,
    pub last_error: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Archive transfer failed after {attempts} attempts: {message}")]
pub struct TransferFailed {
    pub attempts: u32,
    pub message: String,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == TaskState::Success
    }

    /// `Err` unless the run finished in [`TaskState::Success`]
    pub fn into_result(self) -> Result<Option<TransferOutcome>, TransferFailed> {
        if self.succeeded() {
            return Ok(self.outcome);
        }

        Err(TransferFailed {
            attempts: self.attempts,
            message: self
                .last_error
                .unwrap_or_else(|| format!("run ended in state {}", self.state)),
        })
    }
}

async fn transition(
    recorder: Option<&TransferStatusRecorder>,
    state: TaskState,
    rows_moved: u64,
    error: Option<&str>,
) {
    if let Some(recorder) = recorder {
        if let Err(e) = recorder.record(state, rows_moved, error).await {
            warn!(state = %state, error = %e, "Failed to record transfer status");
        }
    }
}

/// Run one transfer, retrying failed attempts per `schedule`
pub async fn run_with_retries<L, A>(
    archiver: &Archiver<L, A>,
    schedule: &TransferSchedule,
    recorder: Option<&TransferStatusRecorder>,
) -> RunReport
where
    L: LiveSampleStore,
    A: ArchiveSampleStore,
{
    let never = pending::<()>();
    tokio::pin!(never);

    match run_attempts(archiver, schedule, recorder, never).await {
        Some(report) => report,
        None => unreachable!("pending shutdown resolved"),
    }
}

/// Retry loop; returns `None` if `shutdown` fires while waiting to retry
async fn run_attempts<L, A, F>(
    archiver: &Archiver<L, A>,
    schedule: &TransferSchedule,
    recorder: Option<&TransferStatusRecorder>,
    mut shutdown: Pin<&mut F>,
) -> Option<RunReport>
where
    L: LiveSampleStore,
    A: ArchiveSampleStore,
    F: Future<Output = ()>,
{
    let max_attempts = schedule.retries + 1;
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        info!(
            job = JOB_NAME,
            task = TASK_ID,
            attempt = attempt,
            max_attempts = max_attempts,
            "Transfer attempt started"
        );
        transition(recorder, TaskState::Running, 0, None).await;

        match archiver.run_once().await {
            Ok(outcome) => {
                info!(
                    job = JOB_NAME,
                    attempt = attempt,
                    moved = outcome.moved(),
                    "Transfer run succeeded"
                );
                transition(recorder, TaskState::Success, outcome.moved() as u64, None).await;

                return Some(RunReport {
                    state: TaskState::Success,
                    attempts: attempt,
                    outcome: Some(outcome),
                    last_error: None,
                });
            }
            Err(e) => {
                let message = e.to_string();

                if attempt < max_attempts {
                    warn!(
                        job = JOB_NAME,
                        attempt = attempt,
                        error = %e,
                        retry_in_secs = schedule.retry_delay.as_secs(),
                        "Transfer attempt failed, will retry"
                    );
                    transition(recorder, TaskState::UpForRetry, 0, Some(&message)).await;

                    tokio::select! {
                        _ = shutdown.as_mut() => {
                            info!(job = JOB_NAME, attempt = attempt, "Shutdown during retry wait");
                            return None;
                        }
                        _ = tokio::time::sleep(schedule.retry_delay) => {}
                    }
                } else {
                    error!(
                        job = JOB_NAME,
                        attempts = attempt,
                        error = %e,
                        "Transfer run failed after all retries"
                    );
                    transition(recorder, TaskState::Failed, 0, Some(&message)).await;
                }

                last_error = Some(message);
            }
        }
    }

    Some(RunReport {
        state: TaskState::Failed,
        attempts: max_attempts,
        outcome: None,
        last_error,
    })
}

/// Start the archive transfer schedule and run until ctrl-c
pub async fn run_archive_transfer_job<L, A>(
    archiver: Archiver<L, A>,
    schedule: TransferSchedule,
    recorder: Option<TransferStatusRecorder>,
) where
    L: LiveSampleStore,
    A: ArchiveSampleStore,
{
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    run_archive_transfer_job_until(archiver, schedule, recorder, shutdown).await;
}

/// Run the schedule until `shutdown` resolves; returns the number of runs
pub async fn run_archive_transfer_job_until<L, A, F>(
    archiver: Archiver<L, A>,
    schedule: TransferSchedule,
    recorder: Option<TransferStatusRecorder>,
    shutdown: F,
) -> u64
where
    L: LiveSampleStore,
    A: ArchiveSampleStore,
    F: Future<Output = ()>,
{
    info!(
        job = JOB_NAME,
        period_secs = schedule.period.as_secs(),
        retries = schedule.retries,
        retry_delay_secs = schedule.retry_delay.as_secs(),
        "Initializing archive transfer job"
    );

    tokio::pin!(shutdown);

    let mut ticker = interval(schedule.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if !schedule.run_on_start {
        // The first tick completes immediately
        ticker.tick().await;
    }

    let mut runs = 0u64;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping archive transfer job gracefully");
                break;
            }
            _ = ticker.tick() => {
                runs += 1;
                transition(recorder.as_ref(), TaskState::Scheduled, 0, None).await;

                let Some(report) =
                    run_attempts(&archiver, &schedule, recorder.as_ref(), shutdown.as_mut()).await
                else {
                    info!("Shutdown signal received, stopping archive transfer job gracefully");
                    break;
                };
                if !report.succeeded() {
                    error!(
                        job = JOB_NAME,
                        attempts = report.attempts,
                        error = ?report.last_error,
                        "Scheduled transfer failed, waiting for next period"
                    );
                }
            }
        }
    }

    info!(runs = runs, "Archive transfer job stopped");
    runs
}
