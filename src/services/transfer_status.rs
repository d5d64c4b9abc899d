//! Transfer status service for tracking scheduled archive runs
//!
//! Keeps one row per job with its last task state, attempt/success times and
//! running counters, so an operator can see how the schedule is doing without
//! reading logs.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter,
};

use crate::entities::transfer_status::{self, Entity as TransferStatus};

/// States a scheduled transfer moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Scheduled,
    Running,
    UpForRetry,
    Success,
    /// Final failure after all retries
    Failed,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Scheduled => "scheduled",
            TaskState::Running => "running",
            TaskState::UpForRetry => "up_for_retry",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct TransferStatusRecorder {
    db: Arc<DatabaseConnection>,
    job_name: String,
}

impl TransferStatusRecorder {
    pub fn new(db: Arc<DatabaseConnection>, job_name: impl Into<String>) -> Self {
        Self {
            db,
            job_name: job_name.into(),
        }
    }

    pub async fn ensure_table(&self) -> Result<(), DbErr> {
        let backend = self.db.get_database_backend();
        self.db
            .execute(backend.build(&migration::transfer_status_table()))
            .await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<Option<transfer_status::Model>, DbErr> {
        TransferStatus::find()
            .filter(transfer_status::Column::JobName.eq(&self.job_name))
            .one(self.db.as_ref())
            .await
    }

    /// Record a state transition
    ///
    /// `rows_moved` is added to the running total on success; `error` is kept
    /// as `last_error` on failed attempts.
    pub async fn record(
        &self,
        state: TaskState,
        rows_moved: u64,
        error: Option<&str>,
    ) -> Result<(), DbErr> {
        let now = Utc::now().naive_utc();
        let existing = self.load().await?;

        let (successes, failures, rows_total) = existing
            .as_ref()
            .map(|r| (r.success_count, r.error_count, r.rows_transferred))
            .unwrap_or((0, 0, 0));

        let mut row: transfer_status::ActiveModel = match &existing {
            Some(record) => record.clone().into(),
            None => transfer_status::ActiveModel {
                job_name: Set(self.job_name.clone()),
                last_attempt_at: Set(None),
                last_success_at: Set(None),
                last_error: Set(None),
                success_count: Set(0),
                error_count: Set(0),
                rows_transferred: Set(0),
                ..Default::default()
            },
        };

        row.last_state = Set(state.as_str().to_string());

        match state {
            TaskState::Scheduled => {}
            TaskState::Running => {
                row.last_attempt_at = Set(Some(now));
            }
            TaskState::Success => {
                row.last_success_at = Set(Some(now));
                row.last_error = Set(None);
                row.success_count = Set(successes + 1);
                row.rows_transferred = Set(rows_total + rows_moved as i64);
            }
            TaskState::UpForRetry | TaskState::Failed => {
                row.error_count = Set(failures + 1);
                row.last_error = Set(error.map(str::to_string));
            }
        }

        if existing.is_some() {
            row.update(self.db.as_ref()).await?;
        } else {
            row.insert(self.db.as_ref()).await?;
        }

        tracing::debug!("[{}] Recorded state {}", self.job_name, state);
        Ok(())
    }
}
