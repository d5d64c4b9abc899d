//! Archive Transfer Service
//!
//! Moves every row of the live table into the archive table:
//! 1. Ensure the archive table exists
//! 2. Read all live rows, capturing their ids
//! 3. Bulk-append timestamp/price into the archive
//! 4. Verify the rows landed inside the check window
//! 5. Delete exactly the captured ids from the live table
//!
//! A failed verification returns an error and leaves the live rows in place,
//! so the next attempt can retry without losing data.

use std::time::Duration;

use sea_orm::DbErr;
use thiserror::Error;
use tracing::{info, warn};

use crate::services::sample_store::{ArchiveSampleStore, LiveSampleStore};

/// Default look-back window for post-insert verification
pub const DEFAULT_VERIFY_WINDOW: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Database error: {0}")]
    Store(#[from] DbErr),

    #[error("Archive verification failed: expected {expected} rows, found {found}")]
    VerificationMismatch { expected: usize, found: u64 },
}

#[derive(Debug, Clone)]
pub struct ArchiverConfig {
    pub verify_window: Duration,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            verify_window: DEFAULT_VERIFY_WINDOW,
        }
    }
}

/// Result of a single transfer run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Live table was empty, nothing written
    Empty,
    Transferred {
        moved: usize,
        deleted: u64,
        remaining_live: u64,
        total_archived: u64,
    },
}

impl TransferOutcome {
    pub fn moved(&self) -> usize {
        match self {
            TransferOutcome::Empty => 0,
            TransferOutcome::Transferred { moved, .. } => *moved,
        }
    }
}

pub struct Archiver<L, A> {
    live: L,
    archive: A,
    config: ArchiverConfig,
}

impl<L: LiveSampleStore, A: ArchiveSampleStore> Archiver<L, A> {
    pub fn new(live: L, archive: A, config: ArchiverConfig) -> Self {
        Self {
            live,
            archive,
            config,
        }
    }

    pub async fn run_once(&self) -> Result<TransferOutcome, ArchiveError> {
        info!("Starting archive transfer");

        self.archive.ensure_table().await?;

        let rows = self.live.fetch_all().await?;
        if rows.is_empty() {
            info!("No live rows to transfer");
            return Ok(TransferOutcome::Empty);
        }

        // Captured now; rows inserted after this point stay in the live table
        let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
        info!(rows = rows.len(), "Collected live rows for transfer");

        let inserted = self.archive.append(&rows).await?;
        info!(inserted = inserted, "Appended rows to archive");

        let found = self
            .archive
            .count_transferred_within(self.config.verify_window)
            .await?;

        if found < rows.len() as u64 {
            warn!(
                expected = rows.len(),
                found = found,
                "Archive verification failed, leaving live rows in place"
            );
            return Err(ArchiveError::VerificationMismatch {
                expected: rows.len(),
                found,
            });
        }

        let deleted = self.live.delete_ids(&ids).await?;
        info!(
            deleted = deleted,
            moved = rows.len(),
            "Deleted transferred rows from live table"
        );

        let remaining_live = self.live.count().await?;
        let total_archived = self.archive.count().await?;
        info!(
            remaining_live = remaining_live,
            total_archived = total_archived,
            "Archive transfer complete"
        );

        Ok(TransferOutcome::Transferred {
            moved: rows.len(),
            deleted,
            remaining_live,
            total_archived,
        })
    }
}
