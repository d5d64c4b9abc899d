//! Price Collector
//!
//! Polls a [`PriceSource`] at a fixed cadence and appends one row per
//! successful poll to the live table. Failures are logged and counted, never
//! escalated: a failed fetch waits out a longer backoff, a failed insert is a
//! lost sample.

use std::future::{Future, pending};
use std::time::Duration;

use chrono::Utc;
use sea_orm::DbErr;
use tracing::{error, info, warn};

use crate::models::{LiveSample, PriceSample};
use crate::services::binance_ticker::PriceSource;
use crate::services::price_stats::PriceStats;
use crate::services::sample_store::LiveSampleStore;

/// Default number of loop iterations
pub const DEFAULT_MAX_ITERATIONS: u64 = 10_000;

/// Default pause after a successful poll
pub const DEFAULT_SUCCESS_DELAY: Duration = Duration::from_secs(1);

/// Default pause after a failed fetch
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Rows shown in the end-of-session report
const REPORT_LATEST_ROWS: u64 = 5;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// `None` polls until shutdown
    pub max_iterations: Option<u64>,
    pub success_delay: Duration,
    pub error_backoff: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_iterations: Some(DEFAULT_MAX_ITERATIONS),
            success_delay: DEFAULT_SUCCESS_DELAY,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }
}

/// Counters for one collector session
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectStats {
    pub iterations: u64,
    pub fetched: u64,
    pub stored: u64,
    pub fetch_errors: u64,
    pub store_errors: u64,
}

impl CollectStats {
    pub fn errors(&self) -> u64 {
        self.fetch_errors + self.store_errors
    }
}

/// Snapshot of the live table after a session
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub total_rows: u64,
    /// Newest first
    pub latest: Vec<LiveSample>,
    pub last_hour: Option<PriceStats>,
}

pub struct Collector<S, L> {
    source: S,
    store: L,
    config: CollectorConfig,
}

impl<S: PriceSource, L: LiveSampleStore> Collector<S, L> {
    pub fn new(source: S, store: L, config: CollectorConfig) -> Self {
        Self {
            source,
            store,
            config,
        }
    }

    pub fn store(&self) -> &L {
        &self.store
    }

    /// Create the live table if needed. Run once before [`Collector::run`].
    pub async fn prepare(&self) -> Result<(), DbErr> {
        self.store.ensure_table().await?;
        info!("Live table ready");
        Ok(())
    }

    pub async fn run(&self) -> CollectStats {
        self.run_until(pending()).await
    }

    /// Poll until the iteration bound is reached or `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> CollectStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut stats = CollectStats::default();

        info!(
            max_iterations = ?self.config.max_iterations,
            "Starting price collection"
        );

        while !self.exhausted(&stats) {
            let fetched = tokio::select! {
                _ = &mut shutdown => break,
                result = self.source.fetch_price() => result,
            };
            stats.iterations += 1;

            let price = match fetched {
                Ok(price) => price,
                Err(e) => {
                    stats.fetch_errors += 1;
                    warn!(
                        error = %e,
                        errors = stats.errors(),
                        "Failed to fetch price, skipping sample"
                    );
                    if self.exhausted(&stats)
                        || self.pause(self.config.error_backoff, &mut shutdown).await
                    {
                        break;
                    }
                    continue;
                }
            };

            stats.fetched += 1;
            let sample = PriceSample::now(price);

            match self.store.insert(&sample).await {
                Ok(()) => {
                    stats.stored += 1;
                    info!(
                        number = stats.fetched,
                        price = %sample.price,
                        at = %sample.timestamp.format("%H:%M:%S"),
                        "Sample stored"
                    );
                }
                Err(e) => {
                    stats.store_errors += 1;
                    error!(
                        number = stats.fetched,
                        price = %sample.price,
                        error = %e,
                        "Failed to store sample"
                    );
                }
            }

            if self.exhausted(&stats)
                || self.pause(self.config.success_delay, &mut shutdown).await
            {
                break;
            }
        }

        info!(
            iterations = stats.iterations,
            stored = stats.stored,
            errors = stats.errors(),
            "Price collection finished"
        );

        stats
    }

    fn exhausted(&self, stats: &CollectStats) -> bool {
        self.config
            .max_iterations
            .is_some_and(|max| stats.iterations >= max)
    }

    /// Sleep for `delay`; returns true if shutdown fired first
    async fn pause<F>(&self, delay: Duration, shutdown: &mut std::pin::Pin<&mut F>) -> bool
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown.as_mut() => true,
            _ = tokio::time::sleep(delay) => false,
        }
    }

    /// Row count, newest rows and last-hour statistics of the live table
    pub async fn session_report(&self) -> Result<SessionReport, DbErr> {
        let total_rows = self.store.count().await?;
        let latest = self.store.fetch_latest(REPORT_LATEST_ROWS).await?;

        let since = Utc::now().naive_utc() - chrono::Duration::hours(1);
        let last_hour_samples: Vec<PriceSample> = self
            .store
            .fetch_since(since)
            .await?
            .iter()
            .filter_map(LiveSample::sample)
            .collect();

        Ok(SessionReport {
            total_rows,
            latest,
            last_hour: PriceStats::compute(&last_hour_samples),
        })
    }
}
