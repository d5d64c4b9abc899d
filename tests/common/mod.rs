#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sea_orm::DbErr;
use tokio::time::Instant;

use bitcoin_price_pipeline::models::{LiveSample, PriceSample};
use bitcoin_price_pipeline::services::binance_ticker::{PriceSource, TickerError};
use bitcoin_price_pipeline::services::sample_store::{ArchiveSampleStore, LiveSampleStore};

pub fn ts(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .unwrap()
        .and_hms_opt(10, minute, 0)
        .unwrap()
}

/// Replays scripted quotes; `None` is a failed request
pub struct FakePriceSource {
    quotes: Mutex<VecDeque<Option<Decimal>>>,
}

impl FakePriceSource {
    pub fn new(quotes: Vec<Option<Decimal>>) -> Self {
        Self {
            quotes: Mutex::new(quotes.into()),
        }
    }
}

#[async_trait]
impl PriceSource for FakePriceSource {
    async fn fetch_price(&self) -> Result<Decimal, TickerError> {
        match self.quotes.lock().unwrap().pop_front().flatten() {
            Some(price) => Ok(price),
            None => Err(TickerError::UnexpectedShape("connection refused".to_string())),
        }
    }
}

#[derive(Default)]
struct LiveState {
    rows: Vec<LiveSample>,
    next_id: i32,
    /// Inserted right after the next `fetch_all` returns its snapshot
    insert_after_fetch: Vec<PriceSample>,
    failing_fetches: u32,
    fetched_at: Vec<Instant>,
}

impl LiveState {
    fn push(&mut self, sample: &PriceSample) {
        self.next_id += 1;
        self.rows.push(LiveSample {
            id: self.next_id,
            timestamp: Some(sample.timestamp),
            price: sample.price,
        });
    }
}

/// In-memory `bitcoin_prices`; clones share the same rows
#[derive(Clone, Default)]
pub struct MemoryLiveStore {
    state: Arc<Mutex<LiveState>>,
}

impl MemoryLiveStore {
    pub fn with_rows(samples: &[PriceSample]) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            for sample in samples {
                state.push(sample);
            }
        }
        store
    }

    /// Simulate a collector insert racing with an archive run
    pub fn insert_after_next_fetch(&self, sample: PriceSample) {
        self.state.lock().unwrap().insert_after_fetch.push(sample);
    }

    /// Make the next `n` reads fail
    pub fn fail_next_fetches(&self, n: u32) {
        self.state.lock().unwrap().failing_fetches = n;
    }

    pub fn rows(&self) -> Vec<LiveSample> {
        self.state.lock().unwrap().rows.clone()
    }

    /// Seconds after `start` at which each `fetch_all` happened
    pub fn fetch_offsets(&self, start: Instant) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .fetched_at
            .iter()
            .map(|at| at.duration_since(start).as_secs())
            .collect()
    }

    pub fn len(&self) -> u64 {
        self.state.lock().unwrap().rows.len() as u64
    }
}

#[async_trait]
impl LiveSampleStore for MemoryLiveStore {
    async fn ensure_table(&self) -> Result<(), DbErr> {
        Ok(())
    }

    async fn insert(&self, sample: &PriceSample) -> Result<(), DbErr> {
        self.state.lock().unwrap().push(sample);
        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<LiveSample>, DbErr> {
        let mut state = self.state.lock().unwrap();
        state.fetched_at.push(Instant::now());
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(DbErr::Custom("connection refused".to_string()));
        }

        let mut snapshot = state.rows.clone();
        snapshot.sort_by_key(|row| row.timestamp);

        for sample in std::mem::take(&mut state.insert_after_fetch) {
            state.push(&sample);
        }

        Ok(snapshot)
    }

    async fn fetch_latest(&self, limit: u64) -> Result<Vec<LiveSample>, DbErr> {
        let mut rows = self.rows();
        rows.sort_by_key(|row| std::cmp::Reverse(row.timestamp));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn fetch_since(&self, since: NaiveDateTime) -> Result<Vec<LiveSample>, DbErr> {
        Ok(self
            .rows()
            .into_iter()
            .filter(|row| row.timestamp.is_some_and(|t| t >= since))
            .collect())
    }

    async fn delete_ids(&self, ids: &[i32]) -> Result<u64, DbErr> {
        let mut state = self.state.lock().unwrap();
        let before = state.rows.len();
        state.rows.retain(|row| !ids.contains(&row.id));
        Ok((before - state.rows.len()) as u64)
    }

    async fn count(&self) -> Result<u64, DbErr> {
        Ok(self.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedRow {
    pub timestamp: Option<NaiveDateTime>,
    pub price: Option<Decimal>,
}

#[derive(Default)]
struct ArchiveState {
    rows: Vec<(ArchivedRow, Instant)>,
    /// Reported by the verification query instead of the real count
    verified_override: Option<u64>,
}

/// In-memory `bitcoin_archive`; clones share the same rows
#[derive(Clone, Default)]
pub struct MemoryArchiveStore {
    state: Arc<Mutex<ArchiveState>>,
}

impl MemoryArchiveStore {
    pub fn report_verified(&self, found: u64) {
        self.state.lock().unwrap().verified_override = Some(found);
    }

    pub fn rows(&self) -> Vec<ArchivedRow> {
        self.state
            .lock()
            .unwrap()
            .rows
            .iter()
            .map(|(row, _)| row.clone())
            .collect()
    }

    pub fn len(&self) -> u64 {
        self.state.lock().unwrap().rows.len() as u64
    }
}

#[async_trait]
impl ArchiveSampleStore for MemoryArchiveStore {
    async fn ensure_table(&self) -> Result<(), DbErr> {
        Ok(())
    }

    async fn append(&self, rows: &[LiveSample]) -> Result<u64, DbErr> {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap();
        for row in rows {
            state.rows.push((
                ArchivedRow {
                    timestamp: row.timestamp,
                    price: Some(row.price),
                },
                now,
            ));
        }
        Ok(rows.len() as u64)
    }

    async fn count_transferred_within(&self, window: Duration) -> Result<u64, DbErr> {
        let state = self.state.lock().unwrap();
        if let Some(found) = state.verified_override {
            return Ok(found);
        }
        Ok(state
            .rows
            .iter()
            .filter(|(_, at)| at.elapsed() <= window)
            .count() as u64)
    }

    async fn count(&self) -> Result<u64, DbErr> {
        Ok(self.len())
    }
}
