//! Sample stores
//!
//! Narrow interfaces over the live and archive tables so the collector and
//! archiver can run against fakes. The SeaORM implementations below are what
//! the binaries use.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::{Expr, TableCreateStatement},
};

use crate::entities::{bitcoin_archive, bitcoin_prices, prelude::*};
use crate::models::{LiveSample, PriceSample};

/// Rows per bulk statement; keeps bind parameters under the Postgres limit
/// of 65535 (two per archived row, one per deleted id)
pub const MAX_ROWS_PER_STATEMENT: usize = 10_000;

/// Table of samples that have not been archived yet
#[async_trait]
pub trait LiveSampleStore: Send + Sync {
    /// Idempotent `CREATE TABLE IF NOT EXISTS`
    async fn ensure_table(&self) -> Result<(), DbErr>;

    /// Append one sample, committed immediately
    async fn insert(&self, sample: &PriceSample) -> Result<(), DbErr>;

    /// Every row, oldest first
    async fn fetch_all(&self) -> Result<Vec<LiveSample>, DbErr>;

    /// Newest `limit` rows, newest first
    async fn fetch_latest(&self, limit: u64) -> Result<Vec<LiveSample>, DbErr>;

    /// Rows stamped at or after `since`, oldest first
    async fn fetch_since(&self, since: NaiveDateTime) -> Result<Vec<LiveSample>, DbErr>;

    /// Delete exactly the given primary keys, any number of them
    async fn delete_ids(&self, ids: &[i32]) -> Result<u64, DbErr>;

    async fn count(&self) -> Result<u64, DbErr>;
}

/// Durable history of transferred samples
#[async_trait]
pub trait ArchiveSampleStore: Send + Sync {
    /// Idempotent `CREATE TABLE IF NOT EXISTS`
    async fn ensure_table(&self) -> Result<(), DbErr>;

    /// Bulk-append timestamp/price pairs, any number of them. Source ids are
    /// not copied.
    async fn append(&self, rows: &[LiveSample]) -> Result<u64, DbErr>;

    /// Rows whose `transferred_at` falls inside the trailing `window`,
    /// measured against the database clock
    async fn count_transferred_within(&self, window: Duration) -> Result<u64, DbErr>;

    async fn count(&self) -> Result<u64, DbErr>;
}

async fn create_if_not_exists(
    db: &DatabaseConnection,
    statement: TableCreateStatement,
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&statement)).await?;
    Ok(())
}

/// Live table backed by `bitcoin_prices`
#[derive(Clone)]
pub struct SeaOrmLiveStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmLiveStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LiveSampleStore for SeaOrmLiveStore {
    async fn ensure_table(&self) -> Result<(), DbErr> {
        create_if_not_exists(self.db.as_ref(), migration::bitcoin_prices_table()).await
    }

    async fn insert(&self, sample: &PriceSample) -> Result<(), DbErr> {
        let row = bitcoin_prices::ActiveModel {
            timestamp: Set(Some(sample.timestamp)),
            price: Set(sample.price),
            ..Default::default()
        };

        BitcoinPrices::insert(row)
            .exec_without_returning(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn fetch_all(&self) -> Result<Vec<LiveSample>, DbErr> {
        let rows = BitcoinPrices::find()
            .order_by_asc(bitcoin_prices::Column::Timestamp)
            .all(self.db.as_ref())
            .await?;

        Ok(rows.into_iter().map(LiveSample::from).collect())
    }

    async fn fetch_latest(&self, limit: u64) -> Result<Vec<LiveSample>, DbErr> {
        let rows = BitcoinPrices::find()
            .order_by_desc(bitcoin_prices::Column::Timestamp)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;

        Ok(rows.into_iter().map(LiveSample::from).collect())
    }

    async fn fetch_since(&self, since: NaiveDateTime) -> Result<Vec<LiveSample>, DbErr> {
        let rows = BitcoinPrices::find()
            .filter(bitcoin_prices::Column::Timestamp.gte(since))
            .order_by_asc(bitcoin_prices::Column::Timestamp)
            .all(self.db.as_ref())
            .await?;

        Ok(rows.into_iter().map(LiveSample::from).collect())
    }

    async fn delete_ids(&self, ids: &[i32]) -> Result<u64, DbErr> {
        let mut deleted = 0;
        for chunk in ids.chunks(MAX_ROWS_PER_STATEMENT) {
            let result = BitcoinPrices::delete_many()
                .filter(bitcoin_prices::Column::Id.is_in(chunk.iter().copied()))
                .exec(self.db.as_ref())
                .await?;
            deleted += result.rows_affected;
        }

        Ok(deleted)
    }

    async fn count(&self) -> Result<u64, DbErr> {
        BitcoinPrices::find().count(self.db.as_ref()).await
    }
}

/// Archive table backed by `bitcoin_archive`
#[derive(Clone)]
pub struct SeaOrmArchiveStore {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmArchiveStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ArchiveSampleStore for SeaOrmArchiveStore {
    async fn ensure_table(&self) -> Result<(), DbErr> {
        create_if_not_exists(self.db.as_ref(), migration::bitcoin_archive_table()).await
    }

    async fn append(&self, rows: &[LiveSample]) -> Result<u64, DbErr> {
        let mut inserted = 0;
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            // transferred_at is left to the column default
            let models = chunk.iter().map(|row| bitcoin_archive::ActiveModel {
                timestamp: Set(row.timestamp),
                price: Set(Some(row.price)),
                ..Default::default()
            });

            inserted += BitcoinArchive::insert_many(models)
                .exec_without_returning(self.db.as_ref())
                .await?;
        }

        Ok(inserted)
    }

    async fn count_transferred_within(&self, window: Duration) -> Result<u64, DbErr> {
        let cutoff = Expr::cust(format!(
            "NOW() - INTERVAL '{} seconds'",
            window.as_secs()
        ));

        BitcoinArchive::find()
            .filter(Expr::col(bitcoin_archive::Column::TransferredAt).gte(cutoff))
            .count(self.db.as_ref())
            .await
    }

    async fn count(&self) -> Result<u64, DbErr> {
        BitcoinArchive::find().count(self.db.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction, Value};
    use std::collections::BTreeMap;

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Into::<Value>::into(n))])
    }

    fn exec_result(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    /// Statements the mock saw; every store holding `db` must be dropped first
    fn transaction_log(db: Arc<DatabaseConnection>) -> Vec<Transaction> {
        Arc::into_inner(db)
            .expect("store still holds the connection")
            .into_transaction_log()
    }

    fn backlog(n: usize) -> Vec<LiveSample> {
        (0..n)
            .map(|i| LiveSample {
                id: i as i32 + 1,
                timestamp: Some(ts((i % 60) as u32)),
                price: dec!(67000.00),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_all_maps_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                bitcoin_prices::Model {
                    id: 1,
                    timestamp: Some(ts(0)),
                    price: dec!(100.00),
                },
                bitcoin_prices::Model {
                    id: 2,
                    timestamp: None,
                    price: dec!(101.50),
                },
            ]])
            .into_connection();

        let store = SeaOrmLiveStore::new(Arc::new(db));
        let rows = store.fetch_all().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].timestamp, Some(ts(0)));
        assert_eq!(rows[1].price, dec!(101.50));
    }

    #[tokio::test]
    async fn test_insert_executes_one_statement() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 1,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let store = SeaOrmLiveStore::new(db.clone());
        store
            .insert(&PriceSample::new(ts(1), dec!(67000.12)))
            .await
            .unwrap();
        drop(store);

        let log = format!("{:?}", transaction_log(db));
        assert!(log.contains("INSERT INTO \\\"bitcoin_prices\\\""));
    }

    #[tokio::test]
    async fn test_delete_empty_id_list_is_noop() {
        // No results queued: any statement would fail
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = SeaOrmLiveStore::new(Arc::new(db));

        assert_eq!(store.delete_ids(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_by_id_list() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_result(3)])
                .into_connection(),
        );

        let store = SeaOrmLiveStore::new(db.clone());
        assert_eq!(store.delete_ids(&[4, 5, 6]).await.unwrap(), 3);
        drop(store);

        let log = format!("{:?}", transaction_log(db));
        assert!(log.contains("DELETE FROM \\\"bitcoin_prices\\\""));
        assert!(log.contains("IN ($1, $2, $3)"));
    }

    #[tokio::test]
    async fn test_large_delete_is_split_into_chunks() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_result(10_000), exec_result(10_000), exec_result(5_000)])
                .into_connection(),
        );

        let ids: Vec<i32> = (1..=25_000).collect();
        let store = SeaOrmLiveStore::new(db.clone());
        assert_eq!(store.delete_ids(&ids).await.unwrap(), 25_000);
        drop(store);

        let log = transaction_log(db);
        assert_eq!(log.len(), 3);
        let last = format!("{:?}", log[2]);
        assert!(last.contains("$5000)"));
        assert!(!last.contains("$5001"));
    }

    #[tokio::test]
    async fn test_live_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(42)]])
            .into_connection();

        let store = SeaOrmLiveStore::new(Arc::new(db));
        assert_eq!(store.count().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_archive_append_skips_empty_batch() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let store = SeaOrmArchiveStore::new(Arc::new(db));

        assert_eq!(store.append(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_archive_append_is_one_bulk_insert() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec_result(2)])
                .into_connection(),
        );

        let store = SeaOrmArchiveStore::new(db.clone());
        let rows = [
            LiveSample {
                id: 10,
                timestamp: Some(ts(0)),
                price: dec!(100.00),
            },
            LiveSample {
                id: 11,
                timestamp: Some(ts(1)),
                price: dec!(100.50),
            },
        ];
        assert_eq!(store.append(&rows).await.unwrap(), 2);
        drop(store);

        let log = transaction_log(db);
        assert_eq!(log.len(), 1);
        let log = format!("{:?}", log);
        assert!(log.contains("INSERT INTO \\\"bitcoin_archive\\\""));
        assert!(!log.contains("\\\"id\\\""));
    }

    #[tokio::test]
    async fn test_backlog_over_parameter_limit_is_appended_in_chunks() {
        // 40k rows would need 80k bind parameters in a single statement
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    exec_result(10_000),
                    exec_result(10_000),
                    exec_result(10_000),
                    exec_result(10_000),
                ])
                .into_connection(),
        );

        let store = SeaOrmArchiveStore::new(db.clone());
        assert_eq!(store.append(&backlog(40_000)).await.unwrap(), 40_000);
        drop(store);

        let log = transaction_log(db);
        assert_eq!(log.len(), 4);
        for statement in &log {
            let text = format!("{:?}", statement);
            assert!(text.contains("$20000)"));
            assert!(!text.contains("$20001"));
        }
    }

    #[tokio::test]
    async fn test_verification_window_uses_database_clock() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![count_row(5)]])
                .into_connection(),
        );

        let store = SeaOrmArchiveStore::new(db.clone());
        let found = store
            .count_transferred_within(Duration::from_secs(120))
            .await
            .unwrap();
        assert_eq!(found, 5);
        drop(store);

        let log = format!("{:?}", transaction_log(db));
        assert!(log.contains("NOW() - INTERVAL '120 seconds'"));
    }
}
