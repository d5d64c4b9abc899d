//! Price history loading for the chart
//!
//! Two read paths over the same tables: the ORM entities, and a raw SQL query
//! on a fresh connection. The loader tries the ORM path first and falls back
//! to raw SQL when it fails.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, EntityTrait, QueryOrder,
    QuerySelect, Statement,
};
use tracing::{info, warn};

use crate::entities::{bitcoin_archive, bitcoin_prices, prelude::*};
use crate::models::{PriceSample, SampleTable};

/// Raw `(timestamp, price)` row as stored; either column may be NULL
pub type HistoryRow = (Option<NaiveDateTime>, Option<Decimal>);

#[async_trait]
pub trait PriceHistory: Send + Sync {
    fn name(&self) -> &'static str;

    /// Newest `limit` rows of `table`, newest first
    async fn recent(&self, table: SampleTable, limit: u64) -> Result<Vec<HistoryRow>, DbErr>;
}

/// Reads through the SeaORM entities on an existing connection
pub struct EntityHistory {
    db: Arc<DatabaseConnection>,
}

impl EntityHistory {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PriceHistory for EntityHistory {
    fn name(&self) -> &'static str {
        "orm"
    }

    async fn recent(&self, table: SampleTable, limit: u64) -> Result<Vec<HistoryRow>, DbErr> {
        let rows = match table {
            SampleTable::Live => BitcoinPrices::find()
                .order_by_desc(bitcoin_prices::Column::Timestamp)
                .limit(limit)
                .all(self.db.as_ref())
                .await?
                .into_iter()
                .map(|row| (row.timestamp, Some(row.price)))
                .collect(),
            SampleTable::Archive => BitcoinArchive::find()
                .order_by_desc(bitcoin_archive::Column::Timestamp)
                .limit(limit)
                .all(self.db.as_ref())
                .await?
                .into_iter()
                .map(|row| (row.timestamp, row.price))
                .collect(),
        };

        Ok(rows)
    }
}

/// Opens its own connection per call and issues a plain `SELECT`
pub struct RawSqlHistory {
    database_url: String,
}

impl RawSqlHistory {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

/// Table names come from [`SampleTable`], never from user input
fn recent_rows_statement(table: SampleTable, limit: u64) -> Statement {
    Statement::from_sql_and_values(
        DbBackend::Postgres,
        format!(
            r#"SELECT "timestamp", price FROM {} ORDER BY "timestamp" DESC LIMIT $1"#,
            table.table_name()
        ),
        [(limit as i64).into()],
    )
}

#[async_trait]
impl PriceHistory for RawSqlHistory {
    fn name(&self) -> &'static str {
        "raw-sql"
    }

    async fn recent(&self, table: SampleTable, limit: u64) -> Result<Vec<HistoryRow>, DbErr> {
        let db = Database::connect(&self.database_url).await?;

        let result = db.query_all(recent_rows_statement(table, limit)).await;
        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                let _ = db.close().await;
                return Err(e);
            }
        };

        let mut history = Vec::with_capacity(rows.len());
        for row in &rows {
            let timestamp: Option<NaiveDateTime> = row.try_get("", "timestamp")?;
            let price: Option<Decimal> = row.try_get("", "price")?;
            history.push((timestamp, price));
        }

        db.close().await?;
        Ok(history)
    }
}

/// Primary read path with an optional fallback
pub struct PriceHistoryLoader {
    primary: Box<dyn PriceHistory>,
    fallback: Option<Box<dyn PriceHistory>>,
}

impl PriceHistoryLoader {
    pub fn new(primary: Box<dyn PriceHistory>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Box<dyn PriceHistory>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Newest `limit` samples in chronological order
    ///
    /// Rows with a NULL timestamp or price are dropped. Returns `None` when
    /// every read path failed; an empty table is `Some(vec![])`.
    pub async fn load(&self, table: SampleTable, limit: u64) -> Option<Vec<PriceSample>> {
        let rows = match self.primary.recent(table, limit).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(
                    path = self.primary.name(),
                    table = %table,
                    error = %e,
                    "Failed to load price history"
                );
                let fallback = self.fallback.as_ref()?;

                match fallback.recent(table, limit).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(
                            path = fallback.name(),
                            table = %table,
                            error = %e,
                            "Fallback failed to load price history"
                        );
                        return None;
                    }
                }
            }
        };

        let total = rows.len();
        let mut samples: Vec<PriceSample> = rows
            .into_iter()
            .filter_map(|(timestamp, price)| {
                Some(PriceSample {
                    timestamp: timestamp?,
                    price: price?,
                })
            })
            .collect();

        if samples.len() < total {
            info!(dropped = total - samples.len(), "Skipped rows with NULL columns");
        }

        samples.sort_by_key(|sample| sample.timestamp);
        Some(samples)
    }
}
