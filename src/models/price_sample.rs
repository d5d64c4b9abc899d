use chrono::{NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::entities::{bitcoin_archive, bitcoin_prices};

/// Scale of the `DECIMAL(12,2)` price columns
pub const PRICE_SCALE: u32 = 2;

/// Round a quoted price the way PostgreSQL stores it in `DECIMAL(12,2)`
pub fn round_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// One observed price, as written by the collector and read by the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: NaiveDateTime,
    pub price: Decimal,
}

impl PriceSample {
    pub fn new(timestamp: NaiveDateTime, price: Decimal) -> Self {
        Self {
            timestamp,
            price: round_price(price),
        }
    }

    /// Sample stamped with the current UTC time
    pub fn now(price: Decimal) -> Self {
        Self::new(Utc::now().naive_utc(), price)
    }
}

/// A row of the live table, with the primary key the archiver deletes by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSample {
    pub id: i32,
    pub timestamp: Option<NaiveDateTime>,
    pub price: Decimal,
}

impl LiveSample {
    pub fn sample(&self) -> Option<PriceSample> {
        self.timestamp.map(|timestamp| PriceSample {
            timestamp,
            price: self.price,
        })
    }
}

impl From<bitcoin_prices::Model> for LiveSample {
    fn from(model: bitcoin_prices::Model) -> Self {
        Self {
            id: model.id,
            timestamp: model.timestamp,
            price: model.price,
        }
    }
}

impl TryFrom<bitcoin_archive::Model> for PriceSample {
    type Error = i32;

    /// Fails with the row id when timestamp or price is NULL
    fn try_from(model: bitcoin_archive::Model) -> Result<Self, Self::Error> {
        match (model.timestamp, model.price) {
            (Some(timestamp), Some(price)) => Ok(Self { timestamp, price }),
            _ => Err(model.id),
        }
    }
}

/// Which table a history query reads from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SampleTable {
    Live,
    #[default]
    Archive,
}

impl SampleTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            SampleTable::Live => "bitcoin_prices",
            SampleTable::Archive => "bitcoin_archive",
        }
    }
}

impl std::fmt::Display for SampleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn ts(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_round_price_matches_postgres_numeric() {
        assert_eq!(round_price(dec!(67123.45000000)), dec!(67123.45));
        assert_eq!(round_price(dec!(100.005)), dec!(100.01));
        assert_eq!(round_price(dec!(100.015)), dec!(100.02));
        assert_eq!(round_price(dec!(-0.005)), dec!(-0.01));
    }

    #[test]
    fn test_live_sample_without_timestamp_has_no_sample() {
        let row = LiveSample {
            id: 7,
            timestamp: None,
            price: dec!(1.00),
        };
        assert!(row.sample().is_none());

        let row = LiveSample {
            timestamp: Some(ts(10, 0)),
            ..row
        };
        assert_eq!(row.sample().unwrap().price, dec!(1.00));
    }

    #[test]
    fn test_archive_row_conversion() {
        let row = bitcoin_archive::Model {
            id: 3,
            timestamp: Some(ts(9, 30)),
            price: None,
            transferred_at: None,
        };
        assert_eq!(PriceSample::try_from(row), Err(3));
    }

    #[test]
    fn test_sample_table_names() {
        assert_eq!(SampleTable::default(), SampleTable::Archive);
        assert_eq!(SampleTable::Live.to_string(), "bitcoin_prices");
        assert_eq!(SampleTable::Archive.table_name(), "bitcoin_archive");
    }
}
