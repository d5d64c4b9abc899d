//! Summary statistics over a chronological price window

use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use crate::models::{PriceSample, round_price};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceStats {
    /// Last price in the window
    pub current: Decimal,
    pub first: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    pub average: Decimal,
    /// `current - first`
    pub change: Decimal,
    /// Percentage change from the first sample, `None` when that price is zero
    pub change_pct: Option<Decimal>,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub samples: usize,
}

impl PriceStats {
    /// `samples` must be in chronological order. Returns `None` when empty.
    pub fn compute(samples: &[PriceSample]) -> Option<Self> {
        let first = samples.first()?;
        let last = samples.last()?;

        let mut min = first.price;
        let mut max = first.price;
        let mut sum = Decimal::ZERO;
        for sample in samples {
            min = min.min(sample.price);
            max = max.max(sample.price);
            sum += sample.price;
        }

        let change = last.price - first.price;
        let change_pct = if first.price.is_zero() {
            None
        } else {
            Some(round_price(change / first.price * Decimal::ONE_HUNDRED))
        };

        Some(Self {
            current: last.price,
            first: first.price,
            min,
            max,
            average: round_price(sum / Decimal::from(samples.len())),
            change,
            change_pct,
            period_start: first.timestamp,
            period_end: last.timestamp,
            samples: samples.len(),
        })
    }
}

impl fmt::Display for PriceStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current price: {}", format_usd(self.current))?;
        writeln!(
            f,
            "Min: {} | Max: {} | Avg: {}",
            format_usd(self.min),
            format_usd(self.max),
            format_usd(self.average)
        )?;
        match self.change_pct {
            Some(pct) => writeln!(
                f,
                "Change: {} ({}%)",
                format_signed_usd(self.change),
                format_signed(pct)
            )?,
            None => writeln!(f, "Change: {}", format_signed_usd(self.change))?,
        }
        write!(
            f,
            "Period: {} - {} ({} samples)",
            self.period_start.format("%Y-%m-%d %H:%M:%S"),
            self.period_end.format("%Y-%m-%d %H:%M:%S"),
            self.samples
        )
    }
}

/// `$67,123.40`
pub fn format_usd(value: Decimal) -> String {
    let rounded = round_price(value);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}", sign, group_thousands(rounded.abs()))
}

/// `+$1,234.00` / `-$5.00`
pub fn format_signed_usd(value: Decimal) -> String {
    if value.is_sign_negative() && !round_price(value).is_zero() {
        format_usd(value)
    } else {
        format!("+{}", format_usd(value.abs()))
    }
}

/// `+2.50` / `-5.00`
fn format_signed(value: Decimal) -> String {
    let rounded = round_price(value);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("{:.2}", rounded)
    } else {
        format!("+{:.2}", rounded.abs())
    }
}

fn group_thousands(value: Decimal) -> String {
    let text = format!("{:.2}", value);
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}.{}", grouped, frac_part)
}
