use chrono::DateTime;
use ratatui::{
    Frame,
    layout::{Constraint, Layout},
    style::{Color, Style},
    symbols::Marker,
    text::Span,
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use rust_decimal::prelude::ToPrimitive;

use crate::models::PriceSample;
use crate::services::price_stats::{PriceStats, format_usd};

pub const BITCOIN_ORANGE: Color = Color::Rgb(247, 147, 26);

const TITLE: &str = "Bitcoin Price Chart";

pub struct PriceChart {
    data: Vec<(f64, f64)>,
    start_time: f64,
    end_time: f64,
    min_price: f64,
    max_price: f64,
    stats: Option<PriceStats>,
}

impl PriceChart {
    /// `samples` must be chronological
    pub fn new(samples: &[PriceSample]) -> Self {
        let data: Vec<(f64, f64)> = samples
            .iter()
            .filter_map(|s| Some((s.timestamp.and_utc().timestamp() as f64, s.price.to_f64()?)))
            .collect();

        let start_time = data.first().map(|p| p.0).unwrap_or_default();
        let end_time = data.last().map(|p| p.0).unwrap_or_default();

        let (min_price, max_price) = data.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
            (lo.min(p.1), hi.max(p.1))
        });

        Self {
            data,
            start_time,
            end_time,
            min_price,
            max_price,
            stats: PriceStats::compute(samples),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn stats(&self) -> Option<&PriceStats> {
        self.stats.as_ref()
    }

    fn x_bounds(&self) -> [f64; 2] {
        if self.end_time > self.start_time {
            [self.start_time, self.end_time]
        } else {
            // Single point: widen so the axis is drawable
            [self.start_time - 30., self.start_time + 30.]
        }
    }

    fn y_bounds(&self) -> [f64; 2] {
        if self.is_empty() {
            return [0., 1.];
        }
        let padding = ((self.max_price - self.min_price) * 0.05).max(1.);
        [self.min_price - padding, self.max_price + padding]
    }

    pub fn to_widget(&self) -> Chart<'_> {
        let [x_min, x_max] = self.x_bounds();
        let [y_min, y_max] = self.y_bounds();

        let datasets = vec![
            Dataset::default()
                .name("BTC/USD")
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(BITCOIN_ORANGE))
                .data(&self.data),
        ];

        let x_labels = [x_min, (x_min + x_max) / 2., x_max]
            .iter()
            .map(|&time| {
                Span::raw(
                    DateTime::from_timestamp(time as i64, 0)
                        .map(|t| t.format("%m/%d %H:%M").to_string())
                        .unwrap_or_default(),
                )
            })
            .collect::<Vec<_>>();

        let y_labels = [y_min, (y_min + y_max) / 2., y_max]
            .iter()
            .map(|&price| Span::raw(format!("${:.0}", price)))
            .collect::<Vec<_>>();

        Chart::new(datasets)
            .block(Block::default().title(TITLE).borders(Borders::ALL))
            .x_axis(
                Axis::default()
                    .title("Time [UTC]")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([x_min, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .title("Price [USD]")
                    .style(Style::default().fg(Color::Gray))
                    .bounds([y_min, y_max])
                    .labels(y_labels),
            )
    }

    fn summary(&self) -> Paragraph<'_> {
        let text = match &self.stats {
            Some(stats) => stats.to_string(),
            None => "No price data available".to_string(),
        };

        let title = match &self.stats {
            Some(stats) => format!("Latest {} (q to quit)", format_usd(stats.current)),
            None => "Summary (q to quit)".to_string(),
        };

        Paragraph::new(text).block(Block::default().title(title).borders(Borders::ALL))
    }

    pub fn render(&self, frame: &mut Frame) {
        let [chart_area, summary_area] =
            Layout::vertical([Constraint::Min(8), Constraint::Length(6)]).areas(frame.area());

        frame.render_widget(self.to_widget(), chart_area);
        frame.render_widget(self.summary(), summary_area);
    }
}
