use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sea_orm::Database;

use bitcoin_price_pipeline::config::AppConfig;
use bitcoin_price_pipeline::services::binance_ticker::BinanceTicker;
use bitcoin_price_pipeline::services::collector::Collector;
use bitcoin_price_pipeline::services::price_stats::format_usd;
use bitcoin_price_pipeline::services::sample_store::SeaOrmLiveStore;
use bitcoin_price_pipeline::telemetry::{self, DEFAULT_LOG_FILTER};

/// Poll the Binance ticker and append each price to the live table
#[derive(Parser, Debug)]
#[command(name = "collect-prices")]
struct Args {
    /// Number of polls before exiting, 0 runs until ctrl-c
    #[arg(long)]
    max_samples: Option<u64>,

    /// Seconds between successful polls
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    telemetry::init_tracing(DEFAULT_LOG_FILTER);
    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(max_samples) = args.max_samples {
        config.collector_max_samples = max_samples;
    }
    if let Some(secs) = args.interval_secs {
        config.collector_interval = Duration::from_secs(secs);
    }

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    let ticker = BinanceTicker::new(
        &config.binance_api_url,
        &config.ticker_symbol,
        config.http_timeout,
    )?;
    tracing::info!(symbol = ticker.symbol(), "Using Binance ticker");

    let collector = Collector::new(
        ticker,
        SeaOrmLiveStore::new(Arc::new(db)),
        config.collector_config(),
    );
    collector.prepare().await?;

    let stats = collector
        .run_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received, stopping collection");
            }
        })
        .await;

    tracing::info!(
        iterations = stats.iterations,
        stored = stats.stored,
        fetch_errors = stats.fetch_errors,
        store_errors = stats.store_errors,
        "Collection session complete"
    );

    match collector.session_report().await {
        Ok(report) => {
            tracing::info!(total_rows = report.total_rows, "Live table size");
            for row in &report.latest {
                tracing::info!(
                    id = row.id,
                    timestamp = ?row.timestamp,
                    price = %format_usd(row.price),
                    "Recent sample"
                );
            }
            match report.last_hour {
                Some(stats) => tracing::info!(
                    min = %format_usd(stats.min),
                    max = %format_usd(stats.max),
                    avg = %format_usd(stats.average),
                    samples = stats.samples,
                    "Last hour"
                ),
                None => tracing::info!("No samples in the last hour"),
            }
        }
        Err(e) => tracing::warn!(error = %e, "Failed to build session report"),
    }

    Ok(())
}
