use std::sync::Arc;

use clap::Parser;
use sea_orm::Database;

use bitcoin_price_pipeline::chart::{self, PriceChart};
use bitcoin_price_pipeline::config::AppConfig;
use bitcoin_price_pipeline::models::SampleTable;
use bitcoin_price_pipeline::services::price_history::{
    EntityHistory, PriceHistoryLoader, RawSqlHistory,
};
use bitcoin_price_pipeline::services::price_stats::PriceStats;
use bitcoin_price_pipeline::telemetry;

/// Show recent Bitcoin prices as a terminal line chart
#[derive(Parser, Debug)]
#[command(name = "price-chart")]
struct Args {
    /// Number of most recent rows to load
    #[arg(long)]
    limit: Option<u64>,

    /// Table to read from
    #[arg(long, value_enum, default_value_t = SampleTable::Archive)]
    table: SampleTable,

    /// Print statistics only
    #[arg(long)]
    no_chart: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    telemetry::init_tracing("warn");
    let args = Args::parse();
    let config = AppConfig::from_env()?;
    let limit = args.limit.unwrap_or(config.chart_limit);

    let database_url = config.history_database_url(args.table);

    let fallback = Box::new(RawSqlHistory::new(database_url));
    let loader = match Database::connect(database_url).await {
        Ok(db) => PriceHistoryLoader::new(Box::new(EntityHistory::new(Arc::new(db))))
            .with_fallback(fallback),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to connect, using raw SQL path only");
            PriceHistoryLoader::new(fallback)
        }
    };

    let Some(samples) = loader.load(args.table, limit).await else {
        println!("No data: could not read {}", args.table);
        return Ok(());
    };

    let Some(stats) = PriceStats::compute(&samples) else {
        println!("No data in {}", args.table);
        return Ok(());
    };

    println!("{}", stats);

    if args.no_chart {
        return Ok(());
    }

    let chart = PriceChart::new(&samples);
    if chart::display(&chart)? {
        // Leave the numbers on screen after the alternate screen closes
        println!("{}", stats);
    }
    Ok(())
}
