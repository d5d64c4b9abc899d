use std::sync::Arc;

use clap::Parser;
use sea_orm::Database;

use bitcoin_price_pipeline::config::AppConfig;
use bitcoin_price_pipeline::jobs::archive_transfer::{
    JOB_NAME, run_archive_transfer_job, run_with_retries,
};
use bitcoin_price_pipeline::services::archiver::Archiver;
use bitcoin_price_pipeline::services::sample_store::{SeaOrmArchiveStore, SeaOrmLiveStore};
use bitcoin_price_pipeline::services::transfer_status::TransferStatusRecorder;
use bitcoin_price_pipeline::telemetry::{self, DEFAULT_LOG_FILTER};

/// Move live price rows into the archive every 15 minutes
#[derive(Parser, Debug)]
#[command(name = "archive-transfer")]
struct Args {
    /// Run a single transfer (with retries) and exit
    #[arg(long)]
    once: bool,

    /// Skip writing the transfer_status row
    #[arg(long)]
    no_status: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    telemetry::init_tracing(DEFAULT_LOG_FILTER);
    let args = Args::parse();
    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to source database...");
    let live_db = Arc::new(Database::connect(&config.database_url).await?);

    let archive_db = if config.archive_database_url == config.database_url {
        live_db.clone()
    } else {
        tracing::info!("Connecting to archive database...");
        Arc::new(Database::connect(&config.archive_database_url).await?)
    };

    let recorder = if args.no_status {
        None
    } else {
        let recorder = TransferStatusRecorder::new(archive_db.clone(), JOB_NAME);
        recorder.ensure_table().await?;
        Some(recorder)
    };

    let archiver = Archiver::new(
        SeaOrmLiveStore::new(live_db),
        SeaOrmArchiveStore::new(archive_db),
        config.archiver_config(),
    );
    let schedule = config.schedule();

    if args.once {
        let outcome = run_with_retries(&archiver, &schedule, recorder.as_ref())
            .await
            .into_result()?;
        tracing::info!(
            moved = outcome.map(|o| o.moved()).unwrap_or_default(),
            "Archive transfer finished"
        );
        return Ok(());
    }

    run_archive_transfer_job(archiver, schedule, recorder).await;
    Ok(())
}
