// src/lib.rs

pub mod config;
pub mod telemetry;

pub mod entities {
    pub mod prelude;
    pub mod bitcoin_prices;
    pub mod bitcoin_archive;
    pub mod transfer_status;
}

pub mod services {
    pub mod binance_ticker;
    pub mod sample_store;
    pub mod collector;
    pub mod archiver;
    pub mod price_stats;
    pub mod price_history;
    pub mod transfer_status;
}

pub mod models;
pub mod jobs;
pub mod chart;
