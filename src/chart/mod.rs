use thiserror::Error;

mod price_chart;
mod terminal;

pub use price_chart::{BITCOIN_ORANGE, PriceChart};
pub use terminal::{ChartTerminal, display};

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Terminal error: {0}")]
    Terminal(#[from] std::io::Error),

    #[error("Terminal already restored")]
    Restored,
}

pub type Result<T> = std::result::Result<T, ChartError>;
