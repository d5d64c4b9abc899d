pub use super::bitcoin_archive::Entity as BitcoinArchive;
pub use super::bitcoin_prices::Entity as BitcoinPrices;
pub use super::transfer_status::Entity as TransferStatus;
