pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_bitcoin_prices;
mod m20250601_000002_create_bitcoin_archive;
mod m20250601_000003_create_transfer_status;

/// Idempotent `CREATE TABLE IF NOT EXISTS` statements, shared with the
/// pipeline binaries so they can ensure their tables at startup.
pub use m20250601_000001_create_bitcoin_prices::bitcoin_prices_table;
pub use m20250601_000002_create_bitcoin_archive::bitcoin_archive_table;
pub use m20250601_000003_create_transfer_status::transfer_status_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_bitcoin_prices::Migration),
            Box::new(m20250601_000002_create_bitcoin_archive::Migration),
            Box::new(m20250601_000003_create_transfer_status::Migration),
        ]
    }
}
