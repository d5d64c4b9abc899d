use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Live table: samples written by the collector and not yet archived.
pub fn bitcoin_prices_table() -> TableCreateStatement {
    Table::create()
        .table(BitcoinPrices::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(BitcoinPrices::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(BitcoinPrices::Timestamp)
                .timestamp()
                .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
        )
        .col(
            ColumnDef::new(BitcoinPrices::Price)
                .decimal_len(12, 2)
                .not_null(),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(bitcoin_prices_table()).await?;

        // Archive runs and the chart both read in timestamp order
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bitcoin_prices_timestamp")
                    .table(BitcoinPrices::Table)
                    .col(BitcoinPrices::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BitcoinPrices::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum BitcoinPrices {
    Table,
    Id,
    Timestamp,
    Price,
}
