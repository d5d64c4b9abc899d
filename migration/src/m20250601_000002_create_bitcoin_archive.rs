use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Archive table: durable history plus the time each row was moved.
pub fn bitcoin_archive_table() -> TableCreateStatement {
    Table::create()
        .table(BitcoinArchive::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(BitcoinArchive::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(BitcoinArchive::Timestamp).timestamp().null())
        .col(ColumnDef::new(BitcoinArchive::Price).decimal_len(12, 2).null())
        .col(
            ColumnDef::new(BitcoinArchive::TransferredAt)
                .timestamp()
                .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(bitcoin_archive_table()).await?;

        // Post-insert verification filters on transferred_at
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bitcoin_archive_transferred_at")
                    .table(BitcoinArchive::Table)
                    .col(BitcoinArchive::TransferredAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bitcoin_archive_timestamp")
                    .table(BitcoinArchive::Table)
                    .col((BitcoinArchive::Timestamp, IndexOrder::Desc))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BitcoinArchive::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum BitcoinArchive {
    Table,
    Id,
    Timestamp,
    Price,
    TransferredAt,
}
