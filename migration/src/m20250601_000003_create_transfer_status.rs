use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Run ledger for the scheduled archive transfer.
pub fn transfer_status_table() -> TableCreateStatement {
    Table::create()
        .table(TransferStatus::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(TransferStatus::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(TransferStatus::JobName)
                .string_len(100)
                .not_null()
                .unique_key(),
        )
        .col(
            ColumnDef::new(TransferStatus::LastState)
                .string_len(20)
                .not_null(),
        )
        .col(
            ColumnDef::new(TransferStatus::LastAttemptAt)
                .timestamp()
                .null(),
        )
        .col(
            ColumnDef::new(TransferStatus::LastSuccessAt)
                .timestamp()
                .null(),
        )
        .col(ColumnDef::new(TransferStatus::LastError).text().null())
        .col(
            ColumnDef::new(TransferStatus::SuccessCount)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(TransferStatus::ErrorCount)
                .big_integer()
                .not_null()
                .default(0),
        )
        .col(
            ColumnDef::new(TransferStatus::RowsTransferred)
                .big_integer()
                .not_null()
                .default(0),
        )
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(transfer_status_table()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TransferStatus::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum TransferStatus {
    Table,
    Id,
    JobName,
    LastState,
    LastAttemptAt,
    LastSuccessAt,
    LastError,
    SuccessCount,
    ErrorCount,
    RowsTransferred,
}
