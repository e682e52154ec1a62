use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Staff wallets: at most one payout address per staff member,
        // upserted on the owner key. The server is the sole mutator of
        // the verified flag.
        manager
            .create_table(
                Table::create()
                    .table(StaffWallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StaffWallets::OwnerId)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StaffWallets::Address)
                            .string_len(42) // 0x + 40 hex chars
                            .not_null(),
                    )
                    .col(ColumnDef::new(StaffWallets::ProofSignature).binary())
                    .col(
                        ColumnDef::new(StaffWallets::Verified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(StaffWallets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(StaffWallets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .index(
                        Index::create()
                            .name("idx_staff_wallets_address")
                            .col(StaffWallets::Address),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StaffWallets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StaffWallets {
    Table,
    OwnerId,
    Address,
    ProofSignature,
    Verified,
    CreatedAt,
    UpdatedAt,
}
