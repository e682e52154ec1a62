use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Tip claims ledger: one row per on-chain transfer reported to the
        // server, append-only. The unique transaction hash index is the
        // authority for the at-most-once recording guarantee.
        manager
            .create_table(
                Table::create()
                    .table(TipClaims::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TipClaims::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TipClaims::TxHash)
                            .string_len(66) // 0x + 64 hex chars
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TipClaims::RecipientId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TipClaims::SourceAddress).string_len(42))
                    .col(
                        ColumnDef::new(TipClaims::SourceIp)
                            .string_len(45) // IPv6 max length
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TipClaims::Network)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(TipClaims::Count).integer().not_null())
                    .col(
                        ColumnDef::new(TipClaims::AmountBaseUnits)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TipClaims::SubmittedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // Idempotency key: at most one claim per transaction
                    .index(
                        Index::create()
                            .name("idx_tip_claims_tx_hash")
                            .col(TipClaims::TxHash)
                            .unique(),
                    )
                    // Rate-limit scan by (source, recipient) over time
                    .index(
                        Index::create()
                            .name("idx_tip_claims_source_recipient_time")
                            .col(TipClaims::SourceIp)
                            .col(TipClaims::RecipientId)
                            .col(TipClaims::SubmittedAt),
                    )
                    // Aggregation by recipient over time
                    .index(
                        Index::create()
                            .name("idx_tip_claims_recipient_time")
                            .col(TipClaims::RecipientId)
                            .col(TipClaims::SubmittedAt),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TipClaims::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TipClaims {
    Table,
    Id,
    TxHash,
    RecipientId,
    SourceAddress,
    SourceIp,
    Network,
    Count,
    AmountBaseUnits,
    SubmittedAt,
}
