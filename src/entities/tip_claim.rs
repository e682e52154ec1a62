//! Tip claim entity: the append-only ledger of reported on-chain transfers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tip_claims")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Chain-level transfer identifier, `0x` + 64 hex. Idempotency key.
    #[sea_orm(column_type = "String(StringLen::N(66))", unique)]
    pub tx_hash: String,
    /// Staff member the tip is for. Immutable after creation.
    #[sea_orm(column_type = "String(StringLen::N(64))")]
    pub recipient_id: String,
    /// Sender wallet address, best effort. Never used for fund authorization.
    #[sea_orm(column_type = "String(StringLen::N(42))", nullable)]
    pub source_address: Option<String>,
    /// Request IP, used only for rate limiting and fraud review
    #[sea_orm(column_type = "String(StringLen::N(45))")]
    pub source_ip: String,
    /// Chain the transfer was submitted on
    #[sea_orm(column_type = "String(StringLen::N(32))")]
    pub network: String,
    /// Tip units claimed in this transaction
    pub count: i32,
    /// count x unit amount, frozen at submission time (base units)
    pub amount_base_units: i64,
    /// Server clock at record creation, not the chain timestamp
    pub submitted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
