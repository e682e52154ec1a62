//! Exactly-once claim persistence, keyed by transaction hash.

use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{ActiveModelTrait, ConnectionTrait, SqlErr};

use crate::entities::tip_claim;

use super::TipError;

/// A claim as reported by the tipping page, already sanitized (lowercased
/// hash and addresses, bounded recipient id).
#[derive(Debug, Clone)]
pub struct NewTipClaim {
    pub tx_hash: String,
    pub recipient_id: String,
    pub source_address: Option<String>,
    pub source_ip: String,
    pub network: String,
    pub count: i32,
    pub amount_base_units: i64,
}

/// Insert the claim, relying on the unique tx_hash index for the
/// at-most-once guarantee. Two concurrent calls with the same hash produce
/// exactly one row and one `DuplicateTransaction`; an application-level
/// check-then-insert would be racy, so the storage layer is the authority.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    claim: NewTipClaim,
    now: DateTime<Utc>,
) -> Result<tip_claim::Model, TipError> {
    let tx_hash = claim.tx_hash.clone();
    let model = tip_claim::ActiveModel {
        id: NotSet,
        tx_hash: Set(claim.tx_hash),
        recipient_id: Set(claim.recipient_id),
        source_address: Set(claim.source_address),
        source_ip: Set(claim.source_ip),
        network: Set(claim.network),
        count: Set(claim.count),
        amount_base_units: Set(claim.amount_base_units),
        submitted_at: Set(now.fixed_offset()),
    };

    model.insert(conn).await.map_err(|err| {
        if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
            TipError::DuplicateTransaction { tx_hash }
        } else {
            TipError::Storage(err)
        }
    })
}
