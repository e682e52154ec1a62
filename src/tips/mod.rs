//! Server-side tip claim handling: eligibility, exactly-once recording and
//! the orchestrated submit path.

pub mod limiter;
pub mod recorder;
pub mod report;

use chrono::Utc;
use sea_orm::{DatabaseConnection, IsolationLevel, TransactionTrait};
use tracing::info;

use crate::entities::tip_claim;

pub use limiter::RatePolicy;
pub use recorder::NewTipClaim;

/// Defensive ceiling on the units claimed in one transaction.
pub const MAX_CLAIM_COUNT: i32 = 100;

/// Enumerable failure kinds of the claim pipeline. Each maps to one HTTP
/// status; the orchestration layer never inspects message strings.
#[derive(Debug, thiserror::Error)]
pub enum TipError {
    /// The hash is already recorded. Not an end-user error: the tip was
    /// applied by an earlier submission.
    #[error("transaction {tx_hash} is already recorded")]
    DuplicateTransaction { tx_hash: String },
    #[error("tip limit of {max_count} per {window_hours}h reached for this recipient")]
    RateLimited {
        max_count: u32,
        window_hours: i64,
        retry_after_seconds: i64,
    },
    #[error("invalid claim: {0}")]
    InvalidClaim(String),
    #[error("storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),
}

#[derive(Debug)]
pub struct ClaimReceipt {
    pub claim: tip_claim::Model,
    pub remaining: u32,
}

/// Record a claim behind the rate limiter.
///
/// Eligibility check, insert and re-verified count run inside one
/// serializable transaction: two submissions racing for the same
/// `(source_ip, recipient_id)` near the limit cannot both commit, and two
/// submissions with the same hash are serialized by the unique index
/// regardless of this transaction's checks.
pub async fn submit_claim(
    db: &DatabaseConnection,
    claim: NewTipClaim,
    policy: &RatePolicy,
) -> Result<ClaimReceipt, TipError> {
    if claim.count < 1 {
        return Err(TipError::InvalidClaim(
            "count must be at least 1".to_string(),
        ));
    }
    if claim.count > MAX_CLAIM_COUNT {
        return Err(TipError::InvalidClaim(format!(
            "count exceeds the {MAX_CLAIM_COUNT} unit ceiling"
        )));
    }

    let now = Utc::now();
    let txn = db
        .begin_with_config(Some(IsolationLevel::Serializable), None)
        .await?;

    let before =
        limiter::claims_in_window(&txn, &claim.source_ip, &claim.recipient_id, policy, now).await?;
    if !policy.admits(before) {
        let retry_after_seconds =
            limiter::retry_after_seconds(&txn, &claim.source_ip, &claim.recipient_id, policy, now)
                .await?;
        txn.rollback().await?;
        return Err(TipError::RateLimited {
            max_count: policy.max_count,
            window_hours: policy.window_hours,
            retry_after_seconds,
        });
    }

    let recorded = recorder::record(&txn, claim, now).await?;

    // Re-verify with the insert visible: a racer that slipped past the first
    // check rolls back here instead of exceeding the limit.
    let after = limiter::claims_in_window(
        &txn,
        &recorded.source_ip,
        &recorded.recipient_id,
        policy,
        now,
    )
    .await?;
    if after > u64::from(policy.max_count) {
        let retry_after_seconds = limiter::retry_after_seconds(
            &txn,
            &recorded.source_ip,
            &recorded.recipient_id,
            policy,
            now,
        )
        .await?;
        txn.rollback().await?;
        return Err(TipError::RateLimited {
            max_count: policy.max_count,
            window_hours: policy.window_hours,
            retry_after_seconds,
        });
    }

    txn.commit().await?;

    info!(
        "Recorded tip claim {} for {} ({} unit(s)) from {}",
        recorded.tx_hash, recorded.recipient_id, recorded.count, recorded.source_ip
    );

    let used = u32::try_from(after).unwrap_or(u32::MAX);
    Ok(ClaimReceipt {
        remaining: policy.max_count.saturating_sub(used),
        claim: recorded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_stay_enumerable() {
        let duplicate = TipError::DuplicateTransaction {
            tx_hash: "0xabc".to_string(),
        };
        assert_eq!(
            duplicate.to_string(),
            "transaction 0xabc is already recorded"
        );

        let limited = TipError::RateLimited {
            max_count: 5,
            window_hours: 24,
            retry_after_seconds: 3_600,
        };
        assert_eq!(
            limited.to_string(),
            "tip limit of 5 per 24h reached for this recipient"
        );
    }
}
