//! Sliding-window eligibility guard over the tip claim ledger.
//!
//! Bounds noise, not value: the on-chain transfer already cost real funds,
//! so the limiter's job is to stop one source flooding one recipient with
//! claim rows and notifications. A count-based sliding window avoids the
//! bucket-edge burst where a client spends the whole allowance at 23:59 and
//! again at 00:01.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use crate::entities::tip_claim;

use super::TipError;

/// Window parameters. Passed per call so the same guard serves live gating
/// and diagnostic display; defaults come from configuration, not from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    pub max_count: u32,
    pub window_hours: i64,
}

impl RatePolicy {
    pub fn new(max_count: u32, window_hours: i64) -> Self {
        assert!(max_count > 0, "Claim limit must be positive");
        assert!(window_hours > 0, "Rate window must be positive");
        assert!(window_hours <= 720, "Rate window cannot exceed 30 days");
        Self {
            max_count,
            window_hours,
        }
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(self.window_hours)
    }

    pub fn admits(&self, claims_in_window: u64) -> bool {
        claims_in_window < u64::from(self.max_count)
    }

    pub fn remaining(&self, claims_in_window: u64) -> u32 {
        let used = u32::try_from(claims_in_window).unwrap_or(u32::MAX);
        self.max_count.saturating_sub(used)
    }
}

/// Count of claims for `(source_ip, recipient_id)` inside the window ending
/// at `now`. The same predicate the submit path re-verifies under its
/// transaction.
pub async fn claims_in_window<C: ConnectionTrait>(
    conn: &C,
    source_ip: &str,
    recipient_id: &str,
    policy: &RatePolicy,
    now: DateTime<Utc>,
) -> Result<u64, TipError> {
    let count = tip_claim::Entity::find()
        .filter(tip_claim::Column::SourceIp.eq(source_ip))
        .filter(tip_claim::Column::RecipientId.eq(recipient_id))
        .filter(tip_claim::Column::SubmittedAt.gte(policy.window_start(now)))
        .count(conn)
        .await?;
    Ok(count)
}

pub async fn can_submit<C: ConnectionTrait>(
    conn: &C,
    source_ip: &str,
    recipient_id: &str,
    policy: &RatePolicy,
) -> Result<bool, TipError> {
    let count = claims_in_window(conn, source_ip, recipient_id, policy, Utc::now()).await?;
    Ok(policy.admits(count))
}

pub async fn remaining<C: ConnectionTrait>(
    conn: &C,
    source_ip: &str,
    recipient_id: &str,
    policy: &RatePolicy,
) -> Result<u32, TipError> {
    let count = claims_in_window(conn, source_ip, recipient_id, policy, Utc::now()).await?;
    Ok(policy.remaining(count))
}

/// Seconds until the earliest claim in the window slides out and a new claim
/// becomes eligible. Zero when nothing blocks.
pub async fn retry_after_seconds<C: ConnectionTrait>(
    conn: &C,
    source_ip: &str,
    recipient_id: &str,
    policy: &RatePolicy,
    now: DateTime<Utc>,
) -> Result<i64, TipError> {
    let earliest = tip_claim::Entity::find()
        .filter(tip_claim::Column::SourceIp.eq(source_ip))
        .filter(tip_claim::Column::RecipientId.eq(recipient_id))
        .filter(tip_claim::Column::SubmittedAt.gte(policy.window_start(now)))
        .order_by_asc(tip_claim::Column::SubmittedAt)
        .one(conn)
        .await?;

    Ok(earliest
        .map(|claim| {
            let eligible_at =
                claim.submitted_at.with_timezone(&Utc) + Duration::hours(policy.window_hours);
            (eligible_at - now).num_seconds().max(0)
        })
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    // In-memory stand-in for the ledger scan, using the exact predicate the
    // SQL filter applies: submitted_at >= window_start.
    fn in_window(policy: &RatePolicy, now: DateTime<Utc>, stamps: &[DateTime<Utc>]) -> u64 {
        stamps
            .iter()
            .filter(|stamp| **stamp >= policy.window_start(now))
            .count() as u64
    }

    #[test]
    fn sixth_claim_in_window_is_rejected() {
        let policy = RatePolicy::new(5, 24);
        let now = Utc::now();
        let stamps: Vec<_> = (1..=5).map(|i| now - Duration::hours(i)).collect();

        assert_eq!(in_window(&policy, now, &stamps), 5);
        assert!(!policy.admits(in_window(&policy, now, &stamps)));
        assert_eq!(policy.remaining(5), 0);
    }

    #[test]
    fn window_slides_rather_than_resetting_on_a_boundary() {
        let policy = RatePolicy::new(5, 24);
        let now = Utc::now();
        let mut stamps: Vec<_> = (1..=5).map(|i| now - Duration::hours(i)).collect();

        // Push the earliest claim just past the window: eligibility returns.
        stamps[4] = now - Duration::hours(25);
        let count = in_window(&policy, now, &stamps);
        assert_eq!(count, 4);
        assert!(policy.admits(count));
        assert_eq!(policy.remaining(count), 1);
    }

    #[test]
    fn remaining_never_goes_negative() {
        let policy = RatePolicy::new(5, 24);
        assert_eq!(policy.remaining(0), 5);
        assert_eq!(policy.remaining(4), 1);
        assert_eq!(policy.remaining(7), 0);
        assert_eq!(policy.remaining(u64::from(u32::MAX) + 10), 0);
    }

    #[test]
    fn policy_is_parameterized_per_call() {
        let strict = RatePolicy::new(1, 1);
        let lax = RatePolicy::new(100, 720);
        assert!(!strict.admits(1));
        assert!(lax.admits(99));
    }
}
