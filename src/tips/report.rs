//! On-demand aggregation over recorded claims. Correctness is the literal
//! arithmetic sum of matching rows, nothing more.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use crate::entities::tip_claim;

use super::TipError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Month,
}

impl Period {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "day" => Some(Self::Day),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
        }
    }
}

/// Half-open `[start, end)` bounds of the calendar bucket containing `now`.
pub fn bucket_bounds(period: Period, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    match period {
        Period::Day => day_bounds(now),
        Period::Month => month_bounds(now),
    }
}

pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(now.date_naive());
    (start, start + Duration::days(1))
}

pub fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .expect("first of current month is a valid date");
    let next_first = if now.month() == 12 {
        NaiveDate::from_ymd_opt(now.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(now.year(), now.month() + 1, 1)
    }
    .expect("first of next month is a valid date");
    (start_of_day(first), start_of_day(next_first))
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is a valid time"))
}

/// Sum of `count` for one recipient over `[from, to)`.
pub async fn recipient_total<C: ConnectionTrait>(
    conn: &C,
    recipient_id: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<i64, TipError> {
    let total = tip_claim::Entity::find()
        .filter(tip_claim::Column::RecipientId.eq(recipient_id))
        .filter(tip_claim::Column::SubmittedAt.gte(from))
        .filter(tip_claim::Column::SubmittedAt.lt(to))
        .select_only()
        .column_as(tip_claim::Column::Count.sum(), "total")
        .into_tuple::<Option<i64>>()
        .one(conn)
        .await?
        .flatten()
        .unwrap_or(0);

    assert!(total >= 0, "Tip aggregate must be non-negative");
    Ok(total)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientTotal {
    pub recipient_id: String,
    pub total: i64,
}

/// Sum of `count` over `[from, to)` grouped by recipient, largest first.
pub async fn leaderboard<C: ConnectionTrait>(
    conn: &C,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<RecipientTotal>, TipError> {
    assert!(limit > 0, "Leaderboard limit must be positive");
    assert!(limit <= 500, "Leaderboard limit exceeds defensive bound");

    let rows: Vec<(String, Option<i64>)> = tip_claim::Entity::find()
        .filter(tip_claim::Column::SubmittedAt.gte(from))
        .filter(tip_claim::Column::SubmittedAt.lt(to))
        .select_only()
        .column(tip_claim::Column::RecipientId)
        .column_as(tip_claim::Column::Count.sum(), "total")
        .group_by(tip_claim::Column::RecipientId)
        .into_tuple()
        .all(conn)
        .await?;

    let mut totals: Vec<RecipientTotal> = rows
        .into_iter()
        .map(|(recipient_id, total)| RecipientTotal {
            recipient_id,
            total: total.unwrap_or(0),
        })
        .collect();
    totals.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.recipient_id.cmp(&b.recipient_id))
    });
    totals.truncate(limit);
    Ok(totals)
}
