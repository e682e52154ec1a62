//! Tip claim HTTP handlers: submission behind the rate limiter, allowance
//! display, history and on-demand aggregates.

use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use tracing::info;

use crate::address::{sanitize_recipient_id, sanitize_tx_hash, sanitize_wallet_address};
use crate::entities::tip_claim;
use crate::state::AppState;
use crate::tips::report::{Period, bucket_bounds};
use crate::tips::{self, MAX_CLAIM_COUNT, NewTipClaim, TipError, limiter, report};
use crate::token::format_token;

use super::HttpError;

/// Maximum claims to return in history
pub const MAX_HISTORY_LIMIT: u64 = 100;

/// Maximum leaderboard entries per response
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/claims", post(submit_claim))
        .route("/allowance", get(get_allowance))
        .route("/summary", get(get_summary))
        .route("/leaderboard", get(get_leaderboard))
        .route("/history", get(get_history))
        .route("/config", get(get_config))
}

/// Request body for a tip claim
#[derive(Debug, Deserialize)]
pub struct ClaimSubmitRequest {
    /// Transaction hash reported by the guest's wallet
    pub tx_hash: String,
    /// Staff member the tip is for
    pub recipient_id: String,
    /// Tip units in this transaction (defaults to 1)
    pub count: Option<i32>,
    /// Sender wallet address, best effort
    pub source_address: Option<String>,
    /// Chain name, must match the configured network when present
    pub network: Option<String>,
}

/// Response from a claim submission
#[derive(Debug, Serialize)]
pub struct ClaimSubmitResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<i64>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AllowanceQuery {
    pub recipient_id: String,
}

#[derive(Debug, Serialize)]
pub struct AllowanceResponse {
    pub recipient_id: String,
    pub remaining: u32,
    pub max_count: u32,
    pub window_hours: i64,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub recipient_id: String,
    pub period: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LeaderboardQuery {
    pub period: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub recipient_id: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Tip claim history entry
#[derive(Debug, Serialize)]
pub struct ClaimHistoryEntry {
    pub tx_hash: String,
    pub recipient_id: String,
    pub count: i32,
    pub amount_formatted: String,
    pub network: String,
    pub submitted_at: DateTime<Utc>,
    pub explorer_url: String,
}

/// Public chain parameters for the tipping page
#[derive(Debug, Serialize)]
pub struct TipConfigResponse {
    pub network: String,
    pub display_name: String,
    pub chain_id: u64,
    pub token_address: String,
    pub token_decimals: u32,
    pub token_symbol: String,
    pub tip_amount: String,
    pub explorer_url: String,
}

/// Record a claimed on-chain transfer
async fn submit_claim(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(request): Json<ClaimSubmitRequest>,
) -> Result<(StatusCode, Json<ClaimSubmitResponse>), HttpError> {
    let source_ip = addr.ip().to_string();

    let tx_hash = sanitize_tx_hash(&request.tx_hash)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let recipient_id = sanitize_recipient_id(&request.recipient_id)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let source_address = request
        .source_address
        .as_deref()
        .map(sanitize_wallet_address)
        .transpose()
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    if let Some(network) = &request.network {
        if !network.eq_ignore_ascii_case(&state.chain.network) {
            return Err(HttpError::new(
                StatusCode::BAD_REQUEST,
                format!(
                    "Unsupported network {network:?}; tips settle on {}",
                    state.chain.network
                ),
            ));
        }
    }

    let count = request.count.unwrap_or(1);
    if !(1..=MAX_CLAIM_COUNT).contains(&count) {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("count must be between 1 and {MAX_CLAIM_COUNT}"),
        ));
    }

    let unit = state
        .chain
        .unit_amount_base_units()
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let amount_base_units = i64::try_from(unit * count as u128).map_err(|_| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            "Claimed amount exceeds ledger bounds".to_string(),
        )
    })?;

    let claim = NewTipClaim {
        tx_hash,
        recipient_id,
        source_address,
        source_ip,
        network: state.chain.network.clone(),
        count,
        amount_base_units,
    };

    let policy = state.policy();
    match tips::submit_claim(&state.database, claim, &policy).await {
        Ok(receipt) => {
            let response = ClaimSubmitResponse {
                accepted: true,
                reason: None,
                claim_id: Some(receipt.claim.id),
                explorer_url: Some(state.chain.explorer_tx_url(&receipt.claim.tx_hash)),
                remaining: Some(receipt.remaining),
                retry_after_seconds: None,
                message: "Tip recorded. Thank you!".to_string(),
            };
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(TipError::DuplicateTransaction { tx_hash }) => {
            info!("Duplicate tip claim for {tx_hash}");
            let response = ClaimSubmitResponse {
                accepted: false,
                reason: Some("duplicate_transaction"),
                claim_id: None,
                explorer_url: Some(state.chain.explorer_tx_url(&tx_hash)),
                remaining: None,
                retry_after_seconds: None,
                message: "This transaction was already recorded; the tip is applied.".to_string(),
            };
            Ok((StatusCode::CONFLICT, Json(response)))
        }
        Err(TipError::RateLimited {
            retry_after_seconds,
            window_hours,
            ..
        }) => {
            let response = ClaimSubmitResponse {
                accepted: false,
                reason: Some("rate_limited"),
                claim_id: None,
                explorer_url: None,
                remaining: Some(0),
                retry_after_seconds: Some(retry_after_seconds),
                message: format!(
                    "Tip limit reached. Please wait about {} hour(s) before tipping this staff member again.",
                    (retry_after_seconds / 3600 + 1).min(window_hours)
                ),
            };
            Ok((StatusCode::TOO_MANY_REQUESTS, Json(response)))
        }
        Err(TipError::InvalidClaim(message)) => Err(HttpError::new(StatusCode::BAD_REQUEST, message)),
        Err(TipError::Storage(err)) => Err(HttpError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            err.to_string(),
        )),
    }
}

/// Remaining claims for the caller against one recipient ("you have N tips
/// left today")
async fn get_allowance(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<AllowanceQuery>,
) -> Result<Json<AllowanceResponse>, HttpError> {
    let recipient_id = sanitize_recipient_id(&query.recipient_id)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let source_ip = addr.ip().to_string();

    let policy = state.policy();
    let remaining = limiter::remaining(&state.database, &source_ip, &recipient_id, &policy)
        .await
        .map_err(tip_error_status)?;

    Ok(Json(AllowanceResponse {
        recipient_id,
        remaining,
        max_count: policy.max_count,
        window_hours: policy.window_hours,
    }))
}

/// Calendar-bucket total for one recipient
async fn get_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let recipient_id = sanitize_recipient_id(&query.recipient_id)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let period = parse_period(query.period.as_deref())?;

    let cache_key = format!("summary::{recipient_id}::{}", period.as_str());
    if let Some(cached) = state.cache.summaries.get(&cache_key).await {
        return Ok(Json(cached));
    }

    let (from, to) = bucket_bounds(period, Utc::now());
    let total = report::recipient_total(&state.database, &recipient_id, from, to)
        .await
        .map_err(tip_error_status)?;

    let body = json!({
        "recipient_id": recipient_id,
        "period": period.as_str(),
        "from": from,
        "to": to,
        "total": total,
    });
    state.cache.summaries.insert(cache_key, body.clone()).await;

    Ok(Json(body))
}

/// Grouped totals across recipients for the current bucket
async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let period = parse_period(query.period.as_deref())?;
    let limit = query.limit.unwrap_or(20).min(MAX_LEADERBOARD_LIMIT);
    if limit == 0 {
        return Err(HttpError::new(
            StatusCode::BAD_REQUEST,
            "limit must be positive".to_string(),
        ));
    }

    let cache_key = format!("leaderboard::{}::{limit}", period.as_str());
    if let Some(cached) = state.cache.leaderboards.get(&cache_key).await {
        return Ok(Json(cached));
    }

    let (from, to) = bucket_bounds(period, Utc::now());
    let totals = report::leaderboard(&state.database, from, to, limit)
        .await
        .map_err(tip_error_status)?;

    let entries: Vec<serde_json::Value> = totals
        .iter()
        .map(|entry| {
            json!({
                "recipient_id": entry.recipient_id,
                "total": entry.total,
            })
        })
        .collect();
    let body = json!({
        "period": period.as_str(),
        "from": from,
        "to": to,
        "entries": entries,
    });
    state
        .cache
        .leaderboards
        .insert(cache_key, body.clone())
        .await;

    Ok(Json(body))
}

/// Recent claims, newest first
async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ClaimHistoryEntry>>, HttpError> {
    let limit = query.limit.unwrap_or(20).min(MAX_HISTORY_LIMIT);
    let offset = query.offset.unwrap_or(0);

    let mut select = tip_claim::Entity::find();

    if let Some(recipient_id) = query.recipient_id {
        let recipient_id = sanitize_recipient_id(&recipient_id)
            .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
        select = select.filter(tip_claim::Column::RecipientId.eq(recipient_id));
    }

    let claims = select
        .order_by_desc(tip_claim::Column::SubmittedAt)
        .limit(limit)
        .offset(offset)
        .all(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let entries: Vec<ClaimHistoryEntry> = claims
        .into_iter()
        .map(|claim| ClaimHistoryEntry {
            explorer_url: state.chain.explorer_tx_url(&claim.tx_hash),
            amount_formatted: format_token(
                claim.amount_base_units.max(0) as u128,
                state.chain.token_decimals,
                &state.chain.token_symbol,
            ),
            tx_hash: claim.tx_hash,
            recipient_id: claim.recipient_id,
            count: claim.count,
            network: claim.network,
            submitted_at: claim.submitted_at.with_timezone(&Utc),
        })
        .collect();

    Ok(Json(entries))
}

/// Chain parameters the tipping page needs before a wallet is connected
async fn get_config(State(state): State<AppState>) -> Json<TipConfigResponse> {
    Json(TipConfigResponse {
        network: state.chain.network.clone(),
        display_name: state.chain.display_name.clone(),
        chain_id: state.chain.chain_id,
        token_address: state.chain.token_address.clone(),
        token_decimals: state.chain.token_decimals,
        token_symbol: state.chain.token_symbol.clone(),
        tip_amount: state.chain.tip_amount.clone(),
        explorer_url: state.chain.explorer_url.clone(),
    })
}

fn parse_period(value: Option<&str>) -> Result<Period, HttpError> {
    match value {
        None => Ok(Period::Month),
        Some(raw) => Period::parse(raw).ok_or_else(|| {
            HttpError::new(
                StatusCode::BAD_REQUEST,
                format!("Unsupported period {raw:?}; expected \"day\" or \"month\""),
            )
        }),
    }
}

/// Read-path errors: anything the limiter/report surface here is storage.
fn tip_error_status(err: TipError) -> HttpError {
    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
