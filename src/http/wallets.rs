//! Staff wallet handlers: upsert, lookup, removal and the out-of-band
//! proof-of-control verification that flips the verified flag.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::address::{decode_proof_signature, sanitize_recipient_id, sanitize_wallet_address};
use crate::entities::staff_wallet;
use crate::state::AppState;

use super::HttpError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{owner_id}",
            put(upsert_wallet).get(get_wallet).delete(remove_wallet),
        )
        .route("/{owner_id}/verify", post(verify_wallet))
}

#[derive(Debug, Deserialize)]
pub struct WalletUpsertRequest {
    /// Payout address, typed in or taken from a connected wallet
    pub address: String,
    /// Optional proof-of-control material, hex or base64
    pub proof_signature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StaffWalletView {
    pub owner_id: String,
    pub address: String,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct WalletVerificationRequest {
    pub signature: String,
}

#[derive(Debug, Serialize)]
pub struct WalletVerificationResponse {
    pub owner_id: String,
    pub address: String,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Create or replace the wallet for a staff member. A changed address drops
/// any previous verification.
async fn upsert_wallet(
    Path(owner_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<WalletUpsertRequest>,
) -> Result<Json<StaffWalletView>, HttpError> {
    let owner_id = sanitize_recipient_id(&owner_id)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let address = sanitize_wallet_address(&request.address)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let proof_signature = request
        .proof_signature
        .as_deref()
        .map(decode_proof_signature)
        .transpose()
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let existing = staff_wallet::Entity::find_by_id(&owner_id)
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    let now = Utc::now().fixed_offset();
    let saved = match existing {
        Some(model) => {
            let address_changed = model.address != address;
            let mut active = model.into_active_model();
            active.address = Set(address);
            if let Some(signature) = proof_signature {
                active.proof_signature = Set(Some(signature));
            }
            if address_changed {
                active.verified = Set(false);
            }
            active.updated_at = Set(now);
            active
                .update(&state.database)
                .await
                .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        }
        None => {
            let model = staff_wallet::ActiveModel {
                owner_id: Set(owner_id.clone()),
                address: Set(address),
                proof_signature: Set(proof_signature),
                verified: Set(false),
                created_at: Set(now),
                updated_at: Set(now),
            };
            model
                .insert(&state.database)
                .await
                .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        }
    };

    info!("Stored wallet for {} ({})", saved.owner_id, saved.address);
    Ok(Json(wallet_view(saved)))
}

async fn get_wallet(
    Path(owner_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StaffWalletView>, HttpError> {
    let owner_id = sanitize_recipient_id(&owner_id)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let wallet = staff_wallet::Entity::find_by_id(&owner_id)
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::NOT_FOUND,
                format!("No wallet on file for {owner_id}"),
            )
        })?;

    Ok(Json(wallet_view(wallet)))
}

async fn remove_wallet(
    Path(owner_id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, HttpError> {
    let owner_id = sanitize_recipient_id(&owner_id)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let result = staff_wallet::Entity::delete_by_id(&owner_id)
        .exec(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;

    if result.rows_affected == 0 {
        return Err(HttpError::new(
            StatusCode::NOT_FOUND,
            format!("No wallet on file for {owner_id}"),
        ));
    }

    info!("Removed wallet for {owner_id}");
    Ok(StatusCode::NO_CONTENT)
}

/// Compare a provided signature against the stored proof material. Only a
/// match flips `verified`; the server alone writes that flag.
async fn verify_wallet(
    Path(owner_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<WalletVerificationRequest>,
) -> Result<Json<WalletVerificationResponse>, HttpError> {
    let owner_id = sanitize_recipient_id(&owner_id)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
    let provided = decode_proof_signature(&request.signature)
        .map_err(|err| HttpError::new(StatusCode::BAD_REQUEST, err.to_string()))?;

    let wallet = staff_wallet::Entity::find_by_id(&owner_id)
        .one(&state.database)
        .await
        .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?
        .ok_or_else(|| {
            HttpError::new(
                StatusCode::NOT_FOUND,
                format!("No wallet on file for {owner_id}"),
            )
        })?;

    let stored = wallet.proof_signature.clone();
    let address = wallet.address.clone();
    let matches = stored.as_deref() == Some(provided.as_slice());

    if matches && !wallet.verified {
        let mut active = wallet.into_active_model();
        active.verified = Set(true);
        active.updated_at = Set(Utc::now().fixed_offset());
        active
            .update(&state.database)
            .await
            .map_err(|err| HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
        info!("Verified wallet for {owner_id}");
    }

    Ok(Json(WalletVerificationResponse {
        owner_id,
        address,
        verified: matches,
        reason: if matches {
            None
        } else {
            Some("Signature mismatch or no proof material on file".to_string())
        },
    }))
}

fn wallet_view(model: staff_wallet::Model) -> StaffWalletView {
    StaffWalletView {
        owner_id: model.owner_id,
        address: model.address,
        verified: model.verified,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}
