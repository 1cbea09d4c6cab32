//! API request handlers

use super::{responses::*, ApiState};
use crate::claims::ClaimBatch;
use crate::launch::{parse_pubkey, LaunchRequest, PreparedLaunch, SubmitRequest, SubmittedLaunch};
use crate::pool::GenerationReport;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Allocate an identity and return the unsigned launch transaction
pub async fn prepare_launch(
    State(state): State<ApiState>,
    Json(request): Json<LaunchRequest>,
) -> ApiResult<PreparedLaunch> {
    let prepared = state.coordinator.prepare(request).await?;
    Ok(Json(prepared))
}

/// Counter-sign and submit a caller-signed launch
pub async fn submit_launch(
    State(state): State<ApiState>,
    Json(request): Json<SubmitRequest>,
) -> ApiResult<SubmittedLaunch> {
    let submitted = state.coordinator.submit(request).await?;
    Ok(Json(submitted))
}

pub async fn build_claims(
    State(state): State<ApiState>,
    Json(request): Json<BuildClaimsRequest>,
) -> ApiResult<ClaimBatch> {
    let batch = state
        .claims
        .build_claim_batch(&request.creator_wallet, &request.snapshot)
        .await?;
    Ok(Json(batch))
}

pub async fn generate_identities(
    State(state): State<ApiState>,
    Json(request): Json<GenerateIdentitiesRequest>,
) -> Result<(StatusCode, Json<GenerationReport>), ApiError> {
    let report = state.pool.generate_identities(request.count).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn supply_stats(State(state): State<ApiState>) -> ApiResult<SupplyStatsResponse> {
    let stats = state.pool.supply_stats().await?;
    Ok(Json(SupplyStatsResponse { stats }))
}

/// Unused identities in queue order
pub async fn identity_queue(
    State(state): State<ApiState>,
    Query(query): Query<QueueQuery>,
) -> ApiResult<QueueResponse> {
    let limit = query.limit.unwrap_or(50).min(state.max_page_size);
    let offset = query.offset.unwrap_or(0);

    let identities = state.pool.queue(limit, offset).await?;
    Ok(Json(QueueResponse {
        identities,
        limit,
        offset,
    }))
}

pub async fn assign_identity(
    State(state): State<ApiState>,
    Path(address): Path<String>,
    Json(request): Json<AssignIdentityRequest>,
) -> ApiResult<Value> {
    let address = parse_pubkey(&address, "address")?;
    let wallet = parse_pubkey(&request.wallet, "wallet")?;

    state
        .pool
        .assign_identity(&address, &wallet, request.note.as_deref())
        .await?;
    Ok(Json(json!({
        "public_address": address.to_string(),
        "assigned_wallet": wallet.to_string(),
    })))
}

pub async fn unassign_identity(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Result<StatusCode, ApiError> {
    let address = parse_pubkey(&address, "address")?;
    state.pool.unassign_identity(&address).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn wallet_identities(
    State(state): State<ApiState>,
    Path(wallet): Path<String>,
) -> ApiResult<AssignedIdentitiesResponse> {
    let wallet_key = parse_pubkey(&wallet, "wallet")?;
    let identities = state.pool.assigned_identities(&wallet_key).await?;
    Ok(Json(AssignedIdentitiesResponse { wallet, identities }))
}
