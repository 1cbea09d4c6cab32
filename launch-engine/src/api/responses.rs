//! API request and response types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::claims::{ClaimSourceFailure, ClaimableSnapshot};
use crate::core::types::{IdentitySummary, SupplyStats};
use crate::core::LaunchError;

#[derive(Debug, Deserialize)]
pub struct BuildClaimsRequest {
    pub creator_wallet: String,
    pub snapshot: ClaimableSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct GenerateIdentitiesRequest {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct AssignIdentityRequest {
    pub wallet: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupplyStatsResponse {
    pub stats: SupplyStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueResponse {
    pub identities: Vec<IdentitySummary>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignedIdentitiesResponse {
    pub wallet: String,
    pub identities: Vec<IdentitySummary>,
}

/// Error body: `{ "error": { "code", "message", "retryable", "failures"? } }`
#[derive(Debug)]
pub struct ApiError(pub LaunchError);

impl From<LaunchError> for ApiError {
    fn from(err: LaunchError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            LaunchError::PoolExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LaunchError::SigningWindowExpired { .. } => StatusCode::GONE,
            LaunchError::BlockhashExpired => StatusCode::CONFLICT,
            LaunchError::LedgerRejection(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LaunchError::InvalidParameters(_) | LaunchError::InvalidTransaction(_) => {
                StatusCode::BAD_REQUEST
            }
            LaunchError::IdentityNotFound(_) => StatusCode::NOT_FOUND,
            LaunchError::NoClaimableSources { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LaunchError::Ledger(_) => StatusCode::BAD_GATEWAY,
            LaunchError::Configuration(_)
            | LaunchError::Storage(_)
            | LaunchError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let failures: Option<&Vec<ClaimSourceFailure>> = match &self.0 {
            LaunchError::NoClaimableSources { failures } => Some(failures),
            _ => None,
        };

        let mut error = json!({
            "code": self.0.code(),
            "message": self.0.to_string(),
            "retryable": self.0.is_retryable(),
        });
        if let Some(failures) = failures {
            error["failures"] = json!(failures);
        }
        (status, Json(json!({ "error": error }))).into_response()
    }
}

/// Admin-token rejection
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": { "code": "UNAUTHORIZED", "message": "missing or invalid admin token", "retryable": false } })),
    )
        .into_response()
}
