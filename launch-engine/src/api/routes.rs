//! API route definitions

use super::{handlers::*, ApiState};
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
    Router,
};

use super::responses::unauthorized;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Launch preparation and submission
pub fn create_launch_routes() -> Router<ApiState> {
    Router::new()
        .route("/launch/prepare", post(prepare_launch))
        .route("/launch/submit", post(submit_launch))
}

pub fn create_claim_routes() -> Router<ApiState> {
    Router::new().route("/claims/build", post(build_claims))
}

/// Pool administration, guarded by the admin token when one is configured
pub fn create_admin_routes(state: ApiState) -> Router<ApiState> {
    Router::new()
        .route("/admin/identities", post(generate_identities))
        .route("/admin/identities/stats", get(supply_stats))
        .route("/admin/identities/queue", get(identity_queue))
        .route(
            "/admin/identities/:address/assignment",
            put(assign_identity).delete(unassign_identity),
        )
        .route("/admin/wallets/:wallet/identities", get(wallet_identities))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

async fn require_admin_token(State(state): State<ApiState>, request: Request, next: Next) -> Response {
    if let Some(expected) = state.admin_token.as_deref() {
        let provided = request
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected) {
            tracing::warn!("Rejected admin request to {}", request.uri().path());
            return unauthorized();
        }
    }
    next.run(request).await
}
