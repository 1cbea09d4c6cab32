//! REST API for launch preparation, submission, claims and pool administration

mod handlers;
mod responses;
mod routes;

pub use responses::ApiError;
pub use routes::*;

use crate::claims::ClaimTransactionBuilder;
use crate::config::ApiConfig;
use crate::launch::LaunchTransactionCoordinator;
use crate::pool::KeypairPool;
use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<LaunchTransactionCoordinator>,
    pub claims: Arc<ClaimTransactionBuilder>,
    pub pool: Arc<KeypairPool>,
    pub admin_token: Option<String>,
    pub max_page_size: i64,
}

impl ApiState {
    pub fn new(
        coordinator: Arc<LaunchTransactionCoordinator>,
        claims: Arc<ClaimTransactionBuilder>,
        config: &ApiConfig,
    ) -> Self {
        Self {
            pool: coordinator.pool().clone(),
            coordinator,
            claims,
            admin_token: config.admin_token.clone().filter(|t| !t.is_empty()),
            max_page_size: config.max_page_size,
        }
    }
}

/// Start the API server
pub async fn start_server(state: ApiState, config: &ApiConfig) -> Result<tokio::task::JoinHandle<()>> {
    let app = create_router(state, config.enable_cors);

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!("API server listening on {}", config.bind_address);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(handle)
}

/// Create the main API application
pub fn create_router(state: ApiState, enable_cors: bool) -> Router {
    let app = Router::new()
        .merge(create_launch_routes())
        .merge(create_claim_routes())
        .merge(create_admin_routes(state.clone()))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Health check handler
async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "service": "launch-engine"
    }))
}
