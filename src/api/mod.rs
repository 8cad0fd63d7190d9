pub mod actions;
pub mod health;
pub mod metrics;
pub mod operations;
pub mod session;

use crate::config::Config;
use crate::db::Repository;
use crate::orchestration::StakingEngine;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<StakingEngine>,
    pub repo: Arc<Repository>,
    pub config: Config,
}

impl AppState {
    pub fn new(engine: Arc<StakingEngine>, repo: Arc<Repository>, config: Config) -> Self {
        Self {
            engine,
            repo,
            config,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/metrics", get(metrics::get_metrics))
        .route("/v1/countdown", get(metrics::get_countdown))
        .route("/v1/status", get(metrics::get_status))
        .route(
            "/v1/session",
            post(session::connect).delete(session::disconnect),
        )
        .route("/v1/stake", post(actions::stake))
        .route("/v1/unstake", post(actions::unstake))
        .route("/v1/unstake/percentage", post(actions::unstake_percentage))
        .route("/v1/claim", post(actions::claim))
        .route("/v1/multiplier/refresh", post(actions::refresh_multiplier))
        .route("/v1/withdraw-all", post(actions::withdraw_all))
        .route("/v1/operations", get(operations::get_operations))
        .layer(cors)
        .with_state(state)
}
