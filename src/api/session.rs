use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::AppState;
use crate::domain::Address;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub account: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub account: Option<String>,
}

pub async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let account = Address::from_str(&req.account)
        .map_err(|e| AppError::BadRequest(format!("Invalid account address: {}", e)))?;
    state.engine.session().connect(account.clone());
    Ok(Json(SessionResponse {
        account: Some(account.to_string()),
    }))
}

pub async fn disconnect(State(state): State<AppState>) -> StatusCode {
    state.engine.session().disconnect();
    StatusCode::NO_CONTENT
}
