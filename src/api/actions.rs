use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use super::AppState;
use crate::domain::BaseUnits;
use crate::error::AppError;
use crate::orchestration::ActionReport;

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    /// Decimal string in asset units, e.g. `"12.5"`.
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct PercentageRequest {
    pub percentage: u32,
}

fn parse_amount(state: &AppState, raw: &str) -> Result<BaseUnits, AppError> {
    BaseUnits::parse_display(raw, state.config.token_decimals)
        .map_err(|e| AppError::BadRequest(format!("Invalid amount '{}': {}", raw, e)))
}

pub async fn stake(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<ActionReport>, AppError> {
    let amount = parse_amount(&state, &req.amount)?;
    let report = state.engine.orchestrator().stake(amount).await?;
    Ok(Json(report))
}

pub async fn unstake(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<ActionReport>, AppError> {
    let amount = parse_amount(&state, &req.amount)?;
    let report = state.engine.orchestrator().unstake(amount).await?;
    Ok(Json(report))
}

pub async fn unstake_percentage(
    State(state): State<AppState>,
    Json(req): Json<PercentageRequest>,
) -> Result<Json<ActionReport>, AppError> {
    let report = state
        .engine
        .orchestrator()
        .unstake_by_percentage(req.percentage)
        .await?;
    Ok(Json(report))
}

pub async fn claim(State(state): State<AppState>) -> Result<Json<ActionReport>, AppError> {
    Ok(Json(state.engine.orchestrator().claim_rewards().await?))
}

pub async fn refresh_multiplier(
    State(state): State<AppState>,
) -> Result<Json<ActionReport>, AppError> {
    Ok(Json(state.engine.orchestrator().refresh_multiplier().await?))
}

pub async fn withdraw_all(State(state): State<AppState>) -> Result<Json<ActionReport>, AppError> {
    Ok(Json(state.engine.orchestrator().withdraw_all().await?))
}
