use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::PendingOperation;
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct OperationsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDto {
    pub action_id: String,
    pub kind: String,
    pub operation_id: String,
    pub status: String,
    pub account: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub submitted_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<PendingOperation> for OperationDto {
    fn from(op: PendingOperation) -> Self {
        Self {
            action_id: op.action_id.to_string(),
            kind: op.kind.to_string(),
            operation_id: op.submitted_id.to_string(),
            status: op.status.as_str().to_string(),
            account: op.account.to_string(),
            amount: op.amount.map(|a| a.to_string()),
            submitted_at: op.submitted_at.to_rfc3339(),
            resolved_at: op.resolved_at.map(|t| t.to_rfc3339()),
            detail: op.detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OperationsResponse {
    pub operations: Vec<OperationDto>,
}

pub async fn get_operations(
    Query(params): Query<OperationsQuery>,
    State(state): State<AppState>,
) -> Result<Json<OperationsResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let operations = state
        .repo
        .list_operations(limit)
        .await?
        .into_iter()
        .map(OperationDto::from)
        .collect();

    Ok(Json(OperationsResponse { operations }))
}
