//! Operation journal: every submitted write and its terminal status.

use crate::domain::{Address, BaseUnits, OperationId, OperationKind, OperationStatus, PendingOperation};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

/// Repository for the operation journal.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Record a freshly submitted operation.
    ///
    /// Re-recording the same ledger id is ignored; returns whether a row was written.
    pub async fn insert_operation(&self, op: &PendingOperation) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO operations (
                action_id, kind, submitted_id, status, account, amount,
                submitted_at, resolved_at, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(submitted_id) DO NOTHING
            "#,
        )
        .bind(op.action_id.to_string())
        .bind(op.kind.as_str())
        .bind(op.submitted_id.as_str())
        .bind(op.status.as_str())
        .bind(op.account.as_str())
        .bind(op.amount.as_ref().map(|a| a.to_string()))
        .bind(op.submitted_at.timestamp_millis())
        .bind(op.resolved_at.map(|t| t.timestamp_millis()))
        .bind(op.detail.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist a terminal status. Rows that are already terminal are left untouched.
    pub async fn resolve_operation(&self, op: &PendingOperation) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE operations
            SET status = ?, resolved_at = ?, detail = ?
            WHERE action_id = ? AND status = 'submitted'
            "#,
        )
        .bind(op.status.as_str())
        .bind(op.resolved_at.map(|t| t.timestamp_millis()))
        .bind(op.detail.as_deref())
        .bind(op.action_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recent operations first.
    pub async fn list_operations(&self, limit: i64) -> Result<Vec<PendingOperation>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT action_id, kind, submitted_id, status, account, amount,
                   submitted_at, resolved_at, detail
            FROM operations
            ORDER BY submitted_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_operation).collect()
    }

    pub async fn get_operation(
        &self,
        submitted_id: &OperationId,
    ) -> Result<Option<PendingOperation>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT action_id, kind, submitted_id, status, account, amount,
                   submitted_at, resolved_at, detail
            FROM operations
            WHERE submitted_id = ?
            "#,
        )
        .bind(submitted_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_operation).transpose()
    }
}

fn decode_err(msg: String) -> sqlx::Error {
    sqlx::Error::Decode(msg.into())
}

fn millis_to_datetime(ms: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .ok_or_else(|| decode_err(format!("timestamp out of range: {}", ms)))
}

fn row_to_operation(row: &SqliteRow) -> Result<PendingOperation, sqlx::Error> {
    let action_id: String = row.try_get("action_id")?;
    let kind: String = row.try_get("kind")?;
    let submitted_id: String = row.try_get("submitted_id")?;
    let status: String = row.try_get("status")?;
    let account: String = row.try_get("account")?;
    let amount: Option<String> = row.try_get("amount")?;
    let submitted_at: i64 = row.try_get("submitted_at")?;
    let resolved_at: Option<i64> = row.try_get("resolved_at")?;
    let detail: Option<String> = row.try_get("detail")?;

    Ok(PendingOperation {
        action_id: Uuid::parse_str(&action_id).map_err(|e| decode_err(e.to_string()))?,
        kind: OperationKind::from_str(&kind).map_err(decode_err)?,
        submitted_id: OperationId::new(submitted_id),
        status: OperationStatus::from_str(&status).map_err(decode_err)?,
        account: Address::from_str(&account).map_err(|e| decode_err(e.to_string()))?,
        amount: amount
            .map(|a| BaseUnits::from_str(&a).map_err(|e| decode_err(e.to_string())))
            .transpose()?,
        submitted_at: millis_to_datetime(submitted_at)?,
        resolved_at: resolved_at.map(millis_to_datetime).transpose()?,
        detail,
    })
}
