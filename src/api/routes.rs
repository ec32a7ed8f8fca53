//! API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<ApiState>`.

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::engine::settlement::{SettlementCoordinator, SettlementError};
use crate::storage::{SettlementJournal, SettlementRecord};
use crate::types::SwapStatus;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub service_name: String,
    pub coordinator: Arc<SettlementCoordinator>,
    /// Signs the deposit and payout transfers.
    pub signer: SecretString,
    pub journal: Option<Arc<SettlementJournal>>,
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SwapBody {
    pub amount: Decimal,
    pub user: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: format!("{} is running", state.service_name),
    })
}

/// POST /swap
pub async fn execute_swap(
    State(state): State<AppState>,
    Json(body): Json<SwapBody>,
) -> (StatusCode, Json<Value>) {
    info!(amount = %body.amount, user = %body.user, "Swap requested");

    match state
        .coordinator
        .run_settlement(body.amount, &body.user, &state.signer)
        .await
    {
        Ok(report) if report.status == SwapStatus::Success => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "settlement": report,
            })),
        ),
        Ok(report) => {
            let payout_error = report.payout_error().map(|e| e.to_string());
            (
                StatusCode::OK,
                Json(json!({
                    "status": "partial_success",
                    "settlement": report,
                    "payout_error": payout_error,
                    "message": "Swap completed but payout failed",
                })),
            )
        }
        Err(err) => {
            error!(code = err.code(), error = %err, "Settlement failed");
            (status_code(&err), Json(error_body(&err)))
        }
    }
}

/// GET /api/settlements/pending
pub async fn get_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<SettlementRecord>>, (StatusCode, Json<Value>)> {
    let Some(journal) = state.journal.clone() else {
        return Ok(Json(Vec::new()));
    };
    let pending = tokio::task::spawn_blocking(move || journal.pending())
        .await
        .map_err(anyhow::Error::from)
        .and_then(|loaded| loaded);
    pending.map(Json).map_err(|e| {
        error!(error = %e, "Failed to read settlement journal");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "error": format!("{e:#}")})),
        )
    })
}

fn status_code(err: &SettlementError) -> StatusCode {
    match err {
        SettlementError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SettlementError::Deposit(_) | SettlementError::Swap(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_body(err: &SettlementError) -> Value {
    let mut body = json!({
        "status": err.status(),
        "code": err.code(),
        "error": err.to_string(),
    });
    if let SettlementError::Swap(failure) = err {
        body["reached"] = json!(failure.reached);
        body["stranded"] = json!(failure.first_fill);
    }
    body
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
