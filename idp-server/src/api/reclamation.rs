//! Reclamation API handlers
//!
//! Manual trigger and status of the stack reclaimer.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::AppState;
use crate::scheduler::DeletionCriteria;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclamationStatus {
    pub running: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub criteria: DeletionCriteria,
}

/// POST /api/reclamation/trigger
/// Start a pass without waiting for it
pub async fn trigger(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    // Detached; the pass logs its own summary
    let _ = state.reclaimer.trigger();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "triggered" })),
    )
}

/// GET /api/reclamation/status
pub async fn status(State(state): State<AppState>) -> Json<ReclamationStatus> {
    Json(ReclamationStatus {
        running: state.reclaimer.is_running(),
        last_run: state.reclaimer.last_run(),
        criteria: state.reclaimer.criteria(),
    })
}
