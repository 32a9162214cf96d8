//! Team API handler

use axum::{Json, extract::State};
use idp_core::domain::team::Team;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /api/teams
pub async fn list_teams(State(state): State<AppState>) -> ApiResult<Json<Vec<Team>>> {
    tracing::debug!("Listing teams");

    let teams = state.accounts.list_teams().await?;
    Ok(Json(teams))
}
