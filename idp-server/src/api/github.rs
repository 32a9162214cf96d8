//! GitHub login handler

use axum::{Form, Json, extract::State};
use idp_core::dto::repository::OAuthToken;
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    #[serde(default)]
    pub code: String,
}

/// POST /api/github/token
/// Exchange a login code for an access token
pub async fn exchange_token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> ApiResult<Json<OAuthToken>> {
    tracing::info!("Exchanging GitHub login code");

    let token = state.accounts.exchange_code(&form.code).await?;
    Ok(Json(token))
}
