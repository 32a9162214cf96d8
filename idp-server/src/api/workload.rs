//! Workload API Handlers
//!
//! Serve both kinds; the `{kind}` path segment selects the service.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use idp_core::domain::deployment::LogPage;
use idp_core::domain::stack::Stack;
use idp_core::dto::workload::{
    DeploymentTriggered, RepoCreationResult, WorkloadRequest, WorkloadView,
};
use serde::Deserialize;

use crate::api::AppState;
use crate::api::error::ApiResult;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub workload: Option<String>,
    pub projectid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsQuery {
    pub continuation_token: Option<String>,
}

/// POST /api/{kind}
pub async fn create_workload(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(req): Json<WorkloadRequest>,
) -> ApiResult<(StatusCode, Json<RepoCreationResult>)> {
    let service = state.service(&kind)?;
    tracing::info!("Creating {}: {}", service.kind(), req.name);

    let result = service.create_workload(req).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/{kind}
pub async fn list_workloads(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Stack>>> {
    let service = state.service(&kind)?;
    tracing::debug!("Listing {}", kind);

    let stacks = service
        .list_workloads(query.workload.as_deref(), query.projectid.as_deref())
        .await?;
    Ok(Json(stacks))
}

/// GET /api/{kind}/{org}/{project}/{stack}
pub async fn get_workload(
    State(state): State<AppState>,
    Path((kind, org, project, stack)): Path<(String, String, String, String)>,
) -> ApiResult<Json<WorkloadView>> {
    let service = state.service(&kind)?;
    tracing::debug!("Getting {}: {}/{}/{}", service.kind(), org, project, stack);

    let view = service.get_workload_details(&org, &project, &stack).await?;
    Ok(Json(view))
}

/// PUT /api/{kind}/{org}/{project}/{stack}
pub async fn update_workload(
    State(state): State<AppState>,
    Path((kind, org, project, stack)): Path<(String, String, String, String)>,
    Json(req): Json<WorkloadRequest>,
) -> ApiResult<Json<DeploymentTriggered>> {
    let service = state.service(&kind)?;
    tracing::info!("Updating {}: {}/{}/{}", service.kind(), org, project, stack);

    let triggered = service.update_workload(&org, &project, &stack, req).await?;
    Ok(Json(triggered))
}

/// DELETE /api/{kind}/{org}/{project}/{stack}
pub async fn delete_workload(
    State(state): State<AppState>,
    Path((kind, org, project, stack)): Path<(String, String, String, String)>,
) -> ApiResult<StatusCode> {
    let service = state.service(&kind)?;
    tracing::info!("Deleting {}: {}/{}/{}", service.kind(), org, project, stack);

    service.delete_workload(&org, &project, &stack).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/{kind}/{org}/{project}/{stack}/deployments/{id}/logs
pub async fn get_deployment_logs(
    State(state): State<AppState>,
    Path((kind, org, project, stack, id)): Path<(String, String, String, String, String)>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<LogPage>> {
    let service = state.service(&kind)?;

    let page = service
        .get_deployment_logs(
            &org,
            &project,
            &stack,
            &id,
            query.continuation_token.as_deref(),
        )
        .await?;
    Ok(Json(page))
}
