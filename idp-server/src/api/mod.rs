//! API Module
//!
//! HTTP API layer for the provisioning server.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod github;
pub mod health;
pub mod reclamation;
pub mod team;
pub mod workload;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::error::{ApiError, ApiResult};
use crate::scheduler::StackReclaimer;
use crate::service::{AccountService, WorkloadService};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub workloads: WorkloadService,
    pub workflows: WorkloadService,
    pub accounts: AccountService,
    pub reclaimer: StackReclaimer,
}

impl AppState {
    /// Service for a collection segment (`workloads` or `workflows`)
    pub fn service(&self, kind: &str) -> ApiResult<&WorkloadService> {
        [&self.workloads, &self.workflows]
            .into_iter()
            .find(|service| service.kind().plural() == kind)
            .ok_or_else(|| ApiError::NotFound(format!("unknown collection '{}'", kind)))
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Account endpoints
        .route("/api/github/token", post(github::exchange_token))
        .route("/api/teams", get(team::list_teams))
        // Reclamation endpoints
        .route("/api/reclamation/trigger", post(reclamation::trigger))
        .route("/api/reclamation/status", get(reclamation::status))
        // Workload and workflow endpoints
        .route(
            "/api/{kind}",
            post(workload::create_workload).get(workload::list_workloads),
        )
        .route(
            "/api/{kind}/{org}/{project}/{stack}",
            get(workload::get_workload)
                .put(workload::update_workload)
                .delete(workload::delete_workload),
        )
        .route(
            "/api/{kind}/{org}/{project}/{stack}/deployments/{id}/logs",
            get(workload::get_deployment_logs),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
