use std::sync::Arc;

use anyhow::Context;
use idp_client::{GitHubClient, OAuthApp, StackClient};
use idp_core::domain::workload::WorkloadKind;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod scaffold;
pub mod scheduler;
pub mod service;

#[cfg(test)]
mod testing;

use crate::config::Config;
use crate::scaffold::CliScaffolder;
use crate::scheduler::{DeletionCriteria, StackReclaimer};
use crate::service::{AccountService, ProvisioningSettings, WorkloadService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idp_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting IDP server...");

    let config = Config::from_env()?;
    config.validate()?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let stack_client = Arc::new(
        StackClient::with_client(&config.stack_api_url, &config.stack_api_token, http.clone())
            .with_api_version(&config.stack_api_version),
    );
    let github = Arc::new(
        GitHubClient::with_client(&config.github_api_url, config.github_token.clone(), http)
            .with_oauth(OAuthApp {
                client_id: config.github_client_id.clone(),
                client_secret: config.github_client_secret.clone(),
                token_url: config.github_oauth_url.clone(),
            }),
    );

    if config.github_token.is_none() {
        tracing::warn!("GITHUB_TOKEN not set, provisioning requests will be rejected");
    }

    let mut settings =
        ProvisioningSettings::new(&config.organization, config.blueprint_repo_url());
    settings.source_control_configured = config.github_token.is_some();

    let scaffolder = Arc::new(CliScaffolder::new(&config.template_cli));
    let service = |kind| {
        WorkloadService::new(
            kind,
            stack_client.clone(),
            github.clone(),
            stack_client.clone(),
            scaffolder.clone(),
            settings.clone(),
        )
    };

    let reclaimer = StackReclaimer::new(
        stack_client.clone(),
        &config.organization,
        DeletionCriteria::new(&config.reclaim_tag_key, &config.reclaim_tag_value),
        config.reclaim_interval,
        config.reclaim_timeout,
    );
    reclaimer.start()?;

    let state = api::AppState {
        workloads: service(WorkloadKind::Workload),
        workflows: service(WorkloadKind::Workflow),
        accounts: AccountService::new(stack_client.clone(), github.clone(), &config.organization),
        reclaimer: reclaimer.clone(),
    };

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    reclaimer.stop();
    tracing::info!("IDP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
