//! Deployment endpoints

use async_trait::async_trait;
use idp_core::domain::deployment::{
    CreateDeploymentRequest, DeploymentCreated, DeploymentOperation, DeploymentSettings, LogPage,
    StackDeployments,
};
use idp_core::domain::stack::StackRef;

use crate::error::Result;
use crate::stacks::stack_segments;
use crate::{StackClient, handle_empty_response, handle_response};

/// Deployment settings, deployment requests, history and logs
#[async_trait]
pub trait Deployments: Send + Sync {
    /// Create or replace the deployment settings of a stack
    async fn create_deployment_settings(
        &self,
        stack: &StackRef,
        settings: &DeploymentSettings,
    ) -> Result<()>;

    /// Current deployment settings, or `None` if the stack has none
    async fn get_deployment_settings(&self, stack: &StackRef) -> Result<Option<DeploymentSettings>>;

    /// Request a deployment that inherits the stack's settings
    async fn create_deployment(
        &self,
        stack: &StackRef,
        operation: DeploymentOperation,
    ) -> Result<DeploymentCreated>;

    /// Latest entry of the deployment history
    async fn get_stack_updates(&self, stack: &StackRef) -> Result<StackDeployments>;

    /// One page of deployment logs
    async fn get_deployment_logs(
        &self,
        stack: &StackRef,
        deployment_id: &str,
        continuation_token: Option<&str>,
    ) -> Result<LogPage>;
}

fn deployment_segments<'a>(stack: &'a StackRef, rest: &[&'a str]) -> Vec<&'a str> {
    let mut segments = stack_segments(stack).to_vec();
    segments.push("deployments");
    segments.extend_from_slice(rest);
    segments
}

#[async_trait]
impl Deployments for StackClient {
    async fn create_deployment_settings(
        &self,
        stack: &StackRef,
        settings: &DeploymentSettings,
    ) -> Result<()> {
        let url = self.url(deployment_segments(stack, &["settings"]))?;
        let response = self
            .authorized(self.client.post(url))
            .json(settings)
            .send()
            .await?;

        handle_empty_response(response).await
    }

    async fn get_deployment_settings(&self, stack: &StackRef) -> Result<Option<DeploymentSettings>> {
        let url = self.url(deployment_segments(stack, &["settings"]))?;
        let response = self.authorized(self.client.get(url)).send().await?;

        match handle_response(response).await {
            Ok(settings) => Ok(Some(settings)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_deployment(
        &self,
        stack: &StackRef,
        operation: DeploymentOperation,
    ) -> Result<DeploymentCreated> {
        let url = self.url(deployment_segments(stack, &[]))?;
        tracing::debug!(stack = %stack, operation = operation.as_str(), "Requesting deployment");

        let response = self
            .authorized(self.client.post(url))
            .json(&CreateDeploymentRequest {
                operation,
                inherit_settings: true,
            })
            .send()
            .await?;

        handle_response(response).await
    }

    async fn get_stack_updates(&self, stack: &StackRef) -> Result<StackDeployments> {
        let url = self.url(deployment_segments(stack, &[]))?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("pageSize", "1"), ("page", "1")])
            .send()
            .await?;

        handle_response(response).await
    }

    async fn get_deployment_logs(
        &self,
        stack: &StackRef,
        deployment_id: &str,
        continuation_token: Option<&str>,
    ) -> Result<LogPage> {
        let url = self.url(deployment_segments(stack, &[deployment_id, "logs"]))?;
        let mut request = self.authorized(self.client.get(url));
        if let Some(token) = continuation_token.filter(|t| !t.is_empty()) {
            request = request.query(&[("continuationToken", token)]);
        }

        handle_response(request.send().await?).await
    }
}
