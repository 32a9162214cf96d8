//! Team endpoints

use async_trait::async_trait;
use idp_core::domain::stack::StackRef;
use idp_core::domain::team::{StackPermissionGrant, Team, TeamList};
use reqwest::StatusCode;

use crate::error::Result;
use crate::{StackClient, expect_status, handle_response};

/// Organization teams and their stack permissions
#[async_trait]
pub trait Teams: Send + Sync {
    async fn list_teams(&self, organization: &str) -> Result<Vec<Team>>;

    /// Give `team` the `permission` level on a stack
    async fn grant_stack_access_to_team(
        &self,
        stack: &StackRef,
        team: &str,
        permission: u32,
    ) -> Result<()>;
}

#[async_trait]
impl Teams for StackClient {
    async fn list_teams(&self, organization: &str) -> Result<Vec<Team>> {
        let url = self.url(["orgs", organization, "teams"])?;
        let response = self.authorized(self.client.get(url)).send().await?;

        let list: TeamList = handle_response(response).await?;
        Ok(list.teams)
    }

    async fn grant_stack_access_to_team(
        &self,
        stack: &StackRef,
        team: &str,
        permission: u32,
    ) -> Result<()> {
        let url = self.url(["orgs", stack.organization.as_str(), "teams", team])?;
        let response = self
            .authorized(self.client.patch(url))
            .json(&StackPermissionGrant::new(&stack.project, &stack.stack, permission))
            .send()
            .await?;

        expect_status(response, StatusCode::NO_CONTENT).await
    }
}
