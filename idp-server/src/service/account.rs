//! Account Service
//!
//! Login code exchange and team lookup for the organization.

use std::sync::Arc;

use idp_client::{ClientError, RepositoryApi, Teams};
use idp_core::domain::team::Team;
use idp_core::dto::repository::OAuthToken;

use super::WorkloadError;

#[derive(Clone)]
pub struct AccountService {
    teams: Arc<dyn Teams>,
    repositories: Arc<dyn RepositoryApi>,
    organization: String,
}

impl AccountService {
    pub fn new(
        teams: Arc<dyn Teams>,
        repositories: Arc<dyn RepositoryApi>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            teams,
            repositories,
            organization: organization.into(),
        }
    }

    /// Exchange an OAuth authorization code for an access token
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken, WorkloadError> {
        self.repositories
            .exchange_code(code)
            .await
            .map_err(|e| match e {
                ClientError::InvalidRequest(msg) => WorkloadError::Validation(msg),
                source => WorkloadError::Upstream {
                    context: "failed to exchange code".to_string(),
                    source,
                },
            })
    }

    /// Teams of the configured organization
    pub async fn list_teams(&self) -> Result<Vec<Team>, WorkloadError> {
        self.teams
            .list_teams(&self.organization)
            .await
            .map_err(|source| WorkloadError::Upstream {
                context: "failed to list teams".to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use idp_core::domain::workload::WorkloadKind;

    #[tokio::test]
    async fn test_empty_code_is_validation_error() {
        let h = Harness::new(WorkloadKind::Workload);
        let err = h.accounts.exchange_code("").await.unwrap_err();
        assert!(matches!(err, WorkloadError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_teams_for_organization() {
        let h = Harness::new(WorkloadKind::Workload);
        let teams = h.accounts.list_teams().await.unwrap();
        assert_eq!(teams[0].name, "platform");
        assert!(h.journal.position("list_teams acme").is_some());
    }
}
