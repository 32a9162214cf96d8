//! Source-control endpoints

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use idp_core::dto::repository::{OAuthToken, RepoCreationRequest, RepoFile, Repository};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ClientError, Result};
use crate::{handle_empty_response, handle_response, join_url};

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";
const CLIENT_USER_AGENT: &str = "idp-server";

/// Source-control operations used to bootstrap workload repositories
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Exchange an OAuth authorization code for an access token
    async fn exchange_code(&self, code: &str) -> Result<OAuthToken>;

    /// Create a repository initialized with an empty commit
    async fn create_repository(&self, request: &RepoCreationRequest) -> Result<Repository>;

    /// Commit `files` on top of the default branch
    ///
    /// # Returns
    /// The branch that received the commit (`main`, or `master` as a fallback)
    async fn commit_files(
        &self,
        owner: &str,
        repo: &str,
        files: &[RepoFile],
        message: &str,
    ) -> Result<String>;

    /// Enable branch protection, optionally requiring one approving review
    async fn protect_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        require_reviews: bool,
    ) -> Result<()>;
}

/// OAuth application credentials
#[derive(Debug, Clone, Default)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint (e.g., "https://github.com/login/oauth/access_token")
    pub token_url: String,
}

/// HTTP client for the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    base_url: String,
    token: Option<String>,
    oauth: OAuthApp,
    /// Wait after repository creation while the remote finishes initializing it
    settle_delay: Duration,
    client: Client,
}

impl GitHubClient {
    /// Create a new GitHub client with a custom HTTP client
    ///
    /// # Arguments
    /// * `base_url` - REST API root (e.g., "https://api.github.com")
    /// * `token` - Token used for repository operations; OAuth exchange works without one
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, token: Option<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            oauth: OAuthApp::default(),
            settle_delay: Duration::from_secs(2),
            client,
        }
    }

    pub fn with_oauth(mut self, oauth: OAuthApp) -> Self {
        self.oauth = oauth;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `owner` and `repo` are encoded as single segments; `path` is a fixed
    /// API path whose `/` separators are kept (branch refs may nest)
    fn repo_url(&self, owner: &str, repo: &str, path: &str) -> Result<Url> {
        let rest = path.split('/').filter(|s| !s.is_empty());
        join_url(&self.base_url, ["repos", owner, repo].into_iter().chain(rest))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder
            .header(ACCEPT, GITHUB_MEDIA_TYPE)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);

        match &self.token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn resolve_branch(&self, owner: &str, repo: &str) -> Result<(String, GitRef)> {
        let mut last_error = None;

        for branch in ["main", "master"] {
            let url = self.repo_url(owner, repo, &format!("/git/ref/heads/{}", branch))?;
            let response = self.authorized(self.client.get(url)).send().await?;

            match handle_response::<GitRef>(response).await {
                Ok(git_ref) => return Ok((branch.to_string(), git_ref)),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(owner, repo, branch, "Branch not found");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ClientError::api_error(404, "no default branch")))
    }
}

// =============================================================================
// Git data payloads
// =============================================================================

/// Text files go up verbatim, anything else base64 encoded
fn blob_body(file: &RepoFile) -> serde_json::Value {
    match file.text() {
        Some(text) => json!({ "content": text, "encoding": "utf-8" }),
        None => json!({ "content": BASE64_STANDARD.encode(&file.content), "encoding": "base64" }),
    }
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitCommit {
    sha: String,
    tree: GitObject,
}

#[derive(Debug, Serialize)]
struct TreeEntry<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct OAuthExchange {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[async_trait]
impl RepositoryApi for GitHubClient {
    async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        if code.is_empty() {
            return Err(ClientError::InvalidRequest(
                "missing required field: code".to_string(),
            ));
        }

        let response = self
            .client
            .post(&self.oauth.token_url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .form(&[
                ("client_id", self.oauth.client_id.as_str()),
                ("client_secret", self.oauth.client_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await?;

        let exchange: OAuthExchange = handle_response(response).await?;

        match exchange.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(OAuthToken {
                access_token,
                token_type: exchange.token_type,
                scope: exchange.scope,
            }),
            _ => Err(ClientError::api_error(
                401,
                exchange
                    .error_description
                    .or(exchange.error)
                    .unwrap_or_else(|| "no access token returned".to_string()),
            )),
        }
    }

    async fn create_repository(&self, request: &RepoCreationRequest) -> Result<Repository> {
        let url = join_url(&self.base_url, ["user", "repos"])?;
        tracing::debug!(name = %request.name, "Creating repository");

        let response = self
            .authorized(self.client.post(url))
            .json(&json!({
                "name": request.name,
                "description": request.description,
                "private": request.private,
                "auto_init": true,
            }))
            .send()
            .await?;
        let repository: Repository = handle_response(response).await?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        Ok(repository)
    }

    async fn commit_files(
        &self,
        owner: &str,
        repo: &str,
        files: &[RepoFile],
        message: &str,
    ) -> Result<String> {
        let (branch, head) = self.resolve_branch(owner, repo).await?;

        let url = self.repo_url(owner, repo, &format!("/git/commits/{}", head.object.sha))?;
        let parent: GitCommit =
            handle_response(self.authorized(self.client.get(url)).send().await?).await?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let url = self.repo_url(owner, repo, "/git/blobs")?;
            let response = self
                .authorized(self.client.post(url))
                .json(&blob_body(file))
                .send()
                .await?;
            let blob: GitObject = handle_response(response).await?;

            entries.push(TreeEntry {
                path: &file.path,
                mode: "100644",
                kind: "blob",
                sha: blob.sha,
            });
        }

        let url = self.repo_url(owner, repo, "/git/trees")?;
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "base_tree": parent.tree.sha, "tree": entries }))
            .send()
            .await?;
        let tree: GitObject = handle_response(response).await?;

        let url = self.repo_url(owner, repo, "/git/commits")?;
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "message": message, "tree": tree.sha, "parents": [parent.sha] }))
            .send()
            .await?;
        let commit: GitObject = handle_response(response).await?;

        let url = self.repo_url(owner, repo, &format!("/git/refs/heads/{}", branch))?;
        let response = self
            .authorized(self.client.patch(url))
            .json(&json!({ "sha": commit.sha, "force": true }))
            .send()
            .await?;
        handle_empty_response(response).await?;

        tracing::info!(owner, repo, branch = %branch, files = files.len(), "Committed files");
        Ok(branch)
    }

    async fn protect_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        require_reviews: bool,
    ) -> Result<()> {
        let url = self.repo_url(owner, repo, &format!("/branches/{}/protection", branch))?;

        let reviews = require_reviews.then(|| {
            json!({
                "dismiss_stale_reviews": true,
                "require_code_owner_reviews": true,
                "required_approving_review_count": 1,
            })
        });

        let response = self
            .authorized(self.client.put(url))
            .json(&json!({
                "required_status_checks": { "strict": true, "contexts": [] },
                "enforce_admins": true,
                "required_pull_request_reviews": reviews,
                "restrictions": null,
            }))
            .send()
            .await?;

        handle_empty_response(response).await
    }
}
