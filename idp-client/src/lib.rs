//! IDP HTTP Clients
//!
//! Typed clients for the three remote systems the platform drives:
//!
//! - the infrastructure stack API (stacks, tags, deployments, teams) via [`StackClient`]
//! - the configuration environment API, served by the same backend and also
//!   implemented by [`StackClient`]
//! - the source-control API (OAuth, repositories, commits, branch protection)
//!   via [`GitHubClient`]
//!
//! Each API is also exposed as an async trait so callers can hold an
//! `Arc<dyn ...>` and substitute fakes in tests.
//!
//! # Example
//!
//! ```no_run
//! use idp_client::{StackClient, Stacks};
//! use idp_core::domain::stack::ListStacksOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), idp_client::ClientError> {
//!     let client = StackClient::new("https://api.pulumi.com/api", "pul-xxxx");
//!
//!     let stacks = client
//!         .list_all_stacks(&ListStacksOptions::for_organization("acme"))
//!         .await?;
//!
//!     println!("{} stacks", stacks.len());
//!     Ok(())
//! }
//! ```

mod deployments;
mod environments;
pub mod error;
mod repositories;
mod stacks;
mod teams;

// Re-export commonly used types
pub use deployments::Deployments;
pub use environments::EnvironmentApi;
pub use error::{ClientError, Result};
pub use repositories::{GitHubClient, OAuthApp, RepositoryApi};
pub use stacks::Stacks;
pub use teams::Teams;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;

/// Media type requested from the stack API unless overridden
pub const DEFAULT_STACK_API_VERSION: &str = "application/vnd.pulumi+8";

/// Everything the provisioning workflow needs from the stack backend
pub trait StackPlatform: Stacks + Deployments + Teams {}

impl<T: Stacks + Deployments + Teams> StackPlatform for T {}

/// HTTP client for the infrastructure stack API
///
/// Endpoint groups are implemented in separate modules:
/// - Stacks and tags
/// - Deployment settings, deployments, history and logs
/// - Teams and stack grants
/// - Configuration environments
#[derive(Debug, Clone)]
pub struct StackClient {
    /// Base URL of the API (e.g., "https://api.pulumi.com/api")
    base_url: String,
    /// Access token sent as `Authorization: token <value>`
    token: String,
    /// Value of the `Accept` header
    api_version: String,
    /// HTTP client instance
    client: Client,
}

impl StackClient {
    /// Create a new stack API client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the API
    /// * `token` - Access token for the organization
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(base_url, token, Client::new())
    }

    /// Create a new stack API client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Example
    /// ```
    /// use idp_client::StackClient;
    /// use reqwest::Client;
    /// use std::time::Duration;
    ///
    /// let http_client = Client::builder()
    ///     .timeout(Duration::from_secs(30))
    ///     .build()
    ///     .unwrap();
    ///
    /// let client = StackClient::with_client("https://api.pulumi.com/api", "token", http_client);
    /// ```
    pub fn with_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            api_version: DEFAULT_STACK_API_VERSION.to_string(),
            client,
        }
    }

    /// Override the `Accept` media type
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        let api_version = api_version.into();
        if !api_version.is_empty() {
            self.api_version = api_version;
        }
        self
    }

    /// Get the base URL of the API
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        join_url(&self.base_url, segments)
    }

    /// Attach the headers every stack API call carries
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        self.authorized_as(builder, "application/json")
    }

    fn authorized_as(&self, builder: RequestBuilder, content_type: &str) -> RequestBuilder {
        builder
            .header(ACCEPT, &self.api_version)
            .header(CONTENT_TYPE, content_type)
            .header(AUTHORIZATION, format!("token {}", self.token))
    }
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Handle an API response and deserialize JSON
///
/// Any 2xx status is accepted. Other statuses become [`ClientError::ApiError`]
/// carrying the response body.
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        return Err(error_from(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Handle an API response whose body is ignored
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    if !response.status().is_success() {
        return Err(error_from(response).await);
    }

    Ok(())
}

/// Handle an API response that must carry exactly `expected`
///
/// Several endpoints document a single success code (usually 204). Anything
/// else, including another 2xx, is reported as an error.
pub(crate) async fn expect_status(response: reqwest::Response, expected: StatusCode) -> Result<()> {
    if response.status() != expected {
        return Err(error_from(response).await);
    }

    Ok(())
}

/// Append percent-encoded path segments to a base URL
///
/// Caller supplied names such as team names may contain `/` or `?`; each one
/// stays a single segment.
pub(crate) fn join_url<'a>(base: &str, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| ClientError::InvalidRequest(format!("Invalid base URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidRequest(format!("Base URL '{}' cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn error_from(response: reqwest::Response) -> ClientError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    ClientError::api_error(status.as_u16(), error_text)
}
