//! Server configuration
//!
//! Connection settings for the stack, environment and source-control APIs,
//! plus the reclamation schedule. Loaded from environment variables (a `.env`
//! file is honoured by `main`).

use std::time::Duration;

use idp_core::domain::tag;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// Stack API base URL (e.g., "https://api.pulumi.com/api")
    pub stack_api_url: String,

    /// Organization access token for the stack and environment APIs
    pub stack_api_token: String,

    /// Organization every workload is provisioned in
    pub organization: String,

    /// `Accept` media type sent to the stack API
    pub stack_api_version: String,

    /// `<owner>/<repo>` of the shared blueprint repository
    pub blueprint_location: String,

    /// Source-control token used to bootstrap repositories
    pub github_token: Option<String>,

    /// OAuth application used by the login flow
    pub github_client_id: String,
    pub github_client_secret: String,

    /// Source-control REST API base URL
    pub github_api_url: String,

    /// OAuth token exchange endpoint
    pub github_oauth_url: String,

    /// Timeout applied to every outbound HTTP call
    pub http_timeout: Duration,

    /// How often the reclaimer looks for stacks to delete
    pub reclaim_interval: Duration,

    /// Overall deadline for one reclamation pass
    pub reclaim_timeout: Duration,

    /// Tag that marks a stack for reclamation
    pub reclaim_tag_key: String,
    pub reclaim_tag_value: String,

    /// Infrastructure CLI used to render templates
    pub template_cli: String,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - PULUMI_ACCESS_TOKEN (required)
    /// - PULUMI_ORGANIZATION (required)
    /// - PULUMI_BLUEPRINT_GITHUB_LOCATION (required, `<owner>/<repo>`)
    /// - PULUMI_BASE_URL (optional, default: https://api.pulumi.com/api)
    /// - PULUMI_API_VERSION (optional, default: application/vnd.pulumi+8)
    /// - GITHUB_TOKEN, GITHUB_CLIENT_ID, GITHUB_CLIENT_SECRET (optional)
    /// - GITHUB_API_URL, GITHUB_OAUTH_URL (optional)
    /// - IDP_BIND_ADDR (optional, default: 0.0.0.0:3000)
    /// - HTTP_TIMEOUT, RECLAIM_INTERVAL, RECLAIM_TIMEOUT (optional, seconds)
    /// - RECLAIM_TAG_KEY, RECLAIM_TAG_VALUE (optional, default: idp:auto-delete=true)
    /// - TEMPLATE_CLI (optional, default: pulumi)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let required = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("{} environment variable not set", key))
        };
        let seconds = |key: &str, default: Duration| match var(key) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| anyhow::anyhow!("{} must be a number of seconds, got '{}'", key, raw)),
            None => Ok(default),
        };

        Ok(Self {
            bind_addr: var("IDP_BIND_ADDR").unwrap_or(defaults.bind_addr),
            stack_api_url: var("PULUMI_BASE_URL").unwrap_or(defaults.stack_api_url),
            stack_api_token: required("PULUMI_ACCESS_TOKEN")?,
            organization: required("PULUMI_ORGANIZATION")?,
            stack_api_version: var("PULUMI_API_VERSION").unwrap_or(defaults.stack_api_version),
            blueprint_location: required("PULUMI_BLUEPRINT_GITHUB_LOCATION")?,
            github_token: var("GITHUB_TOKEN"),
            github_client_id: var("GITHUB_CLIENT_ID").unwrap_or_default(),
            github_client_secret: var("GITHUB_CLIENT_SECRET").unwrap_or_default(),
            github_api_url: var("GITHUB_API_URL").unwrap_or(defaults.github_api_url),
            github_oauth_url: var("GITHUB_OAUTH_URL").unwrap_or(defaults.github_oauth_url),
            http_timeout: seconds("HTTP_TIMEOUT", defaults.http_timeout)?,
            reclaim_interval: seconds("RECLAIM_INTERVAL", defaults.reclaim_interval)?,
            reclaim_timeout: seconds("RECLAIM_TIMEOUT", defaults.reclaim_timeout)?,
            reclaim_tag_key: var("RECLAIM_TAG_KEY").unwrap_or(defaults.reclaim_tag_key),
            reclaim_tag_value: var("RECLAIM_TAG_VALUE").unwrap_or(defaults.reclaim_tag_value),
            template_cli: var("TEMPLATE_CLI").unwrap_or(defaults.template_cli),
        })
    }

    /// Shared blueprint repository clone URL
    pub fn blueprint_repo_url(&self) -> String {
        format!("https://github.com/{}.git", self.blueprint_location)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.organization.is_empty() {
            anyhow::bail!("organization cannot be empty");
        }

        if self.stack_api_token.is_empty() {
            anyhow::bail!("stack_api_token cannot be empty");
        }

        for (name, url) in [
            ("stack_api_url", &self.stack_api_url),
            ("github_api_url", &self.github_api_url),
            ("github_oauth_url", &self.github_oauth_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("http_timeout must be greater than 0");
        }

        if self.reclaim_interval.is_zero() {
            anyhow::bail!("reclaim_interval must be greater than 0");
        }

        if self.reclaim_timeout.is_zero() || self.reclaim_timeout > self.reclaim_interval {
            anyhow::bail!("reclaim_timeout must be greater than 0 and at most reclaim_interval");
        }

        if self.reclaim_tag_key.is_empty() {
            anyhow::bail!("reclaim_tag_key cannot be empty");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            stack_api_url: "https://api.pulumi.com/api".to_string(),
            stack_api_token: String::new(),
            organization: String::new(),
            stack_api_version: idp_client::DEFAULT_STACK_API_VERSION.to_string(),
            blueprint_location: String::new(),
            github_token: None,
            github_client_id: String::new(),
            github_client_secret: String::new(),
            github_api_url: "https://api.github.com".to_string(),
            github_oauth_url: "https://github.com/login/oauth/access_token".to_string(),
            http_timeout: Duration::from_secs(30),
            reclaim_interval: Duration::from_secs(60),
            reclaim_timeout: Duration::from_secs(55),
            reclaim_tag_key: tag::AUTO_DELETE.to_string(),
            reclaim_tag_value: "true".to_string(),
            template_cli: "pulumi".to_string(),
        }
    }
}
