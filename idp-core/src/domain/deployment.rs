//! Deployment domain types
//!
//! A deployment is an asynchronous update or destroy executed by the stack
//! registry. The platform configures *how* deployments run once per stack
//! (deployment settings) and then requests operations that inherit them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation a deployment performs against its stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentOperation {
    Update,
    Destroy,
}

impl DeploymentOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentOperation::Update => "update",
            DeploymentOperation::Destroy => "destroy",
        }
    }
}

/// Git location a deployment checks out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    #[serde(rename = "repoURL")]
    pub repo_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_dir: Option<String>,
}

impl GitSource {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            branch: None,
            repo_dir: None,
        }
    }

    /// Sets the branch, accepting either `main` or `refs/heads/main`.
    pub fn on_branch(mut self, branch: &str) -> Self {
        let branch = if branch.starts_with("refs/") {
            branch.to_string()
        } else {
            format!("refs/heads/{}", branch)
        };
        self.branch = Some(branch);
        self
    }

    pub fn in_dir(mut self, dir: Option<String>) -> Self {
        self.repo_dir = dir.filter(|d| !d.is_empty() && d != "/");
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_run_commands: Vec<String>,
}

/// Per-stack deployment settings
///
/// Every deployment the platform requests inherits these. The pre-run commands
/// select the stack and attach the environment of the same name, so settings
/// must be written after the environment exists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<SourceContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_context: Option<OperationContext>,
}

impl DeploymentSettings {
    pub fn for_stack(organization: &str, project: &str, stack: &str, source: GitSource) -> Self {
        Self {
            source_context: Some(SourceContext { git: Some(source) }),
            operation_context: Some(OperationContext {
                pre_run_commands: vec![
                    format!("pulumi stack select {}/{}", organization, stack),
                    format!("pulumi config env add {}/{} -y", project, stack),
                ],
            }),
        }
    }

    pub fn git_source(&self) -> Option<&GitSource> {
        self.source_context.as_ref().and_then(|c| c.git.as_ref())
    }
}

/// Request body for a new deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeploymentRequest {
    pub operation: DeploymentOperation,
    pub inherit_settings: bool,
}

/// Response of the deployment creation endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentCreated {
    pub id: String,
    #[serde(default)]
    pub console_url: Option<String>,
    #[serde(default)]
    pub version: u64,
}

/// A deployment in a stack's history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub pulumi_operation: String,
}

/// Paged deployment history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackDeployments {
    #[serde(default)]
    pub deployments: Vec<Deployment>,
    #[serde(default)]
    pub items_per_page: u64,
    #[serde(default)]
    pub total: u64,
}

impl StackDeployments {
    pub fn latest(&self) -> Option<&Deployment> {
        self.deployments.first()
    }
}

/// One line of deployment output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
}

/// A page of deployment logs
///
/// A missing `next_token` is the terminal signal: the deployment finished and
/// no further lines will appear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    #[serde(default)]
    pub lines: Vec<LogLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl LogPage {
    pub fn is_complete(&self) -> bool {
        self.next_token.as_deref().is_none_or(str::is_empty)
    }
}
