//! Workload request and response DTOs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::stack::Stack;
use crate::domain::tag::Tag;

/// Provisioning request for a workload or workflow
///
/// `advanced` is a list of configuration override maps. They are merged in
/// order into the environment's `pulumiConfig`, later keys winning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRequest {
    #[serde(default)]
    pub blueprint_name: String,
    #[serde(default)]
    pub blueprint: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub advanced: Vec<Map<String, Value>>,
    #[serde(default, rename = "cookiecut")]
    pub cookie_cut: bool,
}

impl WorkloadRequest {
    /// Directory of the blueprint inside the shared blueprint repository
    pub fn blueprint_dir(&self) -> &str {
        if self.blueprint_name.is_empty() {
            &self.blueprint
        } else {
            &self.blueprint_name
        }
    }
}

/// Outcome of a create call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCreationResult {
    pub repo_url: String,
    pub clone_url: String,
    pub message: String,
    pub success: bool,
}

/// Detailed view of one provisioned workload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadView {
    pub name: String,
    pub blueprint: String,
    pub blueprint_name: String,
    pub project_id: String,
    pub stage: String,
    pub stack: Stack,
    pub advanced: Vec<Map<String, Value>>,
}

/// Returned by a synchronous update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentTriggered {
    pub deployment_id: String,
}
