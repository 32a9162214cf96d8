//! Stack domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fully qualified handle of a stack: `(organization, project, stack)`.
///
/// This triple is the only identifier used to correlate one workload across
/// the stack registry, the environment API and deployments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackRef {
    pub organization: String,
    pub project: String,
    pub stack: String,
}

impl StackRef {
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        stack: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
            stack: stack.into(),
        }
    }
}

impl fmt::Display for StackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.project, self.stack)
    }
}

/// A stack as returned by the registry (list or get).
///
/// `result` and `deployment_id` are not sent by the registry; the orchestrator
/// fills them from the latest deployment when enriching a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stack {
    pub org_name: String,
    pub project_name: String,
    pub stack_name: String,
    #[serde(default)]
    pub last_update: i64,
    #[serde(default)]
    pub resource_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub outputs: HashMap<String, serde_json::Value>,
}

impl Stack {
    pub fn stack_ref(&self) -> StackRef {
        StackRef::new(&self.org_name, &self.project_name, &self.stack_name)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Filters accepted by the stack listing endpoint.
///
/// The registry supports a single tag filter per query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListStacksOptions {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub tag_name: Option<String>,
    pub tag_value: Option<String>,
    pub continuation_token: Option<String>,
}

impl ListStacksOptions {
    pub fn for_organization(organization: impl Into<String>) -> Self {
        Self {
            organization: Some(organization.into()),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag_name = Some(name.into());
        let value = value.into();
        self.tag_value = (!value.is_empty()).then_some(value);
        self
    }

    pub fn with_continuation(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }

    /// Query pairs in the order the registry documents them, skipping empty filters.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("organization", &self.organization),
            ("project", &self.project),
            ("tagName", &self.tag_name),
            ("tagValue", &self.tag_value),
            ("continuationToken", &self.continuation_token),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }
}

/// One page of the stack listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStacksResponse {
    #[serde(default)]
    pub stacks: Vec<Stack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Response of the stack creation endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackCreated {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_ref_display() {
        let r = StackRef::new("acme", "aws-static-site", "my-app");
        assert_eq!(r.to_string(), "acme/aws-static-site/my-app");
    }

    #[test]
    fn test_query_pairs_skip_empty_filters() {
        let opts = ListStacksOptions::for_organization("acme").with_tag("idp:workload", "");
        assert_eq!(
            opts.query_pairs(),
            vec![("organization", "acme"), ("tagName", "idp:workload")]
        );
    }

    #[test]
    fn test_stack_deserializes_registry_payload() {
        let json = r#"{
            "orgName": "acme",
            "projectName": "aws-static-site",
            "stackName": "my-app",
            "lastUpdate": 1700000000,
            "resourceCount": 4,
            "tags": {"idp:stage": "prod"}
        }"#;
        let stack: Stack = serde_json::from_str(json).unwrap();
        assert_eq!(stack.stack_ref(), StackRef::new("acme", "aws-static-site", "my-app"));
        assert_eq!(stack.tag("idp:stage"), Some("prod"));
        assert!(stack.result.is_none());
    }
}
