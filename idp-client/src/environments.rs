//! Configuration environment endpoints
//!
//! Environments live on the same backend as stacks and are addressed by the
//! same `(organization, project, name)` triple, so [`StackClient`] serves both.

use async_trait::async_trait;
use idp_core::dto::environment::{EnvironmentDefinition, OpenEnvironment};
use serde_json::{Map, Value, json};

use crate::error::{ClientError, Result};
use crate::{StackClient, handle_empty_response, handle_response};

#[async_trait]
pub trait EnvironmentApi: Send + Sync {
    /// Create an empty environment
    ///
    /// An existing environment yields `ApiError { status: 409 }`.
    async fn create_environment(&self, organization: &str, project: &str, name: &str)
    -> Result<()>;

    /// Replace the environment definition
    async fn update_environment(
        &self,
        organization: &str,
        project: &str,
        name: &str,
        definition: &EnvironmentDefinition,
    ) -> Result<()>;

    /// Open the environment and return its resolved values as plain JSON
    async fn open_and_read_environment(
        &self,
        organization: &str,
        project: &str,
        name: &str,
    ) -> Result<Map<String, Value>>;
}

fn environment_segments<'a>(organization: &'a str, project: &'a str, name: &'a str) -> [&'a str; 5] {
    ["esc", "environments", organization, project, name]
}

#[async_trait]
impl EnvironmentApi for StackClient {
    async fn create_environment(
        &self,
        organization: &str,
        project: &str,
        name: &str,
    ) -> Result<()> {
        let url = self.url(["esc", "environments", organization])?;
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "project": project, "name": name }))
            .send()
            .await?;

        handle_empty_response(response).await
    }

    async fn update_environment(
        &self,
        organization: &str,
        project: &str,
        name: &str,
        definition: &EnvironmentDefinition,
    ) -> Result<()> {
        let url = self.url(environment_segments(organization, project, name))?;
        // JSON is a subset of YAML
        let body = serde_json::to_vec(definition)
            .map_err(|e| ClientError::InvalidRequest(format!("Unserializable definition: {}", e)))?;

        let response = self
            .authorized_as(self.client.patch(url), "application/x-yaml")
            .body(body)
            .send()
            .await?;

        handle_empty_response(response).await
    }

    async fn open_and_read_environment(
        &self,
        organization: &str,
        project: &str,
        name: &str,
    ) -> Result<Map<String, Value>> {
        let path = environment_segments(organization, project, name);

        let url = self.url(path.into_iter().chain(["open"]))?;
        let response = self.authorized(self.client.post(url)).send().await?;
        let session: OpenEnvironment = handle_response(response).await?;

        let url = self.url(path.into_iter().chain(["open", session.id.as_str()]))?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let opened: Value = handle_response(response).await?;

        let properties = match opened.get("properties") {
            Some(Value::Object(properties)) => properties,
            _ => return Ok(Map::new()),
        };

        Ok(properties
            .iter()
            .map(|(key, node)| (key.clone(), unwrap_value(node)))
            .collect())
    }
}

/// Strip the `{"value": ...}` envelope the API wraps around every resolved node.
fn unwrap_value(node: &Value) -> Value {
    let inner = match node {
        Value::Object(fields) => match fields.get("value") {
            Some(inner) => inner,
            None => return node.clone(),
        },
        _ => return node.clone(),
    };

    match inner {
        Value::Object(children) => Value::Object(
            children
                .iter()
                .map(|(key, child)| (key.clone(), unwrap_value(child)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(unwrap_value).collect()),
        scalar => scalar.clone(),
    }
}
