//! Stack and tag endpoints

use async_trait::async_trait;
use idp_core::domain::stack::{ListStacksOptions, ListStacksResponse, Stack, StackCreated, StackRef};
use idp_core::domain::tag::Tag;
use reqwest::StatusCode;
use serde_json::json;

use crate::error::Result;
use crate::{StackClient, expect_status, handle_response};

/// Stack registry operations
#[async_trait]
pub trait Stacks: Send + Sync {
    /// Create an empty stack
    async fn create_stack(&self, stack: &StackRef) -> Result<StackCreated>;

    /// Delete a stack record
    ///
    /// A stack that no longer exists yields `ApiError { status: 404 }`.
    async fn delete_stack(&self, stack: &StackRef) -> Result<()>;

    /// Fetch a single stack, including its current tags
    async fn get_stack(&self, stack: &StackRef) -> Result<Stack>;

    /// Fetch one page of stacks matching the filters
    async fn list_stacks(&self, options: &ListStacksOptions) -> Result<ListStacksResponse>;

    /// Set (create or overwrite) one tag on a stack
    async fn set_stack_tag(&self, stack: &StackRef, tag: &Tag) -> Result<()>;

    /// Fetch every page of stacks matching the filters
    async fn list_all_stacks(&self, options: &ListStacksOptions) -> Result<Vec<Stack>> {
        let mut stacks = Vec::new();
        let mut page = options.clone();

        loop {
            let response = self.list_stacks(&page).await?;
            stacks.extend(response.stacks);

            match response.continuation_token.filter(|t| !t.is_empty()) {
                Some(token) if page.continuation_token.as_deref() != Some(token.as_str()) => {
                    page = page.with_continuation(Some(token));
                }
                _ => break,
            }
        }

        Ok(stacks)
    }
}

pub(crate) fn stack_segments(stack: &StackRef) -> [&str; 4] {
    ["stacks", &stack.organization, &stack.project, &stack.stack]
}

#[async_trait]
impl Stacks for StackClient {
    async fn create_stack(&self, stack: &StackRef) -> Result<StackCreated> {
        let url = self.url(["stacks", stack.organization.as_str(), stack.project.as_str()])?;
        tracing::debug!(stack = %stack, "Creating stack");

        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "stackName": stack.stack }))
            .send()
            .await?;

        handle_response(response).await
    }

    async fn delete_stack(&self, stack: &StackRef) -> Result<()> {
        let url = self.url(stack_segments(stack))?;
        let response = self.authorized(self.client.delete(url)).send().await?;

        expect_status(response, StatusCode::NO_CONTENT).await
    }

    async fn get_stack(&self, stack: &StackRef) -> Result<Stack> {
        let url = self.url(stack_segments(stack))?;
        let response = self.authorized(self.client.get(url)).send().await?;

        handle_response(response).await
    }

    async fn list_stacks(&self, options: &ListStacksOptions) -> Result<ListStacksResponse> {
        let url = self.url(["user", "stacks"])?;
        let response = self
            .authorized(self.client.get(url))
            .query(&options.query_pairs())
            .send()
            .await?;

        handle_response(response).await
    }

    async fn set_stack_tag(&self, stack: &StackRef, tag: &Tag) -> Result<()> {
        let url = self.url(stack_segments(stack).into_iter().chain(["tags"]))?;
        let response = self
            .authorized(self.client.post(url))
            .json(&json!({ "name": tag.key, "value": tag.value }))
            .send()
            .await?;

        expect_status(response, StatusCode::NO_CONTENT).await
    }
}
