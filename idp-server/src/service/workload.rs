//! Workload Service
//!
//! Provisioning orchestrator for workloads and workflows. A workload exists
//! only as a remote stack tagged with the kind key, so every operation here is
//! a sequence of remote calls with no local state and no rollback: the first
//! failure is returned and whatever was already created stays in place.

use std::path::Path;
use std::sync::Arc;

use idp_client::{ClientError, EnvironmentApi, RepositoryApi, StackPlatform};
use idp_core::domain::deployment::{
    DeploymentCreated, DeploymentOperation, DeploymentSettings, GitSource, LogPage,
};
use idp_core::domain::stack::{ListStacksOptions, Stack, StackRef};
use idp_core::domain::tag::{self, Tag};
use idp_core::domain::team::STACK_ADMIN_PERMISSION;
use idp_core::domain::workload::WorkloadKind;
use idp_core::dto::environment::EnvironmentDefinition;
use idp_core::dto::repository::RepoCreationRequest;
use idp_core::dto::workload::{
    DeploymentTriggered, RepoCreationResult, WorkloadRequest, WorkloadView,
};
use idp_core::slug;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::scaffold::{self, TemplateScaffolder};

/// Service error type
#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: ClientError,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl WorkloadError {
    fn upstream(context: impl Into<String>) -> impl FnOnce(ClientError) -> WorkloadError {
        let context = context.into();
        move |source| WorkloadError::Upstream { context, source }
    }
}

/// Static inputs of the provisioning workflow
#[derive(Debug, Clone)]
pub struct ProvisioningSettings {
    /// Organization every stack is created in
    pub organization: String,
    /// Clone URL of the shared blueprint repository
    pub blueprint_repo_url: String,
    /// Whether a source-control token is configured
    pub source_control_configured: bool,
    /// Permission granted to the requesting team
    pub team_permission: u32,
    pub repo_description: String,
    pub project_description: String,
    pub commit_message: String,
}

impl ProvisioningSettings {
    pub fn new(organization: impl Into<String>, blueprint_repo_url: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            blueprint_repo_url: blueprint_repo_url.into(),
            source_control_configured: false,
            team_permission: STACK_ADMIN_PERMISSION,
            repo_description: "Generated repository via IDP".to_string(),
            project_description: "Project created via IDP".to_string(),
            commit_message: "Add project files".to_string(),
        }
    }
}

/// Everything one deployment needs, owned so it can move into a task
#[derive(Debug, Clone)]
struct DeploymentPlan {
    stack: StackRef,
    source: GitSource,
    stage: String,
    overrides: Vec<Map<String, Value>>,
}

/// Provisioning orchestrator, parameterized by workload kind
#[derive(Clone)]
pub struct WorkloadService {
    kind: WorkloadKind,
    stacks: Arc<dyn StackPlatform>,
    repositories: Arc<dyn RepositoryApi>,
    environments: Arc<dyn EnvironmentApi>,
    scaffolder: Arc<dyn TemplateScaffolder>,
    settings: Arc<ProvisioningSettings>,
}

impl WorkloadService {
    pub fn new(
        kind: WorkloadKind,
        stacks: Arc<dyn StackPlatform>,
        repositories: Arc<dyn RepositoryApi>,
        environments: Arc<dyn EnvironmentApi>,
        scaffolder: Arc<dyn TemplateScaffolder>,
        settings: ProvisioningSettings,
    ) -> Self {
        Self {
            kind,
            stacks,
            repositories,
            environments,
            scaffolder,
            settings: Arc::new(settings),
        }
    }

    pub fn kind(&self) -> WorkloadKind {
        self.kind
    }

    // =============================================================================
    // Create
    // =============================================================================

    /// Provision a new workload
    ///
    /// Creates the stack, grants the team access, writes the platform tags,
    /// optionally bootstraps a repository from the blueprint template, then
    /// starts the first deployment in the background. `success` in the result
    /// only covers the synchronous steps.
    pub async fn create_workload(
        &self,
        req: WorkloadRequest,
    ) -> Result<RepoCreationResult, WorkloadError> {
        if req.name.is_empty() {
            return Err(WorkloadError::Validation("name is required".to_string()));
        }
        let name = stack_name(&req.name)?;
        if req.blueprint.is_empty() {
            return Err(WorkloadError::Validation("blueprint is required".to_string()));
        }
        if let Some(reserved) = req.tags.iter().find(|t| t.is_reserved()) {
            return Err(WorkloadError::Validation(format!(
                "tag '{}' is reserved for the platform",
                reserved.key
            )));
        }
        if !self.settings.source_control_configured {
            return Err(WorkloadError::Configuration(
                "GITHUB_TOKEN environment variable not set".to_string(),
            ));
        }

        let stack = StackRef::new(&self.settings.organization, &req.blueprint, &name);

        info!(kind = %self.kind, stack = %stack, "Provisioning {}", self.kind);

        self.stacks
            .create_stack(&stack)
            .await
            .map_err(WorkloadError::upstream("failed to create stack"))?;

        self.stacks
            .grant_stack_access_to_team(&stack, &req.team, self.settings.team_permission)
            .await
            .map_err(WorkloadError::upstream("failed to grant stack access to team"))?;

        for tag in self.platform_tags(&req) {
            self.stacks
                .set_stack_tag(&stack, &tag)
                .await
                .map_err(WorkloadError::upstream(format!("failed to set stack tag {}", tag.key)))?;
        }

        if req.cookie_cut {
            return self.bootstrap_repository(stack, &name, &req).await;
        }

        let repo_url = self.settings.blueprint_repo_url.clone();
        let source = GitSource::new(&repo_url).in_dir(Some(req.blueprint_dir().to_string()));
        self.spawn_deployment(DeploymentPlan {
            stack,
            source,
            stage: req.stage.clone(),
            overrides: req.advanced.clone(),
        });

        Ok(RepoCreationResult {
            repo_url: repo_url.clone(),
            clone_url: repo_url,
            message: format!("{} provisioned from the shared blueprint repository", self.kind),
            success: true,
        })
    }

    /// Kind tag, project and stage tags, then the caller's own tags, in order
    fn platform_tags(&self, req: &WorkloadRequest) -> Vec<Tag> {
        let mut tags = vec![
            Tag::new(self.kind.tag_key(), &req.name),
            Tag::new(tag::PROJECT_ID, &req.project_id),
            Tag::new(tag::STAGE, &req.stage),
        ];
        tags.extend(req.tags.iter().cloned());
        tags
    }

    async fn bootstrap_repository(
        &self,
        stack: StackRef,
        name: &str,
        req: &WorkloadRequest,
    ) -> Result<RepoCreationResult, WorkloadError> {
        let repo_request = RepoCreationRequest::new(name, &self.settings.repo_description);

        let repo = self
            .repositories
            .create_repository(&repo_request)
            .await
            .map_err(WorkloadError::upstream("failed to create repository"))?;
        let owner = repo.owner.login.clone();

        let scratch = tempfile::Builder::new()
            .prefix("idp-project-")
            .tempdir()
            .map_err(|e| WorkloadError::Internal(format!("failed to create temp directory: {}", e)))?;

        let branch = self
            .render_and_commit(scratch.path(), &owner, &repo.name, name, &req.blueprint)
            .await?;

        for protected in repo_request.branches_to_protect() {
            self.repositories
                .protect_branch(&owner, &repo.name, protected, repo_request.require_reviews)
                .await
                .map_err(WorkloadError::upstream(format!(
                    "failed to set up branch protection for {}",
                    protected
                )))?;
        }

        self.spawn_deployment(DeploymentPlan {
            stack,
            source: GitSource::new(&repo.clone_url).on_branch(&branch),
            stage: req.stage.clone(),
            overrides: req.advanced.clone(),
        });

        Ok(RepoCreationResult {
            repo_url: repo.html_url,
            clone_url: repo.clone_url,
            message: "Repository created successfully with project files".to_string(),
            success: true,
        })
    }

    async fn render_and_commit(
        &self,
        dir: &Path,
        owner: &str,
        repo: &str,
        project_name: &str,
        blueprint: &str,
    ) -> Result<String, WorkloadError> {
        let template = slug::normalize(blueprint);

        self.scaffolder
            .scaffold(dir, &template, project_name, &self.settings.project_description)
            .await
            .map_err(|e| WorkloadError::Internal(format!("failed to render template: {:#}", e)))?;

        let files = scaffold::collect_files(dir)
            .map_err(|e| WorkloadError::Internal(format!("failed to collect files: {:#}", e)))?;

        debug!(owner, repo, files = files.len(), "Committing rendered template");

        self.repositories
            .commit_files(owner, repo, &files, &self.settings.commit_message)
            .await
            .map_err(WorkloadError::upstream("failed to commit project files"))
    }

    // =============================================================================
    // Deployment sequence
    // =============================================================================

    /// Environment, settings, then the update itself
    async fn run_deployment(&self, plan: &DeploymentPlan) -> Result<DeploymentCreated, WorkloadError> {
        let StackRef {
            organization,
            project,
            stack,
        } = &plan.stack;

        match self
            .environments
            .create_environment(organization, project, stack)
            .await
        {
            Ok(()) => debug!(stack = %plan.stack, "Environment created"),
            Err(e) if e.is_conflict() => debug!(stack = %plan.stack, "Environment already exists"),
            Err(e) => return Err(WorkloadError::upstream("failed to create environment")(e)),
        }

        let definition = EnvironmentDefinition::for_stage(&plan.stage, &plan.overrides);
        self.environments
            .update_environment(organization, project, stack, &definition)
            .await
            .map_err(WorkloadError::upstream("failed to update environment"))?;

        let settings =
            DeploymentSettings::for_stack(organization, project, stack, plan.source.clone());
        self.stacks
            .create_deployment_settings(&plan.stack, &settings)
            .await
            .map_err(WorkloadError::upstream("failed to create deployment settings"))?;

        self.stacks
            .create_deployment(&plan.stack, DeploymentOperation::Update)
            .await
            .map_err(WorkloadError::upstream("failed to create deployment"))
    }

    /// Fire-and-forget deployment; failures only reach the log
    fn spawn_deployment(&self, plan: DeploymentPlan) -> JoinHandle<()> {
        let service = self.clone();

        tokio::spawn(async move {
            match service.run_deployment(&plan).await {
                Ok(deployment) => info!(
                    stack = %plan.stack,
                    deployment_id = %deployment.id,
                    "Deployment started"
                ),
                Err(e) => error!(stack = %plan.stack, "Background deployment failed: {:#}", e),
            }
        })
    }

    // =============================================================================
    // Update / Delete
    // =============================================================================

    /// Re-deploy an existing workload with new configuration
    ///
    /// Reuses the git source from the stack's deployment settings, falling back
    /// to the shared blueprint repository when it has none.
    pub async fn update_workload(
        &self,
        organization: &str,
        project: &str,
        stack: &str,
        req: WorkloadRequest,
    ) -> Result<DeploymentTriggered, WorkloadError> {
        let stack_ref = validate_stack(organization, project, stack)?;

        if !req.name.is_empty() && stack_name(&req.name)? != stack {
            return Err(WorkloadError::Validation(format!(
                "name '{}' does not match stack '{}'",
                req.name, stack
            )));
        }

        let existing = self
            .stacks
            .get_deployment_settings(&stack_ref)
            .await
            .map_err(WorkloadError::upstream("failed to read deployment settings"))?;

        let source = match existing.as_ref().and_then(DeploymentSettings::git_source) {
            Some(source) => source.clone(),
            None => {
                let dir = if req.blueprint_dir().is_empty() {
                    project
                } else {
                    req.blueprint_dir()
                };
                GitSource::new(&self.settings.blueprint_repo_url).in_dir(Some(dir.to_string()))
            }
        };

        let deployment = self
            .run_deployment(&DeploymentPlan {
                stack: stack_ref,
                source,
                stage: req.stage,
                overrides: req.advanced,
            })
            .await?;

        info!(stack, deployment_id = %deployment.id, "Update deployment requested");
        Ok(DeploymentTriggered {
            deployment_id: deployment.id,
        })
    }

    /// Destroy the stack's resources and mark the stack for reclamation
    pub async fn delete_workload(
        &self,
        organization: &str,
        project: &str,
        stack: &str,
    ) -> Result<(), WorkloadError> {
        let stack_ref = validate_stack(organization, project, stack)?;

        let deployment = self
            .stacks
            .create_deployment(&stack_ref, DeploymentOperation::Destroy)
            .await
            .map_err(WorkloadError::upstream("failed to request destroy deployment"))?;

        self.stacks
            .set_stack_tag(&stack_ref, &Tag::new(tag::AUTO_DELETE, "true"))
            .await
            .map_err(WorkloadError::upstream("failed to set stack tags"))?;

        info!(stack = %stack_ref, deployment_id = %deployment.id, "Workload scheduled for deletion");
        Ok(())
    }

    // =============================================================================
    // Queries
    // =============================================================================

    /// Configuration and latest state of one workload
    pub async fn get_workload_details(
        &self,
        organization: &str,
        project: &str,
        stack: &str,
    ) -> Result<WorkloadView, WorkloadError> {
        validate_stack(organization, project, stack)?;

        let values = self
            .environments
            .open_and_read_environment(organization, project, stack)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    WorkloadError::NotFound(format!("environment {}/{} not found", project, stack))
                } else {
                    WorkloadError::upstream("failed to open environment")(e)
                }
            })?;

        let config = match values.get("pulumiConfig") {
            Some(Value::Object(config)) => redact(config),
            _ => {
                return Err(WorkloadError::NotFound(format!(
                    "pulumiConfig not found in environment {}/{}",
                    project, stack
                )));
            }
        };

        let options = ListStacksOptions::for_organization(&self.settings.organization)
            .with_tag(self.kind.tag_key(), stack);
        let matches = self
            .stacks
            .list_all_stacks(&options)
            .await
            .map_err(WorkloadError::upstream("failed to list stacks"))?;

        if matches.is_empty() {
            return Err(WorkloadError::NotFound(format!(
                "no stacks found for {} {}",
                self.kind, stack
            )));
        }

        let mut enriched = Vec::with_capacity(matches.len());
        for found in matches {
            enriched.push(self.enrich(found).await?);
        }

        let latest = enriched
            .into_iter()
            .max_by_key(|s| s.last_update)
            .ok_or_else(|| WorkloadError::NotFound(format!("no stacks found for {}", stack)))?;

        Ok(WorkloadView {
            name: stack.to_string(),
            blueprint: project.to_string(),
            blueprint_name: project.to_string(),
            project_id: latest.tag(tag::PROJECT_ID).unwrap_or_default().to_string(),
            stage: latest.tag(tag::STAGE).unwrap_or_default().to_string(),
            stack: latest,
            advanced: vec![config],
        })
    }

    /// List workloads of this kind
    ///
    /// With `project_id`, stacks are found by project tag and then narrowed to
    /// those carrying the kind key. Otherwise they are found by the kind key,
    /// optionally with a specific value.
    pub async fn list_workloads(
        &self,
        workload: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<Vec<Stack>, WorkloadError> {
        let project_id = project_id.filter(|p| !p.is_empty());
        let base = ListStacksOptions::for_organization(&self.settings.organization);
        let options = match project_id {
            Some(project_id) => base.with_tag(tag::PROJECT_ID, project_id),
            None => base.with_tag(self.kind.tag_key(), workload.unwrap_or_default()),
        };

        let stacks = self
            .stacks
            .list_all_stacks(&options)
            .await
            .map_err(WorkloadError::upstream("failed to list stacks"))?;

        let mut workloads = Vec::with_capacity(stacks.len());
        for found in stacks {
            let enriched = self.enrich(found).await?;
            if project_id.is_some() && enriched.tag(self.kind.tag_key()).is_none() {
                continue;
            }
            workloads.push(enriched);
        }

        Ok(workloads)
    }

    /// Attach the latest deployment and the current tags
    async fn enrich(&self, mut stack: Stack) -> Result<Stack, WorkloadError> {
        let stack_ref = stack.stack_ref();

        let updates = self
            .stacks
            .get_stack_updates(&stack_ref)
            .await
            .map_err(WorkloadError::upstream(format!("failed to read updates of {}", stack_ref)))?;

        match updates.latest() {
            Some(latest) => {
                stack.result = Some(latest.status.clone());
                stack.deployment_id = Some(latest.id.clone());
            }
            None => {
                stack.result = Some("no updates".to_string());
                stack.deployment_id = None;
            }
        }

        let current = self
            .stacks
            .get_stack(&stack_ref)
            .await
            .map_err(WorkloadError::upstream(format!("failed to read stack {}", stack_ref)))?;
        stack.tags = current.tags;

        Ok(stack)
    }

    /// One page of a deployment's log
    pub async fn get_deployment_logs(
        &self,
        organization: &str,
        project: &str,
        stack: &str,
        deployment_id: &str,
        continuation_token: Option<&str>,
    ) -> Result<LogPage, WorkloadError> {
        let stack_ref = validate_stack(organization, project, stack)?;
        if deployment_id.is_empty() {
            return Err(WorkloadError::Validation("deployment id is required".to_string()));
        }

        self.stacks
            .get_deployment_logs(&stack_ref, deployment_id, continuation_token)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    WorkloadError::NotFound(format!("deployment {} not found", deployment_id))
                } else {
                    warn!(stack = %stack_ref, deployment_id, "Failed to fetch logs: {}", e);
                    WorkloadError::upstream("failed to fetch logs")(e)
                }
            })
    }
}

/// Stack name derived from a requested workload name
fn stack_name(requested: &str) -> Result<String, WorkloadError> {
    let name = slug::normalize(requested);
    if name.is_empty() {
        return Err(WorkloadError::Validation(
            "name must contain at least one letter or digit".to_string(),
        ));
    }
    Ok(name)
}

fn validate_stack(organization: &str, project: &str, stack: &str) -> Result<StackRef, WorkloadError> {
    for (field, value) in [
        ("organization", organization),
        ("project", project),
        ("stack", stack),
    ] {
        if value.is_empty() {
            return Err(WorkloadError::Validation(format!("{} is required", field)));
        }
    }

    Ok(StackRef::new(organization, project, stack))
}

/// Drop credentials from configuration shown back to users
fn redact(config: &Map<String, Value>) -> Map<String, Value> {
    config
        .iter()
        .filter(|(key, _)| {
            let key = key.to_ascii_lowercase();
            !key.contains("token") && !key.contains("kubeconfig")
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
