//! In-memory fakes of the remote APIs
//!
//! Every fake call is appended to a shared [`Journal`] so tests can assert
//! on the order of remote calls across different APIs.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use idp_client::{ClientError, Deployments, EnvironmentApi, RepositoryApi, Result, Stacks, Teams};
use idp_core::domain::deployment::{
    Deployment, DeploymentCreated, DeploymentOperation, DeploymentSettings, LogPage,
    StackDeployments,
};
use idp_core::domain::stack::{ListStacksOptions, ListStacksResponse, Stack, StackCreated, StackRef};
use idp_core::domain::tag::{self, Tag};
use idp_core::domain::team::Team;
use idp_core::domain::workload::WorkloadKind;
use idp_core::dto::environment::EnvironmentDefinition;
use idp_core::dto::repository::{
    OAuthToken, RepoCreationRequest, RepoFile, Repository, RepositoryOwner,
};
use serde_json::{Map, Value};

use crate::api::AppState;
use crate::scaffold::TemplateScaffolder;
use crate::scheduler::{DeletionCriteria, StackReclaimer};
use crate::service::{AccountService, ProvisioningSettings, WorkloadService};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered record of remote calls
#[derive(Default)]
pub struct Journal(Mutex<Vec<String>>);

impl Journal {
    pub fn record(&self, call: impl Into<String>) {
        lock(&self.0).push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.0).clone()
    }

    /// Index of the first call containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        lock(&self.0).iter().position(|c| c.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        lock(&self.0).iter().filter(|c| c.contains(needle)).count()
    }
}

/// Poll `condition` until it holds, failing the test after a few seconds
pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

// =============================================================================
// Stack backend (stacks, deployments, teams, environments)
// =============================================================================

#[derive(Default)]
pub struct FakeBackend {
    journal: Arc<Journal>,
    stacks: Mutex<Vec<Stack>>,
    failures: Mutex<HashMap<String, u16>>,
    settings: Mutex<HashMap<String, DeploymentSettings>>,
    deployments: Mutex<HashMap<String, Vec<Deployment>>>,
    environments: Mutex<HashMap<String, Map<String, Value>>>,
    delete_delay: Mutex<Duration>,
}

impl FakeBackend {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    /// Make calls whose failure key equals `operation` answer with `status`
    pub fn fail(&self, operation: &str, status: u16) {
        lock(&self.failures).insert(operation.to_string(), status);
    }

    pub fn set_delete_delay(&self, delay: Duration) {
        *lock(&self.delete_delay) = delay;
    }

    pub fn insert(&self, stack: Stack) {
        lock(&self.stacks).push(stack);
    }

    /// Look up a stack by `org/project/stack`
    pub fn stack(&self, key: &str) -> Option<Stack> {
        lock(&self.stacks)
            .iter()
            .find(|s| s.stack_ref().to_string() == key)
            .cloned()
    }

    pub fn put_settings(&self, stack: &StackRef, settings: DeploymentSettings) {
        lock(&self.settings).insert(stack.to_string(), settings);
    }

    pub fn settings(&self, key: &str) -> Option<DeploymentSettings> {
        lock(&self.settings).get(key).cloned()
    }

    /// Store an environment whose `pulumiConfig` is `config`
    pub fn put_environment(&self, key: &str, config: Value) {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        lock(&self.environments).insert(key.to_string(), config);
    }

    pub fn environment_config(&self, key: &str) -> Option<Map<String, Value>> {
        lock(&self.environments).get(key).cloned()
    }

    fn check(&self, operations: &[&str]) -> Result<()> {
        let failures = lock(&self.failures);
        for operation in operations {
            if let Some(status) = failures.get(*operation) {
                return Err(ClientError::api_error(*status, "injected failure"));
            }
        }
        Ok(())
    }
}

fn matches_filters(stack: &Stack, options: &ListStacksOptions) -> bool {
    if options
        .organization
        .as_deref()
        .is_some_and(|org| org != stack.org_name)
    {
        return false;
    }
    if options
        .project
        .as_deref()
        .is_some_and(|project| project != stack.project_name)
    {
        return false;
    }
    match (&options.tag_name, &options.tag_value) {
        (Some(name), Some(value)) => stack.tag(name) == Some(value.as_str()),
        (Some(name), None) => stack.tag(name).is_some(),
        _ => true,
    }
}

#[async_trait]
impl Stacks for FakeBackend {
    async fn create_stack(&self, stack: &StackRef) -> Result<StackCreated> {
        self.journal.record(format!("create_stack {}", stack));
        self.check(&["create_stack"])?;

        self.insert(Stack {
            org_name: stack.organization.clone(),
            project_name: stack.project.clone(),
            stack_name: stack.stack.clone(),
            ..Default::default()
        });
        Ok(StackCreated {
            name: stack.stack.clone(),
            ..Default::default()
        })
    }

    async fn delete_stack(&self, stack: &StackRef) -> Result<()> {
        self.journal.record(format!("delete_stack {}", stack));
        self.check(&["delete_stack"])?;

        let delay = *lock(&self.delete_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut stacks = lock(&self.stacks);
        let before = stacks.len();
        stacks.retain(|s| &s.stack_ref() != stack);
        if stacks.len() == before {
            return Err(ClientError::api_error(404, "stack not found"));
        }
        Ok(())
    }

    async fn get_stack(&self, stack: &StackRef) -> Result<Stack> {
        self.check(&["get_stack"])?;
        self.stack(&stack.to_string())
            .ok_or_else(|| ClientError::api_error(404, "stack not found"))
    }

    async fn list_stacks(&self, options: &ListStacksOptions) -> Result<ListStacksResponse> {
        self.journal.record("list_stacks");
        self.check(&["list_stacks"])?;

        let stacks: Vec<Stack> = lock(&self.stacks)
            .iter()
            .filter(|s| matches_filters(s, options))
            .map(|s| Stack {
                // listings carry no tags; callers fetch them per stack
                tags: HashMap::new(),
                ..s.clone()
            })
            .collect();

        // Let concurrent passes observe the same snapshot
        tokio::task::yield_now().await;

        Ok(ListStacksResponse {
            stacks,
            continuation_token: None,
        })
    }

    async fn set_stack_tag(&self, stack: &StackRef, tag: &Tag) -> Result<()> {
        self.journal
            .record(format!("set_stack_tag {} {}={}", stack, tag.key, tag.value));
        self.check(&["set_stack_tag", &format!("set_stack_tag:{}", tag.key)])?;

        let mut stacks = lock(&self.stacks);
        let found = stacks
            .iter_mut()
            .find(|s| &s.stack_ref() == stack)
            .ok_or_else(|| ClientError::api_error(404, "stack not found"))?;
        found.tags.insert(tag.key.clone(), tag.value.clone());
        Ok(())
    }
}

#[async_trait]
impl Deployments for FakeBackend {
    async fn create_deployment_settings(
        &self,
        stack: &StackRef,
        settings: &DeploymentSettings,
    ) -> Result<()> {
        self.journal
            .record(format!("create_deployment_settings {}", stack));
        self.check(&["create_deployment_settings"])?;
        self.put_settings(stack, settings.clone());
        Ok(())
    }

    async fn get_deployment_settings(&self, stack: &StackRef) -> Result<Option<DeploymentSettings>> {
        self.check(&["get_deployment_settings"])?;
        Ok(self.settings(&stack.to_string()))
    }

    async fn create_deployment(
        &self,
        stack: &StackRef,
        operation: DeploymentOperation,
    ) -> Result<DeploymentCreated> {
        self.journal
            .record(format!("create_deployment {} {}", stack, operation.as_str()));
        self.check(&[
            "create_deployment",
            &format!("create_deployment:{}", operation.as_str()),
        ])?;

        let mut deployments = lock(&self.deployments);
        let history = deployments.entry(stack.to_string()).or_default();
        let id = format!("dep-{}", history.len() + 1);
        history.insert(
            0,
            Deployment {
                id: id.clone(),
                status: "queued".to_string(),
                pulumi_operation: operation.as_str().to_string(),
                ..Default::default()
            },
        );

        Ok(DeploymentCreated {
            id,
            ..Default::default()
        })
    }

    async fn get_stack_updates(&self, stack: &StackRef) -> Result<StackDeployments> {
        self.check(&["get_stack_updates"])?;
        let deployments = lock(&self.deployments)
            .get(&stack.to_string())
            .map(|history| history.iter().take(1).cloned().collect())
            .unwrap_or_default();
        Ok(StackDeployments {
            deployments,
            items_per_page: 1,
            total: 0,
        })
    }

    async fn get_deployment_logs(
        &self,
        stack: &StackRef,
        deployment_id: &str,
        _continuation_token: Option<&str>,
    ) -> Result<LogPage> {
        self.journal
            .record(format!("get_deployment_logs {} {}", stack, deployment_id));
        self.check(&["get_deployment_logs"])?;
        Ok(LogPage::default())
    }
}

#[async_trait]
impl Teams for FakeBackend {
    async fn list_teams(&self, organization: &str) -> Result<Vec<Team>> {
        self.journal.record(format!("list_teams {}", organization));
        self.check(&["list_teams"])?;
        Ok(vec![Team {
            name: "platform".to_string(),
            display_name: "Platform".to_string(),
            ..Default::default()
        }])
    }

    async fn grant_stack_access_to_team(
        &self,
        stack: &StackRef,
        team: &str,
        permission: u32,
    ) -> Result<()> {
        self.journal
            .record(format!("grant {} {} {}", stack, team, permission));
        self.check(&["grant"])
    }
}

#[async_trait]
impl EnvironmentApi for FakeBackend {
    async fn create_environment(&self, organization: &str, project: &str, name: &str) -> Result<()> {
        let key = format!("{}/{}/{}", organization, project, name);
        self.journal.record(format!("create_environment {}", key));
        self.check(&["create_environment"])?;

        let mut environments = lock(&self.environments);
        if environments.contains_key(&key) {
            return Err(ClientError::api_error(409, "environment already exists"));
        }
        environments.insert(key, Map::new());
        Ok(())
    }

    async fn update_environment(
        &self,
        organization: &str,
        project: &str,
        name: &str,
        definition: &EnvironmentDefinition,
    ) -> Result<()> {
        let key = format!("{}/{}/{}", organization, project, name);
        self.journal.record(format!("update_environment {}", key));
        self.check(&["update_environment"])?;
        lock(&self.environments).insert(key, definition.values.pulumi_config.clone());
        Ok(())
    }

    async fn open_and_read_environment(
        &self,
        organization: &str,
        project: &str,
        name: &str,
    ) -> Result<Map<String, Value>> {
        let key = format!("{}/{}/{}", organization, project, name);
        self.check(&["open_and_read_environment"])?;
        let config = lock(&self.environments)
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::api_error(404, "environment not found"))?;

        let mut values = Map::new();
        values.insert("pulumiConfig".to_string(), Value::Object(config));
        Ok(values)
    }
}

// =============================================================================
// Source control
// =============================================================================

#[derive(Default)]
pub struct FakeRepositories {
    journal: Arc<Journal>,
    calls: Mutex<Vec<String>>,
    committed: Mutex<HashMap<String, Vec<String>>>,
}

impl FakeRepositories {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Paths committed to `repo`
    pub fn committed_paths(&self, repo: &str) -> Vec<String> {
        lock(&self.committed).get(repo).cloned().unwrap_or_default()
    }

    fn record(&self, call: String) {
        self.journal.record(call.clone());
        lock(&self.calls).push(call);
    }
}

#[async_trait]
impl RepositoryApi for FakeRepositories {
    async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        if code.is_empty() {
            return Err(ClientError::InvalidRequest("missing required field: code".to_string()));
        }
        self.record(format!("exchange_code {}", code));
        Ok(OAuthToken {
            access_token: "gho_fake".to_string(),
            token_type: "bearer".to_string(),
            scope: "repo".to_string(),
        })
    }

    async fn create_repository(&self, request: &RepoCreationRequest) -> Result<Repository> {
        self.record(format!("create_repository {}", request.name));
        Ok(Repository {
            name: request.name.clone(),
            full_name: format!("octo/{}", request.name),
            owner: RepositoryOwner {
                login: "octo".to_string(),
            },
            html_url: format!("https://github.com/octo/{}", request.name),
            clone_url: format!("https://github.com/octo/{}.git", request.name),
            default_branch: Some("main".to_string()),
        })
    }

    async fn commit_files(
        &self,
        owner: &str,
        repo: &str,
        files: &[RepoFile],
        _message: &str,
    ) -> Result<String> {
        self.record(format!("commit_files {}/{} {}", owner, repo, files.len()));
        lock(&self.committed).insert(
            repo.to_string(),
            files.iter().map(|f| f.path.clone()).collect(),
        );
        Ok("main".to_string())
    }

    async fn protect_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        require_reviews: bool,
    ) -> Result<()> {
        self.record(format!(
            "protect_branch {}/{} {} reviews={}",
            owner, repo, branch, require_reviews
        ));
        Ok(())
    }
}

/// Writes a single `Pulumi.yaml` instead of running the CLI
pub struct FakeScaffolder {
    journal: Arc<Journal>,
}

#[async_trait]
impl TemplateScaffolder for FakeScaffolder {
    async fn scaffold(
        &self,
        dir: &Path,
        template: &str,
        project_name: &str,
        _description: &str,
    ) -> anyhow::Result<()> {
        self.journal
            .record(format!("scaffold {} {}", template, project_name));
        std::fs::write(
            dir.join("Pulumi.yaml"),
            format!("name: {}\nruntime: nodejs\n", project_name),
        )?;
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub journal: Arc<Journal>,
    pub backend: Arc<FakeBackend>,
    pub repositories: Arc<FakeRepositories>,
    pub service: WorkloadService,
    pub accounts: AccountService,
    source_control_configured: bool,
}

impl Harness {
    pub fn new(kind: WorkloadKind) -> Self {
        Self::build(kind, true)
    }

    pub fn without_source_control(kind: WorkloadKind) -> Self {
        Self::build(kind, false)
    }

    fn build(kind: WorkloadKind, source_control_configured: bool) -> Self {
        let journal = Arc::new(Journal::default());
        let backend = Arc::new(FakeBackend::new(journal.clone()));
        let repositories = Arc::new(FakeRepositories::new(journal.clone()));

        let service = Self::service_for(kind, &journal, &backend, &repositories, source_control_configured);
        let accounts = AccountService::new(backend.clone(), repositories.clone(), "acme");

        Self {
            journal,
            backend,
            repositories,
            service,
            accounts,
            source_control_configured,
        }
    }

    /// Router state over this harness' fakes with a stopped reclaimer
    pub fn app_state(&self) -> AppState {
        AppState {
            workloads: self.service(WorkloadKind::Workload),
            workflows: self.service(WorkloadKind::Workflow),
            accounts: self.accounts.clone(),
            reclaimer: StackReclaimer::new(
                self.backend.clone(),
                "acme",
                DeletionCriteria::new(tag::AUTO_DELETE, "true"),
                Duration::from_secs(60),
                Duration::from_secs(5),
            ),
        }
    }

    /// A service of `kind` sharing this harness' fakes
    pub fn service(&self, kind: WorkloadKind) -> WorkloadService {
        Self::service_for(
            kind,
            &self.journal,
            &self.backend,
            &self.repositories,
            self.source_control_configured,
        )
    }

    fn service_for(
        kind: WorkloadKind,
        journal: &Arc<Journal>,
        backend: &Arc<FakeBackend>,
        repositories: &Arc<FakeRepositories>,
        source_control_configured: bool,
    ) -> WorkloadService {
        let mut settings =
            ProvisioningSettings::new("acme", "https://github.com/acme/blueprints.git");
        settings.source_control_configured = source_control_configured;

        WorkloadService::new(
            kind,
            backend.clone(),
            repositories.clone(),
            backend.clone(),
            Arc::new(FakeScaffolder {
                journal: journal.clone(),
            }),
            settings,
        )
    }
}
