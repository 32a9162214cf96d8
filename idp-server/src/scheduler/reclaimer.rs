//! Stack reclaimer
//!
//! Periodically deletes stacks tagged for deletion. Deleting a workload only
//! destroys its resources and tags the stack; this loop removes the stack
//! record afterwards. Passes can also be triggered manually and may overlap
//! with timer passes or with other server instances, so a stack that is
//! already gone counts as reclaimed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use idp_client::Stacks;
use idp_core::domain::stack::ListStacksOptions;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReclaimerError {
    #[error("stack reclaimer is already running")]
    AlreadyRunning,
}

/// Tag a stack must carry to be reclaimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionCriteria {
    pub tag_key: String,
    pub tag_value: String,
}

impl DeletionCriteria {
    pub fn new(tag_key: impl Into<String>, tag_value: impl Into<String>) -> Self {
        Self {
            tag_key: tag_key.into(),
            tag_value: tag_value.into(),
        }
    }
}

/// Outcome of one reclamation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReclaimSummary {
    pub matched: usize,
    pub deleted: usize,
    pub already_gone: usize,
    pub failed: usize,
    /// Left for the next pass when the deadline expired
    pub abandoned: usize,
}

struct ReclaimerState {
    running: Option<CancellationToken>,
    last_run: Option<DateTime<Utc>>,
    criteria: DeletionCriteria,
}

struct Inner {
    stacks: Arc<dyn Stacks>,
    organization: String,
    interval: Duration,
    tick_timeout: Duration,
    state: Mutex<ReclaimerState>,
}

/// Scheduled reclamation of stacks marked for deletion
#[derive(Clone)]
pub struct StackReclaimer {
    inner: Arc<Inner>,
}

impl StackReclaimer {
    /// Creates a stopped reclaimer
    ///
    /// # Arguments
    /// * `interval` - Time between timer passes
    /// * `tick_timeout` - Overall deadline of one pass
    pub fn new(
        stacks: Arc<dyn Stacks>,
        organization: impl Into<String>,
        criteria: DeletionCriteria,
        interval: Duration,
        tick_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                stacks,
                organization: organization.into(),
                interval,
                tick_timeout,
                state: Mutex::new(ReclaimerState {
                    running: None,
                    last_run: None,
                    criteria,
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReclaimerState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the timer loop; the first pass runs immediately
    pub fn start(&self) -> Result<(), ReclaimerError> {
        let token = CancellationToken::new();
        {
            let mut state = self.state();
            if state.running.is_some() {
                return Err(ReclaimerError::AlreadyRunning);
            }
            state.running = Some(token.clone());
        }

        let reclaimer = self.clone();
        tokio::spawn(async move { reclaimer.run_loop(token).await });

        info!(
            "Stack reclaimer started (interval: {:?}, timeout: {:?})",
            self.inner.interval, self.inner.tick_timeout
        );
        Ok(())
    }

    /// Stops the timer loop; a pass in progress finishes first
    pub fn stop(&self) {
        if let Some(token) = self.state().running.take() {
            token.cancel();
            info!("Stack reclaimer stopped");
        }
    }

    /// Runs one pass outside the schedule
    pub fn trigger(&self) -> JoinHandle<ReclaimSummary> {
        info!("Manual reclamation triggered");
        let reclaimer = self.clone();
        tokio::spawn(async move { reclaimer.run_once().await })
    }

    pub fn is_running(&self) -> bool {
        self.state().running.is_some()
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.state().last_run
    }

    pub fn criteria(&self) -> DeletionCriteria {
        self.state().criteria.clone()
    }

    /// Applies from the next pass on
    pub fn update_criteria(&self, criteria: DeletionCriteria) {
        self.state().criteria = criteria;
    }

    async fn run_loop(&self, token: CancellationToken) {
        let mut interval = time::interval(self.inner.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    self.run_once().await;
                }
            }
        }

        debug!("Reclamation loop exited");
    }

    /// Deletes every stack matching the criteria before the pass deadline
    pub async fn run_once(&self) -> ReclaimSummary {
        let criteria = {
            let mut state = self.state();
            state.last_run = Some(Utc::now());
            state.criteria.clone()
        };
        let deadline = Instant::now() + self.inner.tick_timeout;
        let mut summary = ReclaimSummary::default();

        let options = ListStacksOptions::for_organization(&self.inner.organization)
            .with_tag(&criteria.tag_key, &criteria.tag_value);

        let stacks = match time::timeout_at(deadline, self.inner.stacks.list_all_stacks(&options)).await
        {
            Ok(Ok(stacks)) => stacks,
            Ok(Err(e)) => {
                error!("Error finding stacks to reclaim: {}", e);
                return summary;
            }
            Err(_) => {
                warn!("Timed out listing stacks to reclaim, will retry next run");
                return summary;
            }
        };

        summary.matched = stacks.len();
        if stacks.is_empty() {
            debug!("No stacks to reclaim");
            return summary;
        }
        info!("Found {} stack(s) to reclaim", stacks.len());

        for (index, stack) in stacks.iter().enumerate() {
            let stack_ref = stack.stack_ref();

            if Instant::now() >= deadline {
                summary.abandoned = stacks.len() - index;
                warn!("Reclamation deadline reached, {} stack(s) left for next run", summary.abandoned);
                break;
            }

            match time::timeout_at(deadline, self.inner.stacks.delete_stack(&stack_ref)).await {
                Ok(Ok(())) => {
                    info!(stack = %stack_ref, "Stack reclaimed");
                    summary.deleted += 1;
                }
                Ok(Err(e)) if e.is_not_found() => {
                    debug!(stack = %stack_ref, "Stack already reclaimed");
                    summary.already_gone += 1;
                }
                Ok(Err(e)) => {
                    error!(stack = %stack_ref, "Failed to reclaim stack: {}", e);
                    summary.failed += 1;
                }
                Err(_) => {
                    summary.abandoned = stacks.len() - index;
                    warn!(
                        stack = %stack_ref,
                        "Reclamation deadline reached, {} stack(s) left for next run",
                        summary.abandoned
                    );
                    break;
                }
            }
        }

        info!(
            matched = summary.matched,
            deleted = summary.deleted,
            already_gone = summary.already_gone,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "Reclamation pass completed"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, Journal, wait_for};
    use idp_core::domain::stack::Stack;
    use std::collections::HashMap;

    fn stack(name: &str, tags: &[(&str, &str)]) -> Stack {
        Stack {
            org_name: "acme".into(),
            project_name: "aws-static-site".into(),
            stack_name: name.into(),
            tags: tags
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
            ..Default::default()
        }
    }

    fn reclaimer(backend: &Arc<FakeBackend>, timeout: Duration) -> StackReclaimer {
        StackReclaimer::new(
            backend.clone(),
            "acme",
            DeletionCriteria::new("idp:auto-delete", "true"),
            Duration::from_secs(60),
            timeout,
        )
    }

    fn backend() -> Arc<FakeBackend> {
        Arc::new(FakeBackend::new(Arc::new(Journal::default())))
    }

    #[tokio::test]
    async fn test_only_marked_stacks_are_deleted() {
        let backend = backend();
        backend.insert(stack("a", &[("idp:auto-delete", "true")]));
        backend.insert(stack("b", &[("idp:workload", "b")]));
        backend.insert(stack("c", &[("idp:auto-delete", "false")]));

        let summary = reclaimer(&backend, Duration::from_secs(5)).run_once().await;

        assert_eq!(summary.matched, 1);
        assert_eq!(summary.deleted, 1);
        assert!(backend.stack("acme/aws-static-site/a").is_none());
        assert!(backend.stack("acme/aws-static-site/b").is_some());
        assert!(backend.stack("acme/aws-static-site/c").is_some());
    }

    #[tokio::test]
    async fn test_overlapping_passes_count_missing_stack_as_reclaimed() {
        let backend = backend();
        backend.insert(stack("a", &[("idp:auto-delete", "true")]));
        let reclaimer = reclaimer(&backend, Duration::from_secs(5));

        let (first, second) = tokio::join!(reclaimer.run_once(), reclaimer.run_once());

        assert_eq!(first.matched + second.matched, 2);
        assert_eq!(first.deleted + second.deleted, 1);
        assert_eq!(first.already_gone + second.already_gone, 1);
        assert_eq!(first.failed + second.failed, 0);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let backend = backend();
        backend.insert(stack("a", &[("idp:auto-delete", "true")]));
        backend.insert(stack("b", &[("idp:auto-delete", "true")]));
        backend.fail("delete_stack", 500);

        let summary = reclaimer(&backend, Duration::from_secs(5)).run_once().await;

        assert_eq!(summary.failed, 2);
        assert_eq!(summary.deleted, 0);
    }

    #[tokio::test]
    async fn test_deadline_abandons_remaining_stacks() {
        let backend = backend();
        for name in ["a", "b", "c"] {
            backend.insert(stack(name, &[("idp:auto-delete", "true")]));
        }
        backend.set_delete_delay(Duration::from_millis(500));

        let summary = reclaimer(&backend, Duration::from_millis(50)).run_once().await;

        assert_eq!(summary.matched, 3);
        assert_eq!(summary.deleted, 0);
        assert_eq!(summary.abandoned, 3);
    }

    #[tokio::test]
    async fn test_list_failure_yields_empty_summary() {
        let backend = backend();
        backend.fail("list_stacks", 503);

        let reclaimer = reclaimer(&backend, Duration::from_secs(5));
        let summary = reclaimer.run_once().await;

        assert_eq!(summary, ReclaimSummary::default());
        assert!(reclaimer.last_run().is_some());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected_and_stop_is_idempotent() {
        let backend = backend();
        let reclaimer = reclaimer(&backend, Duration::from_secs(5));

        assert!(!reclaimer.is_running());
        reclaimer.start().unwrap();
        assert!(reclaimer.is_running());
        assert_eq!(reclaimer.start(), Err(ReclaimerError::AlreadyRunning));

        reclaimer.stop();
        reclaimer.stop();
        assert!(!reclaimer.is_running());

        reclaimer.start().unwrap();
        reclaimer.stop();
    }

    #[tokio::test]
    async fn test_timer_and_manual_trigger_run_concurrently() {
        let backend = backend();
        backend.insert(stack("a", &[("idp:auto-delete", "true")]));
        let reclaimer = reclaimer(&backend, Duration::from_secs(5));

        reclaimer.start().unwrap();
        let manual = reclaimer.trigger().await.unwrap();

        wait_for(|| backend.stack("acme/aws-static-site/a").is_none()).await;
        assert_eq!(manual.failed, 0);
        assert!(manual.deleted + manual.already_gone <= 1);
        reclaimer.stop();
    }

    #[tokio::test]
    async fn test_updated_criteria_apply_to_next_pass() {
        let backend = backend();
        backend.insert(stack("a", &[("idp:auto-delete", "true")]));
        backend.insert(stack("b", &[("cleanup", "yes")]));
        let reclaimer = reclaimer(&backend, Duration::from_secs(5));

        reclaimer.update_criteria(DeletionCriteria::new("cleanup", "yes"));
        let summary = reclaimer.run_once().await;

        assert_eq!(summary.deleted, 1);
        assert!(backend.stack("acme/aws-static-site/a").is_some());
        assert!(backend.stack("acme/aws-static-site/b").is_none());
    }
}
