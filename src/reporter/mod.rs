//! Build failure reporting.
//!
//! When the dispatcher schedules a build that originated from an issue or
//! pull request (and carries an installation token), it registers the build
//! here. The reporter watches the worker pods those builds spawn; when one
//! fails, it posts a comment on the originating issue so the author learns
//! about the failure without digging through cluster logs.
//!
//! # Processing model
//!
//! Pod Add/Update notifications land in a rate-limited workqueue keyed by
//! `namespace/name`. `threadiness` worker tasks drain the queue; per-key
//! processing is serialized by the queue's in-flight gate. Failures requeue
//! with exponential backoff, at most [`MAX_REQUEUES`] times.

pub mod pods;
pub mod queue;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::github::checks::create_issue_comment;
use crate::github::error::GitHubApiError;
use crate::github::installation_client;
use crate::store::{BuildStore, StoreError};
use crate::types::{Build, IssueNumber, Project, RepoId};

pub use pods::{Pod, PodIndex, PodPhase};
pub use queue::{BackoffConfig, RateLimitedQueue};

/// Worker pods are named after the build they execute.
pub const WORKER_POD_PREFIX: &str = "brigade-worker-";

/// Maximum number of rate-limited requeues before a key is dropped.
const MAX_REQUEUES: u32 = 5;

/// Errors during pod processing. All of them are absorbed into the queue's
/// retry policy; logging is the only user-visible surface.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("store lookup failed: {0}")]
    Store(#[from] StoreError),

    #[error("posting comment failed: {0}")]
    Comment(#[from] GitHubApiError),

    #[error("unexpected pod phase: {0}")]
    UnexpectedPhase(String),
}

/// Seam for posting the failure comment, so tests can observe comments
/// without a GitHub endpoint.
#[async_trait]
pub trait BuildCommenter: Send + Sync {
    async fn comment(
        &self,
        project: &Project,
        issue: IssueNumber,
        token: &str,
        message: &str,
    ) -> Result<(), GitHubApiError>;
}

/// Production commenter: installation-token client against the project's
/// GitHub endpoint.
pub struct GithubCommenter;

#[async_trait]
impl BuildCommenter for GithubCommenter {
    async fn comment(
        &self,
        project: &Project,
        issue: IssueNumber,
        token: &str,
        message: &str,
    ) -> Result<(), GitHubApiError> {
        let client = installation_client(token, &project.github.base_url)
            .map_err(|e| GitHubApiError::permanent(e.to_string()))?;
        let repo = RepoId::parse(&project.name)
            .map_err(|e| GitHubApiError::permanent(e.to_string()))?;
        create_issue_comment(&client, &repo, issue, message).await
    }
}

/// A registered build awaiting its pod's fate.
#[derive(Debug, Clone)]
struct CommentableBuild {
    build: Build,
    issue_number: IssueNumber,
    installation_token: String,
}

/// Watches registered builds' worker pods and reports failures.
pub struct BuildReporter {
    store: Arc<dyn BuildStore>,
    commenter: Arc<dyn BuildCommenter>,
    namespace: String,
    pods: PodIndex,
    queue: Arc<RateLimitedQueue>,

    /// pod name → registered build. Written by the dispatcher path, read by
    /// workers.
    builds: RwLock<HashMap<String, CommentableBuild>>,
}

impl BuildReporter {
    pub fn new(store: Arc<dyn BuildStore>, namespace: impl Into<String>) -> Self {
        Self::with_commenter(store, namespace, Arc::new(GithubCommenter))
    }

    pub fn with_commenter(
        store: Arc<dyn BuildStore>,
        namespace: impl Into<String>,
        commenter: Arc<dyn BuildCommenter>,
    ) -> Self {
        BuildReporter {
            store,
            commenter,
            namespace: namespace.into(),
            pods: PodIndex::new(),
            queue: Arc::new(RateLimitedQueue::default()),
            builds: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a build for failure reporting.
    ///
    /// Also seeds a placeholder pod into the index so a lookup before the
    /// first watch notification behaves like any other non-terminal pod.
    pub fn add(&self, build: &Build, issue_number: IssueNumber, token: &str) {
        let pod_name = format!("{WORKER_POD_PREFIX}{}", build.id);
        debug!(pod = %pod_name, issue = %issue_number, "registering build for failure reporting");

        self.builds
            .write()
            .expect("builds lock poisoned")
            .insert(
                pod_name.clone(),
                CommentableBuild {
                    build: build.clone(),
                    issue_number,
                    installation_token: token.to_string(),
                },
            );

        self.pods
            .upsert(Pod::new(&self.namespace, pod_name, PodPhase::Pending));
    }

    /// Entry point for the cluster watch: records the pod's latest state and
    /// queues it for processing. Invoked on both Add and Update.
    pub fn observe(&self, pod: Pod) {
        let key = self.pods.upsert(pod);
        self.queue.add(key);
    }

    /// Runs `threadiness` workers until the shutdown token fires and the
    /// queue drains.
    pub async fn run(self: Arc<Self>, threadiness: usize, shutdown: CancellationToken) {
        info!(threadiness, "starting build reporter");

        {
            let queue = Arc::clone(&self.queue);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                queue.shut_down();
            });
        }

        let mut workers = Vec::with_capacity(threadiness);
        for _ in 0..threadiness.max(1) {
            let reporter = Arc::clone(&self);
            workers.push(tokio::spawn(async move { reporter.worker().await }));
        }
        for worker in workers {
            let _ = worker.await;
        }

        info!("stopping build reporter");
    }

    async fn worker(&self) {
        // Not a busy loop: `next` blocks until a key arrives or shutdown.
        while let Some(key) = self.queue.next().await {
            let result = self.process_pod(&key).await;
            self.complete_or_retry(&key, result);
            self.queue.done(&key);
        }
    }

    /// Examines the indexed state of one pod and reports if it failed.
    async fn process_pod(&self, key: &str) -> Result<(), ReporterError> {
        // Absent from the index: the pod was deleted; nothing to do.
        let Some(pod) = self.pods.get(key) else {
            return Ok(());
        };

        match pod.phase {
            PodPhase::Running | PodPhase::Unknown | PodPhase::Pending => Ok(()),
            PodPhase::Succeeded => {
                // Terminal and healthy: the registration is spent.
                self.remove_registration(&pod.name);
                Ok(())
            }
            PodPhase::Failed => self.report_failure(&pod.name).await,
            PodPhase::Other(phase) => Err(ReporterError::UnexpectedPhase(phase)),
        }
    }

    async fn report_failure(&self, pod_name: &str) -> Result<(), ReporterError> {
        let Some(ctx) = self
            .builds
            .read()
            .expect("builds lock poisoned")
            .get(pod_name)
            .cloned()
        else {
            // A failed pod we never registered is someone else's worker.
            debug!(pod = %pod_name, "skipping unregistered pod");
            return Ok(());
        };

        let project = self
            .store
            .get_project(ctx.build.project_id.as_str())
            .await?;

        let message = failure_message(&ctx.build);
        self.commenter
            .comment(
                &project,
                ctx.issue_number,
                &ctx.installation_token,
                &message,
            )
            .await?;

        info!(pod = %pod_name, issue = %ctx.issue_number, "reported build failure");
        self.remove_registration(pod_name);
        Ok(())
    }

    fn remove_registration(&self, pod_name: &str) {
        self.builds
            .write()
            .expect("builds lock poisoned")
            .remove(pod_name);
    }

    /// Applies the bounded-retry policy to a processing outcome.
    fn complete_or_retry(&self, key: &str, result: Result<(), ReporterError>) {
        let Err(err) = result else {
            // Clear the failure history so a later error starts fresh.
            self.queue.forget(key);
            return;
        };

        if self.queue.num_requeues(key) < MAX_REQUEUES {
            warn!(key, error = %err, "error processing pod, requeueing");
            self.queue.add_rate_limited(key);
        } else {
            warn!(key, error = %err, "dropping pod after repeated failures");
            self.queue.forget(key);
        }
    }

    #[cfg(test)]
    fn registered(&self, pod_name: &str) -> bool {
        self.builds
            .read()
            .expect("builds lock poisoned")
            .contains_key(pod_name)
    }
}

/// The comment posted when a build's worker pod fails.
fn failure_message(build: &Build) -> String {
    format!(
        "Build failed. Please run `brig build logs --init {}` to investigate the cause.",
        build.id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBuildStore;
    use crate::types::Revision;
    use std::sync::Mutex;

    /// Records comments instead of calling GitHub.
    #[derive(Default)]
    struct RecordingCommenter {
        comments: Mutex<Vec<(String, IssueNumber, String, String)>>,
        fail: Mutex<bool>,
    }

    impl RecordingCommenter {
        fn comments(&self) -> Vec<(String, IssueNumber, String, String)> {
            self.comments.lock().unwrap().clone()
        }

        fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }
    }

    #[async_trait]
    impl BuildCommenter for RecordingCommenter {
        async fn comment(
            &self,
            project: &Project,
            issue: IssueNumber,
            token: &str,
            message: &str,
        ) -> Result<(), GitHubApiError> {
            if *self.fail.lock().unwrap() {
                return Err(GitHubApiError::from_status(502, "unavailable"));
            }
            self.comments.lock().unwrap().push((
                project.name.clone(),
                issue,
                token.to_string(),
                message.to_string(),
            ));
            Ok(())
        }
    }

    struct Fixture {
        reporter: Arc<BuildReporter>,
        commenter: Arc<RecordingCommenter>,
        build: Build,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryBuildStore::new());
        let project = Project::new("octocat/hello-world", "asdf");
        store.insert_project(project.clone());

        let build = store
            .create_build(Build::new(
                project.id.clone(),
                "issue_comment",
                Revision::default(),
                b"{}".to_vec(),
            ))
            .await
            .unwrap();

        let commenter = Arc::new(RecordingCommenter::default());
        let reporter = Arc::new(BuildReporter::with_commenter(
            store,
            "brigade",
            Arc::clone(&commenter) as Arc<dyn BuildCommenter>,
        ));

        Fixture {
            reporter,
            commenter,
            build,
        }
    }

    fn worker_pod(build: &Build, phase: PodPhase) -> Pod {
        Pod::new("brigade", format!("{WORKER_POD_PREFIX}{}", build.id), phase)
    }

    #[tokio::test]
    async fn registration_seeds_placeholder_pod() {
        let f = fixture().await;
        f.reporter.add(&f.build, IssueNumber(2), "tok");

        let key = format!("brigade/{WORKER_POD_PREFIX}{}", f.build.id);
        let pod = f.reporter.pods.get(&key).unwrap();
        assert_eq!(pod.phase, PodPhase::Pending);
    }

    #[tokio::test]
    async fn failed_pod_of_registered_build_produces_comment() {
        let f = fixture().await;
        f.reporter.add(&f.build, IssueNumber(2), "tok");

        let pod = worker_pod(&f.build, PodPhase::Failed);
        let key = f.reporter.pods.upsert(pod);
        f.reporter.process_pod(&key).await.unwrap();

        let comments = f.commenter.comments();
        assert_eq!(comments.len(), 1);
        let (project, issue, token, message) = &comments[0];
        assert_eq!(project, "octocat/hello-world");
        assert_eq!(*issue, IssueNumber(2));
        assert_eq!(token, "tok");
        assert!(message.contains(f.build.id.as_str()));

        // Delivered: the registration is destroyed, no double comment.
        assert!(!f.reporter.registered(&worker_pod(&f.build, PodPhase::Failed).name));
        f.reporter.process_pod(&key).await.unwrap();
        assert_eq!(f.commenter.comments().len(), 1);
    }

    #[tokio::test]
    async fn failed_unregistered_pod_is_ignored() {
        let f = fixture().await;
        // Never registered: a pod from some other controller.
        let key = f
            .reporter
            .pods
            .upsert(Pod::new("brigade", "some-other-pod", PodPhase::Failed));

        f.reporter.process_pod(&key).await.unwrap();
        assert!(f.commenter.comments().is_empty());
    }

    #[tokio::test]
    async fn non_terminal_phases_are_noops() {
        let f = fixture().await;
        f.reporter.add(&f.build, IssueNumber(2), "tok");

        for phase in [PodPhase::Pending, PodPhase::Running, PodPhase::Unknown] {
            let key = f.reporter.pods.upsert(worker_pod(&f.build, phase));
            f.reporter.process_pod(&key).await.unwrap();
        }
        assert!(f.commenter.comments().is_empty());
        assert!(f.reporter.registered(&worker_pod(&f.build, PodPhase::Failed).name));
    }

    #[tokio::test]
    async fn succeeded_pod_destroys_registration() {
        let f = fixture().await;
        f.reporter.add(&f.build, IssueNumber(2), "tok");

        let key = f
            .reporter
            .pods
            .upsert(worker_pod(&f.build, PodPhase::Succeeded));
        f.reporter.process_pod(&key).await.unwrap();

        assert!(!f.reporter.registered(&worker_pod(&f.build, PodPhase::Failed).name));
        assert!(f.commenter.comments().is_empty());
    }

    #[tokio::test]
    async fn deleted_pod_is_a_noop() {
        let f = fixture().await;
        assert!(f.reporter.process_pod("brigade/vanished").await.is_ok());
    }

    #[tokio::test]
    async fn unexpected_phase_is_an_error() {
        let f = fixture().await;
        let key = f
            .reporter
            .pods
            .upsert(Pod::new("brigade", "weird", PodPhase::Other("Evicted".into())));

        let err = f.reporter.process_pod(&key).await.unwrap_err();
        assert!(matches!(err, ReporterError::UnexpectedPhase(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_is_bounded() {
        let f = fixture().await;
        let key = "brigade/some-pod".to_string();

        // Drive the retry policy directly with a persistent failure.
        for _ in 0..MAX_REQUEUES {
            f.reporter
                .complete_or_retry(&key, Err(ReporterError::UnexpectedPhase("Odd".into())));
        }
        assert_eq!(f.reporter.queue.num_requeues(&key), MAX_REQUEUES);

        // The budget is spent: the next failure drops and forgets the key.
        f.reporter
            .complete_or_retry(&key, Err(ReporterError::UnexpectedPhase("Odd".into())));
        assert_eq!(f.reporter.queue.num_requeues(&key), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn success_clears_failure_history() {
        let f = fixture().await;
        let key = "brigade/some-pod".to_string();

        f.reporter
            .complete_or_retry(&key, Err(ReporterError::UnexpectedPhase("Odd".into())));
        assert_eq!(f.reporter.queue.num_requeues(&key), 1);

        f.reporter.complete_or_retry(&key, Ok(()));
        assert_eq!(f.reporter.queue.num_requeues(&key), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_observe_failure_comment() {
        let f = fixture().await;
        f.reporter.add(&f.build, IssueNumber(7), "tok");

        let shutdown = CancellationToken::new();
        let run = tokio::spawn(Arc::clone(&f.reporter).run(1, shutdown.clone()));

        // First a transient commenter failure, then recovery: the requeue
        // policy must carry the key through.
        f.commenter.set_fail(true);
        f.reporter.observe(worker_pod(&f.build, PodPhase::Failed));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        f.commenter.set_fail(false);

        // Wait for the rate-limited requeue to land and be processed.
        let mut delivered = false;
        for _ in 0..200 {
            if !f.commenter.comments().is_empty() {
                delivered = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(delivered, "expected the failure comment to be delivered");

        shutdown.cancel();
        run.await.unwrap();
    }
}
