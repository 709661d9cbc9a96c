//! Typed GitHub webhook events.
//!
//! This module defines the tagged variant over the webhook event kinds the
//! gateway schedules builds for, together with the uniform derivation of
//! `{repo, revision, action}` each handler relies on.
//!
//! GitHub unions webhook bodies by event name only, so each variant carries
//! exactly the fields the gateway consumes; everything else in the payload is
//! forwarded untouched as raw JSON.

use crate::types::{AppId, InstallationId, IssueNumber, RepoId, Revision};

/// A parsed GitHub webhook event.
///
/// Event kinds the gateway does not recognize never reach this enum; the
/// parser reports them as unsupported and the dispatcher answers `Ignored`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    CommitComment(CommitCommentEvent),
    Create(CreateEvent),
    Deployment(DeploymentEvent),
    DeploymentStatus(DeploymentStatusEvent),
    PullRequest(PullRequestEvent),
    PullRequestReview(PullRequestReviewEvent),
    PullRequestReviewComment(PullRequestReviewCommentEvent),
    Push(PushEvent),
    Release(ReleaseEvent),
    Status(StatusEvent),
    CheckSuite(CheckSuiteEvent),
    CheckRun(CheckRunEvent),
    IssueComment(IssueCommentEvent),
}

impl GatewayEvent {
    /// The repository the event belongs to.
    pub fn repo(&self) -> &RepoId {
        match self {
            GatewayEvent::CommitComment(e) => &e.repo,
            GatewayEvent::Create(e) => &e.repo,
            GatewayEvent::Deployment(e) => &e.repo,
            GatewayEvent::DeploymentStatus(e) => &e.repo,
            GatewayEvent::PullRequest(e) => &e.repo,
            GatewayEvent::PullRequestReview(e) => &e.repo,
            GatewayEvent::PullRequestReviewComment(e) => &e.repo,
            GatewayEvent::Push(e) => &e.repo,
            GatewayEvent::Release(e) => &e.repo,
            GatewayEvent::Status(e) => &e.repo,
            GatewayEvent::CheckSuite(e) => &e.repo,
            GatewayEvent::CheckRun(e) => &e.repo,
            GatewayEvent::IssueComment(e) => &e.repo,
        }
    }

    /// The event action, for kinds that qualify their build type with one.
    pub fn action(&self) -> Option<&str> {
        match self {
            GatewayEvent::CommitComment(e) => Some(&e.action),
            GatewayEvent::PullRequest(e) => Some(&e.action),
            GatewayEvent::PullRequestReview(e) => Some(&e.action),
            GatewayEvent::PullRequestReviewComment(e) => Some(&e.action),
            GatewayEvent::Release(e) => Some(&e.action),
            GatewayEvent::CheckSuite(e) => Some(&e.action),
            GatewayEvent::CheckRun(e) => Some(&e.action),
            GatewayEvent::IssueComment(e) => Some(&e.action),
            GatewayEvent::Create(_)
            | GatewayEvent::Deployment(_)
            | GatewayEvent::DeploymentStatus(_)
            | GatewayEvent::Push(_)
            | GatewayEvent::Status(_) => None,
        }
    }

    /// Derives the revision a build for this event runs against.
    ///
    /// `issue_comment` events derive their revision during enrichment (the
    /// payload itself does not name a commit), so this returns the empty
    /// revision for them.
    pub fn revision(&self) -> Revision {
        match self {
            GatewayEvent::CommitComment(e) => Revision::new(e.commit_id.clone(), ""),
            GatewayEvent::Create(e) => Revision::new("", e.reference.clone()),
            GatewayEvent::Deployment(e) => Revision::new(e.sha.clone(), e.reference.clone()),
            GatewayEvent::DeploymentStatus(e) => Revision::new(e.sha.clone(), e.reference.clone()),
            GatewayEvent::PullRequest(e) => {
                Revision::new(e.head_sha.clone(), pull_request_ref(e.number))
            }
            GatewayEvent::PullRequestReview(e) => {
                Revision::new(e.head_sha.clone(), pull_request_ref(e.number))
            }
            GatewayEvent::PullRequestReviewComment(e) => {
                Revision::new(e.head_sha.clone(), pull_request_ref(e.number))
            }
            GatewayEvent::Push(e) => Revision::new(
                e.head_commit_id.clone().unwrap_or_default(),
                e.reference.clone(),
            ),
            GatewayEvent::Release(e) => Revision::new("", e.tag_name.clone()),
            GatewayEvent::Status(e) => Revision::new(e.sha.clone(), ""),
            GatewayEvent::CheckSuite(e) => {
                Revision::new(e.head_sha.clone(), e.head_branch.clone())
            }
            GatewayEvent::CheckRun(e) => Revision::new(e.head_sha.clone(), e.head_branch.clone()),
            GatewayEvent::IssueComment(_) => Revision::default(),
        }
    }

    /// The name GitHub uses for this event kind in `X-GitHub-Event`.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::CommitComment(_) => "commit_comment",
            GatewayEvent::Create(_) => "create",
            GatewayEvent::Deployment(_) => "deployment",
            GatewayEvent::DeploymentStatus(_) => "deployment_status",
            GatewayEvent::PullRequest(_) => "pull_request",
            GatewayEvent::PullRequestReview(_) => "pull_request_review",
            GatewayEvent::PullRequestReviewComment(_) => "pull_request_review_comment",
            GatewayEvent::Push(_) => "push",
            GatewayEvent::Release(_) => "release",
            GatewayEvent::Status(_) => "status",
            GatewayEvent::CheckSuite(_) => "check_suite",
            GatewayEvent::CheckRun(_) => "check_run",
            GatewayEvent::IssueComment(_) => "issue_comment",
        }
    }
}

/// The synthetic head ref GitHub serves for a pull request.
pub fn pull_request_ref(number: IssueNumber) -> String {
    format!("refs/pull/{}/head", number.0)
}

/// A comment on a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCommentEvent {
    pub repo: RepoId,
    pub action: String,
    pub commit_id: String,
}

/// A branch or tag was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEvent {
    pub repo: RepoId,
    pub reference: String,
}

/// A deployment was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentEvent {
    pub repo: RepoId,
    pub sha: String,
    pub reference: String,
}

/// A deployment's status changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStatusEvent {
    pub repo: RepoId,
    pub sha: String,
    pub reference: String,
}

/// A pull request was opened, updated, or otherwise acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub repo: RepoId,
    pub action: String,
    pub number: IssueNumber,
    pub head_sha: String,

    /// Whether the PR's head repository is a fork of the base repository.
    pub head_repo_fork: bool,

    /// GitHub's classification of the PR author relative to the repository
    /// (OWNER, MEMBER, COLLABORATOR, NONE, ...).
    pub author_association: String,

    pub installation_id: InstallationId,
}

/// A review was submitted, edited, or dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestReviewEvent {
    pub repo: RepoId,
    pub action: String,
    pub number: IssueNumber,
    pub head_sha: String,
}

/// A comment on a pull request diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestReviewCommentEvent {
    pub repo: RepoId,
    pub action: String,
    pub number: IssueNumber,
    pub head_sha: String,
}

/// Commits were pushed (or a ref was deleted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repo: RepoId,
    pub reference: String,

    /// Absent on branch deletions.
    pub head_commit_id: Option<String>,

    /// True when the push deleted the ref; no build is scheduled then.
    pub deleted: bool,
}

/// A release was published or otherwise acted upon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub repo: RepoId,
    pub action: String,
    pub tag_name: String,
}

/// A commit status changed (legacy Status API).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub repo: RepoId,
    pub sha: String,
}

/// A check suite changed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSuiteEvent {
    pub repo: RepoId,
    pub action: String,
    pub head_sha: String,
    pub head_branch: String,

    /// The App the suite belongs to. Deliveries for other Apps are dropped.
    pub app_id: AppId,

    pub installation_id: InstallationId,

    /// The first PR associated with the suite, when any.
    pub first_pull_request: Option<IssueNumber>,
}

/// A check run changed state.
///
/// `head_sha`/`head_branch` come from the run's parent suite; `app_id` is the
/// run's App, falling back to the suite's App when the run carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRunEvent {
    pub repo: RepoId,
    pub action: String,
    pub head_sha: String,
    pub head_branch: String,
    pub app_id: AppId,
    pub installation_id: InstallationId,
    pub first_pull_request: Option<IssueNumber>,
}

/// A comment on an issue or on a pull request's conversation tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub repo: RepoId,
    pub action: String,
    pub issue_number: IssueNumber,

    /// True when the issue is actually a pull request.
    pub is_pull_request: bool,

    /// Author association of the comment (not of the issue).
    pub author_association: String,

    pub installation_id: InstallationId,

    /// The App id the installation belongs to, when the payload carries it.
    pub installation_app_id: AppId,
}
