//! GitHub webhook payload parser.
//!
//! Parses raw webhook JSON into typed [`GatewayEvent`] values, keyed by the
//! `X-GitHub-Event` header.
//!
//! # Parsing strategy
//!
//! 1. The event kind is determined from the header, not the body
//! 2. The body is deserialized into a lenient `Raw*` structure for that kind
//! 3. Unknown kinds return `Ok(None)` (answered `Ignored`, not an error)
//! 4. Check events whose payload lacks the expected object also return
//!    `Ok(None)`; the delivery was built for a different consumer
//! 5. Malformed JSON returns `Err`

use serde::Deserialize;
use thiserror::Error;

use crate::types::{AppId, InstallationId, IssueNumber, RepoId};

use super::events::{
    CheckRunEvent, CheckSuiteEvent, CommitCommentEvent, CreateEvent, DeploymentEvent,
    DeploymentStatusEvent, GatewayEvent, IssueCommentEvent, PullRequestEvent,
    PullRequestReviewCommentEvent, PullRequestReviewEvent, PushEvent, ReleaseEvent, StatusEvent,
};

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parses a webhook payload into a typed event.
///
/// # Returns
///
/// * `Ok(Some(event))` - a recognized event kind was parsed
/// * `Ok(None)` - the kind is not one the gateway schedules builds for
/// * `Err(e)` - the body is not valid JSON for the declared kind
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<GatewayEvent>, ParseError> {
    let event = match event_type {
        "commit_comment" => Some(GatewayEvent::CommitComment(parse_commit_comment(payload)?)),
        "create" => Some(GatewayEvent::Create(parse_create(payload)?)),
        "deployment" => Some(GatewayEvent::Deployment(parse_deployment(payload)?)),
        "deployment_status" => Some(GatewayEvent::DeploymentStatus(parse_deployment_status(
            payload,
        )?)),
        "pull_request" => Some(GatewayEvent::PullRequest(parse_pull_request(payload)?)),
        "pull_request_review" => Some(GatewayEvent::PullRequestReview(parse_pull_request_review(
            payload,
        )?)),
        "pull_request_review_comment" => Some(GatewayEvent::PullRequestReviewComment(
            parse_pull_request_review_comment(payload)?,
        )),
        "push" => Some(GatewayEvent::Push(parse_push(payload)?)),
        "release" => Some(GatewayEvent::Release(parse_release(payload)?)),
        "status" => Some(GatewayEvent::Status(parse_status(payload)?)),
        "check_suite" => parse_check_suite(payload)?.map(GatewayEvent::CheckSuite),
        "check_run" => parse_check_run(payload)?.map(GatewayEvent::CheckRun),
        "issue_comment" => Some(GatewayEvent::IssueComment(parse_issue_comment(payload)?)),
        // Unknown event kinds are ignored, not an error
        _ => None,
    };
    Ok(event)
}

// ============================================================================
// Raw payload structures for deserialization
//
// These match GitHub's webhook JSON. Option<T> is used liberally so payload
// variations (forks, deleted refs, missing installations) degrade to defaults
// instead of failing the delivery.
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

impl RawRepository {
    fn repo_id(&self) -> RepoId {
        RepoId::new(self.owner.login.clone(), self.name.clone())
    }
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawInstallation {
    id: u64,
    app_id: Option<u64>,
}

fn installation_id(installation: &Option<RawInstallation>) -> InstallationId {
    InstallationId(installation.as_ref().map(|i| i.id).unwrap_or(0))
}

// ─── commit_comment ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCommitCommentPayload {
    action: String,
    comment: RawCommitComment,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawCommitComment {
    commit_id: String,
}

fn parse_commit_comment(payload: &[u8]) -> Result<CommitCommentEvent, ParseError> {
    let raw: RawCommitCommentPayload = serde_json::from_slice(payload)?;
    Ok(CommitCommentEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        commit_id: raw.comment.commit_id,
    })
}

// ─── create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCreatePayload {
    #[serde(rename = "ref")]
    reference: String,
    repository: RawRepository,
}

fn parse_create(payload: &[u8]) -> Result<CreateEvent, ParseError> {
    let raw: RawCreatePayload = serde_json::from_slice(payload)?;
    Ok(CreateEvent {
        repo: raw.repository.repo_id(),
        reference: raw.reference,
    })
}

// ─── deployment / deployment_status ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawDeploymentPayload {
    deployment: RawDeployment,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawDeployment {
    sha: String,
    #[serde(rename = "ref")]
    reference: String,
}

fn parse_deployment(payload: &[u8]) -> Result<DeploymentEvent, ParseError> {
    let raw: RawDeploymentPayload = serde_json::from_slice(payload)?;
    Ok(DeploymentEvent {
        repo: raw.repository.repo_id(),
        sha: raw.deployment.sha,
        reference: raw.deployment.reference,
    })
}

fn parse_deployment_status(payload: &[u8]) -> Result<DeploymentStatusEvent, ParseError> {
    let raw: RawDeploymentPayload = serde_json::from_slice(payload)?;
    Ok(DeploymentStatusEvent {
        repo: raw.repository.repo_id(),
        sha: raw.deployment.sha,
        reference: raw.deployment.reference,
    })
}

// ─── pull_request ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    pull_request: RawPullRequest,
    repository: RawRepository,
    installation: Option<RawInstallation>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
    head: RawPrHead,
    author_association: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPrHead {
    sha: String,
    repo: Option<RawPrHeadRepo>,
}

#[derive(Debug, Deserialize)]
struct RawPrHeadRepo {
    fork: Option<bool>,
}

fn parse_pull_request(payload: &[u8]) -> Result<PullRequestEvent, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;
    Ok(PullRequestEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        number: IssueNumber(raw.pull_request.number),
        head_sha: raw.pull_request.head.sha,
        head_repo_fork: raw
            .pull_request
            .head
            .repo
            .and_then(|r| r.fork)
            .unwrap_or(false),
        author_association: raw.pull_request.author_association.unwrap_or_default(),
        installation_id: installation_id(&raw.installation),
    })
}

// ─── pull_request_review / pull_request_review_comment ────────────────────────

#[derive(Debug, Deserialize)]
struct RawReviewPayload {
    action: String,
    pull_request: RawReviewPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawReviewPullRequest {
    number: u64,
    head: RawPrHead,
}

fn parse_pull_request_review(payload: &[u8]) -> Result<PullRequestReviewEvent, ParseError> {
    let raw: RawReviewPayload = serde_json::from_slice(payload)?;
    Ok(PullRequestReviewEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        number: IssueNumber(raw.pull_request.number),
        head_sha: raw.pull_request.head.sha,
    })
}

fn parse_pull_request_review_comment(
    payload: &[u8],
) -> Result<PullRequestReviewCommentEvent, ParseError> {
    let raw: RawReviewPayload = serde_json::from_slice(payload)?;
    Ok(PullRequestReviewCommentEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        number: IssueNumber(raw.pull_request.number),
        head_sha: raw.pull_request.head.sha,
    })
}

// ─── push ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawPushPayload {
    #[serde(rename = "ref")]
    reference: String,
    deleted: Option<bool>,
    head_commit: Option<RawHeadCommit>,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawHeadCommit {
    id: String,
}

fn parse_push(payload: &[u8]) -> Result<PushEvent, ParseError> {
    let raw: RawPushPayload = serde_json::from_slice(payload)?;
    Ok(PushEvent {
        repo: raw.repository.repo_id(),
        reference: raw.reference,
        head_commit_id: raw.head_commit.map(|c| c.id),
        deleted: raw.deleted.unwrap_or(false),
    })
}

// ─── release ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawReleasePayload {
    action: String,
    release: RawRelease,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawRelease {
    tag_name: String,
}

fn parse_release(payload: &[u8]) -> Result<ReleaseEvent, ParseError> {
    let raw: RawReleasePayload = serde_json::from_slice(payload)?;
    Ok(ReleaseEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        tag_name: raw.release.tag_name,
    })
}

// ─── status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawStatusPayload {
    sha: String,
    repository: RawRepository,
}

fn parse_status(payload: &[u8]) -> Result<StatusEvent, ParseError> {
    let raw: RawStatusPayload = serde_json::from_slice(payload)?;
    Ok(StatusEvent {
        repo: raw.repository.repo_id(),
        sha: raw.sha,
    })
}

// ─── check_suite / check_run ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawCheckSuitePayload {
    action: String,
    check_suite: Option<RawCheckSuite>,
    repository: RawRepository,
    installation: Option<RawInstallation>,
}

#[derive(Debug, Deserialize)]
struct RawCheckSuite {
    head_sha: String,
    head_branch: Option<String>,
    app: RawApp,
    #[serde(default)]
    pull_requests: Vec<RawCheckPr>,
}

#[derive(Debug, Deserialize)]
struct RawApp {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RawCheckPr {
    number: u64,
}

fn parse_check_suite(payload: &[u8]) -> Result<Option<CheckSuiteEvent>, ParseError> {
    let raw: RawCheckSuitePayload = serde_json::from_slice(payload)?;

    // A check_suite delivery without the suite object is not something this
    // gateway can act on; treat it as unsupported rather than guessing.
    let Some(suite) = raw.check_suite else {
        return Ok(None);
    };

    Ok(Some(CheckSuiteEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        head_sha: suite.head_sha,
        head_branch: suite.head_branch.unwrap_or_default(),
        app_id: AppId(suite.app.id),
        installation_id: installation_id(&raw.installation),
        first_pull_request: suite.pull_requests.first().map(|pr| IssueNumber(pr.number)),
    }))
}

#[derive(Debug, Deserialize)]
struct RawCheckRunPayload {
    action: String,
    check_run: Option<RawCheckRun>,
    repository: RawRepository,
    installation: Option<RawInstallation>,
}

#[derive(Debug, Deserialize)]
struct RawCheckRun {
    app: Option<RawApp>,
    check_suite: RawCheckSuite,
}

fn parse_check_run(payload: &[u8]) -> Result<Option<CheckRunEvent>, ParseError> {
    let raw: RawCheckRunPayload = serde_json::from_slice(payload)?;

    let Some(run) = raw.check_run else {
        return Ok(None);
    };

    // The run's own App wins; fall back to the parent suite's App.
    let app_id = match run.app {
        Some(app) if app.id != 0 => AppId(app.id),
        _ => AppId(run.check_suite.app.id),
    };

    Ok(Some(CheckRunEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        head_sha: run.check_suite.head_sha,
        head_branch: run.check_suite.head_branch.unwrap_or_default(),
        app_id,
        installation_id: installation_id(&raw.installation),
        first_pull_request: run
            .check_suite
            .pull_requests
            .first()
            .map(|pr| IssueNumber(pr.number)),
    }))
}

// ─── issue_comment ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIssueCommentPayload {
    action: String,
    issue: RawIssue,
    comment: RawIssueComment,
    repository: RawRepository,
    installation: Option<RawInstallation>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    // Present iff the issue is actually a pull request
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawIssueComment {
    author_association: Option<String>,
}

fn parse_issue_comment(payload: &[u8]) -> Result<IssueCommentEvent, ParseError> {
    let raw: RawIssueCommentPayload = serde_json::from_slice(payload)?;
    Ok(IssueCommentEvent {
        repo: raw.repository.repo_id(),
        action: raw.action,
        issue_number: IssueNumber(raw.issue.number),
        is_pull_request: raw.issue.pull_request.is_some(),
        author_association: raw.comment.author_association.unwrap_or_default(),
        installation_id: installation_id(&raw.installation),
        installation_app_id: AppId(
            raw.installation
                .as_ref()
                .and_then(|i| i.app_id)
                .unwrap_or(0),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(v: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&v).unwrap()
    }

    fn repository() -> serde_json::Value {
        json!({"name": "hello-world", "owner": {"login": "octocat"}})
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let result = parse_webhook("funzone", b"{}").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_webhook("push", b"{not json").is_err());
    }

    #[test]
    fn parse_push() {
        let payload = bytes(json!({
            "ref": "refs/heads/changes",
            "deleted": false,
            "head_commit": {"id": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c"},
            "repository": repository(),
        }));

        let Some(GatewayEvent::Push(push)) = parse_webhook("push", &payload).unwrap() else {
            panic!("expected push event");
        };
        assert_eq!(push.reference, "refs/heads/changes");
        assert_eq!(
            push.head_commit_id.as_deref(),
            Some("0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c")
        );
        assert!(!push.deleted);
        assert_eq!(push.repo.full_name(), "octocat/hello-world");
    }

    #[test]
    fn parse_push_branch_deletion() {
        let payload = bytes(json!({
            "ref": "refs/heads/gone",
            "deleted": true,
            "head_commit": null,
            "repository": repository(),
        }));

        let Some(GatewayEvent::Push(push)) = parse_webhook("push", &payload).unwrap() else {
            panic!("expected push event");
        };
        assert!(push.deleted);
        assert!(push.head_commit_id.is_none());
    }

    #[test]
    fn parse_commit_comment() {
        let payload = bytes(json!({
            "action": "created",
            "comment": {"commit_id": "9049f1265b7d61be4a8904a9a27120d2064dab3b"},
            "repository": repository(),
        }));

        let Some(GatewayEvent::CommitComment(event)) =
            parse_webhook("commit_comment", &payload).unwrap()
        else {
            panic!("expected commit_comment event");
        };
        assert_eq!(event.action, "created");
        assert_eq!(event.commit_id, "9049f1265b7d61be4a8904a9a27120d2064dab3b");
    }

    #[test]
    fn parse_pull_request_fork_and_association() {
        let payload = bytes(json!({
            "action": "opened",
            "pull_request": {
                "number": 1,
                "author_association": "NONE",
                "head": {
                    "sha": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c",
                    "repo": {"fork": true},
                },
            },
            "repository": repository(),
            "installation": {"id": 97},
        }));

        let Some(GatewayEvent::PullRequest(pr)) =
            parse_webhook("pull_request", &payload).unwrap()
        else {
            panic!("expected pull_request event");
        };
        assert_eq!(pr.number, IssueNumber(1));
        assert!(pr.head_repo_fork);
        assert_eq!(pr.author_association, "NONE");
        assert_eq!(pr.installation_id, InstallationId(97));
    }

    #[test]
    fn parse_pull_request_keeps_unsupported_action() {
        let payload = bytes(json!({
            "action": "assigned",
            "pull_request": {
                "number": 5,
                "head": {"sha": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c"},
            },
            "repository": repository(),
        }));

        let Some(GatewayEvent::PullRequest(pr)) =
            parse_webhook("pull_request", &payload).unwrap()
        else {
            panic!("expected pull_request event");
        };
        // Action filtering is policy, not parsing
        assert_eq!(pr.action, "assigned");
    }

    #[test]
    fn parse_release() {
        let payload = bytes(json!({
            "action": "published",
            "release": {"tag_name": "0.0.1"},
            "repository": repository(),
        }));

        let Some(GatewayEvent::Release(release)) = parse_webhook("release", &payload).unwrap()
        else {
            panic!("expected release event");
        };
        assert_eq!(release.tag_name, "0.0.1");
        assert_eq!(release.action, "published");
    }

    #[test]
    fn parse_deployment() {
        let payload = bytes(json!({
            "deployment": {
                "sha": "9049f1265b7d61be4a8904a9a27120d2064dab3b",
                "ref": "master",
            },
            "repository": repository(),
        }));

        let Some(GatewayEvent::Deployment(event)) = parse_webhook("deployment", &payload).unwrap()
        else {
            panic!("expected deployment event");
        };
        assert_eq!(event.sha, "9049f1265b7d61be4a8904a9a27120d2064dab3b");
        assert_eq!(event.reference, "master");
    }

    #[test]
    fn parse_status() {
        let payload = bytes(json!({
            "sha": "9049f1265b7d61be4a8904a9a27120d2064dab3b",
            "repository": repository(),
        }));

        let Some(GatewayEvent::Status(event)) = parse_webhook("status", &payload).unwrap() else {
            panic!("expected status event");
        };
        assert_eq!(event.sha, "9049f1265b7d61be4a8904a9a27120d2064dab3b");
    }

    #[test]
    fn parse_check_suite() {
        let payload = bytes(json!({
            "action": "requested",
            "check_suite": {
                "head_sha": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c",
                "head_branch": "changes",
                "app": {"id": 12},
                "pull_requests": [{"number": 7}, {"number": 8}],
            },
            "repository": repository(),
            "installation": {"id": 34},
        }));

        let Some(GatewayEvent::CheckSuite(suite)) =
            parse_webhook("check_suite", &payload).unwrap()
        else {
            panic!("expected check_suite event");
        };
        assert_eq!(suite.app_id, AppId(12));
        assert_eq!(suite.installation_id, InstallationId(34));
        assert_eq!(suite.head_branch, "changes");
        assert_eq!(suite.first_pull_request, Some(IssueNumber(7)));
    }

    #[test]
    fn parse_check_suite_without_suite_object_is_ignored() {
        let payload = bytes(json!({
            "action": "requested",
            "repository": repository(),
        }));
        assert!(parse_webhook("check_suite", &payload).unwrap().is_none());
    }

    #[test]
    fn parse_check_run_app_falls_back_to_suite() {
        let payload = bytes(json!({
            "action": "created",
            "check_run": {
                "check_suite": {
                    "head_sha": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c",
                    "head_branch": "changes",
                    "app": {"id": 12},
                    "pull_requests": [],
                },
            },
            "repository": repository(),
            "installation": {"id": 34},
        }));

        let Some(GatewayEvent::CheckRun(run)) = parse_webhook("check_run", &payload).unwrap()
        else {
            panic!("expected check_run event");
        };
        assert_eq!(run.app_id, AppId(12));
        assert_eq!(run.first_pull_request, None);
        assert_eq!(run.head_sha, "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c");
    }

    #[test]
    fn parse_check_run_prefers_own_app() {
        let payload = bytes(json!({
            "action": "created",
            "check_run": {
                "app": {"id": 99},
                "check_suite": {
                    "head_sha": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c",
                    "head_branch": "changes",
                    "app": {"id": 12},
                },
            },
            "repository": repository(),
        }));

        let Some(GatewayEvent::CheckRun(run)) = parse_webhook("check_run", &payload).unwrap()
        else {
            panic!("expected check_run event");
        };
        assert_eq!(run.app_id, AppId(99));
    }

    #[test]
    fn parse_issue_comment_on_pull_request() {
        let payload = bytes(json!({
            "action": "edited",
            "issue": {"number": 2, "pull_request": {"url": "..."}},
            "comment": {"author_association": "OWNER"},
            "repository": repository(),
            "installation": {"id": 55, "app_id": 11},
        }));

        let Some(GatewayEvent::IssueComment(event)) =
            parse_webhook("issue_comment", &payload).unwrap()
        else {
            panic!("expected issue_comment event");
        };
        assert!(event.is_pull_request);
        assert_eq!(event.issue_number, IssueNumber(2));
        assert_eq!(event.author_association, "OWNER");
        assert_eq!(event.installation_id, InstallationId(55));
        assert_eq!(event.installation_app_id, AppId(11));
    }

    #[test]
    fn parse_issue_comment_on_plain_issue() {
        let payload = bytes(json!({
            "action": "created",
            "issue": {"number": 9},
            "comment": {"author_association": "NONE"},
            "repository": repository(),
        }));

        let Some(GatewayEvent::IssueComment(event)) =
            parse_webhook("issue_comment", &payload).unwrap()
        else {
            panic!("expected issue_comment event");
        };
        assert!(!event.is_pull_request);
        assert_eq!(event.installation_id, InstallationId(0));
    }

    /// parse → render through the forwarded payload → parse again preserves
    /// the derived coordinates.
    #[test]
    fn reparse_of_forwarded_body_preserves_derivation() {
        let original = json!({
            "action": "requested",
            "check_suite": {
                "head_sha": "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c",
                "head_branch": "changes",
                "app": {"id": 12},
                "pull_requests": [{"number": 7}],
            },
            "repository": repository(),
            "installation": {"id": 34},
        });
        let payload = bytes(original);

        let first = parse_webhook("check_suite", &payload).unwrap().unwrap();

        // Wrap the body the way the dispatcher forwards it, then unwrap and
        // re-parse.
        let wrapped = json!({
            "type": "check_suite",
            "token": "t",
            "tokenExpires": "2020-01-01T00:00:00Z",
            "body": serde_json::from_slice::<serde_json::Value>(&payload).unwrap(),
        });
        let body = serde_json::to_vec(&wrapped["body"]).unwrap();
        let second = parse_webhook("check_suite", &body).unwrap().unwrap();

        assert_eq!(first.repo(), second.repo());
        assert_eq!(first.revision(), second.revision());
        assert_eq!(first.action(), second.action());
    }
}
