//! Repository operations the gateway performs as an installation.
//!
//! octocrab models pull requests and issue comments natively; the check-suite
//! endpoints go through its raw route methods with local request/response
//! structs, since the Checks API surface octocrab exposes is run-oriented.

use serde::{Deserialize, Serialize};

use crate::types::{AppId, IssueNumber, RepoId};

use super::error::GitHubApiError;

/// The fields of a check suite the adapter consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckSuiteSummary {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
struct CheckSuiteList {
    #[serde(default)]
    total_count: u64,
    #[serde(default)]
    check_suites: Vec<CheckSuiteSummary>,
}

/// Head coordinates of a pull request.
#[derive(Debug, Clone)]
pub struct PullRequestHead {
    pub number: IssueNumber,
    pub head_sha: String,
}

/// Creates a check suite for the given head.
///
/// GitHub responds 422 when a suite already exists for the SHA; callers
/// detect that case via [`GitHubApiError::is_unprocessable`].
pub async fn create_check_suite(
    client: &octocrab::Octocrab,
    repo: &RepoId,
    head_sha: &str,
    head_branch: &str,
) -> Result<CheckSuiteSummary, GitHubApiError> {
    #[derive(Serialize)]
    struct CreateRequest<'a> {
        head_sha: &'a str,
        #[serde(skip_serializing_if = "str::is_empty")]
        head_branch: &'a str,
    }

    let route = format!("/repos/{}/{}/check-suites", repo.owner, repo.name);
    client
        .post(
            &route,
            Some(&CreateRequest {
                head_sha,
                head_branch,
            }),
        )
        .await
        .map_err(GitHubApiError::from_octocrab)
}

/// Re-requests an existing check suite.
///
/// Creating a suite does not fire a `check_suite:requested` delivery; only a
/// re-request does, which is why the adapter always follows creation with
/// this call.
pub async fn rerequest_check_suite(
    client: &octocrab::Octocrab,
    repo: &RepoId,
    suite_id: u64,
) -> Result<(), GitHubApiError> {
    let route = format!(
        "/repos/{}/{}/check-suites/{}/rerequest",
        repo.owner, repo.name, suite_id
    );

    // The endpoint returns 201 with an empty body, so go through the raw
    // request path instead of the JSON-decoding helpers.
    let response = client
        ._post(route, None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(GitHubApiError::from_status(
            status.as_u16(),
            format!("re-requesting check suite {suite_id}"),
        ))
    }
}

/// Lists check suites for a commit, filtered to the given App.
pub async fn list_check_suites_for_ref(
    client: &octocrab::Octocrab,
    repo: &RepoId,
    sha: &str,
    app_id: AppId,
) -> Result<Vec<CheckSuiteSummary>, GitHubApiError> {
    let route = format!(
        "/repos/{}/{}/commits/{}/check-suites?app_id={}",
        repo.owner, repo.name, sha, app_id.0
    );

    let list: CheckSuiteList = client
        .get(&route, None::<&()>)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    debug_assert!(list.total_count as usize >= list.check_suites.len());
    Ok(list.check_suites)
}

/// Fetches a pull request's head coordinates.
pub async fn get_pull_request(
    client: &octocrab::Octocrab,
    repo: &RepoId,
    number: IssueNumber,
) -> Result<PullRequestHead, GitHubApiError> {
    let pull = client
        .pulls(&repo.owner, &repo.name)
        .get(number.0)
        .await
        .map_err(GitHubApiError::from_octocrab)?;

    Ok(PullRequestHead {
        number: IssueNumber(pull.number),
        head_sha: pull.head.sha,
    })
}

/// Posts a comment on an issue or pull request.
pub async fn create_issue_comment(
    client: &octocrab::Octocrab,
    repo: &RepoId,
    number: IssueNumber,
    body: &str,
) -> Result<(), GitHubApiError> {
    client
        .issues(&repo.owner, &repo.name)
        .create_comment(number.0, body)
        .await
        .map_err(GitHubApiError::from_octocrab)?;
    Ok(())
}
