//! Pull-request → check-suite adaptation.
//!
//! Check suite webhook events normally fire only on `push`. This adapter
//! takes an eligible pull request and triggers a check suite for its head, so
//! check-based CI runs for PRs too.
//!
//! The Checks API makes this a three-step dance:
//!
//! 1. Mint an installation token (suites must be created *as the App*).
//! 2. Create a check suite for the PR head. Merely creating a suite does not
//!    fire a `check_suite:requested` delivery, so on success the new suite is
//!    immediately re-requested.
//! 3. If creation fails with HTTP 422 the suite already exists; list suites
//!    for the head SHA filtered to our App and re-request the first.

use thiserror::Error;
use tracing::{info, warn};

use crate::github::auth::AuthError;
use crate::github::checks::{
    create_check_suite, list_check_suites_for_ref, rerequest_check_suite,
};
use crate::github::error::GitHubApiError;
use crate::github::{installation_client, installation_token};
use crate::types::{AppId, Project};

use super::events::{PullRequestEvent, pull_request_ref};

/// PR actions that indicate code may have changed and needs checking.
pub const CHECK_SUITE_ACTIONS: &[&str] = &["opened", "synchronize", "reopened"];

/// Failures of the adapter path.
///
/// Only `Auth` fails the surrounding request; everything else is logged by
/// the caller and the delivery proceeds to build scheduling.
#[derive(Debug, Error)]
pub enum CheckSuiteError {
    #[error("auth failed")]
    Auth(#[from] AuthError),

    #[error("could not create check suite")]
    Create(#[source] GitHubApiError),

    #[error("could not re-request check suite")]
    Rerequest(#[source] GitHubApiError),
}

/// Creates (or re-requests) a check suite for the PR's head.
pub async fn pr_to_check_suite(
    event: &PullRequestEvent,
    project: &Project,
    app_id: AppId,
    key_pem: &[u8],
) -> Result<(), CheckSuiteError> {
    let sha = &event.head_sha;
    let reference = pull_request_ref(event.number);

    let token = installation_token(app_id, event.installation_id, &project.github, key_pem).await?;
    let client = installation_client(&token.token, &project.github.base_url)?;

    info!(repo = %event.repo, sha = %sha, "requesting check suite run");

    match create_check_suite(&client, &event.repo, sha, &reference).await {
        Ok(suite) => {
            info!(suite_id = suite.id, reference = %reference, "created check suite, triggering rerequest");
            rerequest_check_suite(&client, &event.repo, suite.id)
                .await
                .map_err(CheckSuiteError::Rerequest)
        }
        Err(err) if err.is_unprocessable() => {
            // 422: a suite already exists for this SHA. Re-run the existing
            // one instead. Failures on this path are not worth failing the
            // delivery over.
            info!(repo = %event.repo, sha = %sha, "check suite exists, rerunning the last suite");
            match list_check_suites_for_ref(&client, &event.repo, sha, app_id).await {
                Ok(suites) => match suites.first() {
                    Some(suite) => {
                        if let Err(err) =
                            rerequest_check_suite(&client, &event.repo, suite.id).await
                        {
                            warn!(suite_id = suite.id, error = %err, "error rerunning suite");
                        }
                        Ok(())
                    }
                    None => {
                        warn!(sha = %sha, "no existing check suites found for ref");
                        Ok(())
                    }
                },
                Err(err) => {
                    warn!(error = %err, "error fetching check suites");
                    Ok(())
                }
            }
        }
        Err(err) => Err(CheckSuiteError::Create(err)),
    }
}
