//! Handler for flow-through events.
//!
//! Most event kinds need no enrichment: the payload is forwarded verbatim and
//! the revision is derived directly from the event. Pull requests get two
//! extra treatments here: the admission policy, and (when enabled) the
//! check-suite adapter.

use tracing::warn;

use crate::types::{BuildOptions, Project};

use super::super::check_suite::{CHECK_SUITE_ACTIONS, CheckSuiteError, pr_to_check_suite};
use super::super::events::{GatewayEvent, PullRequestEvent};
use super::super::policy::is_allowed_pull_request;
use super::{HookError, HookHandler, HookResponse};

impl HookHandler {
    /// Handles events that flow through without payload enrichment.
    pub(super) async fn handle_event(
        &self,
        event: GatewayEvent,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<HookResponse, HookError> {
        // Policy gates come before project validation: a rejected delivery
        // is answered 200 regardless of its signature.
        match &event {
            GatewayEvent::Push(push) if push.deleted => {
                return Ok(HookResponse::Skipped("build skipped on branch deletion"));
            }
            GatewayEvent::PullRequest(pr)
                if !is_allowed_pull_request(pr, &self.allowed_authors) =>
            {
                return Ok(HookResponse::Skipped("build skipped"));
            }
            _ => {}
        }

        let project = self.validated_project(event.repo(), signature, body).await?;

        let mut build_opts = BuildOptions::default();
        if let GatewayEvent::PullRequest(pr) = &event {
            if self.check_suite_eligible(pr) {
                match pr_to_check_suite(pr, &project, self.opts.app_id, &self.key_pem).await {
                    Ok(()) if self.opts.check_suite_short_circuit => {
                        return Ok(HookResponse::Complete);
                    }
                    Ok(()) => {}
                    Err(CheckSuiteError::Auth(err)) => {
                        warn!(error = %err, "failed to negotiate a token for check suite");
                        return Err(HookError::AuthFailure);
                    }
                    Err(err) => {
                        // The primary path (building the event) still
                        // succeeds; the adapter's trouble is logged only.
                        warn!(error = %err, "check suite adaptation failed");
                    }
                }
            }
            build_opts = self.pr_build_options(pr, &project).await;
        }

        let revision = event.revision();
        self.schedule_build(
            event.kind(),
            event.action(),
            &revision,
            body,
            &project,
            &build_opts,
        )
        .await;

        Ok(HookResponse::Complete)
    }

    fn check_suite_eligible(&self, pr: &PullRequestEvent) -> bool {
        self.opts.check_suite_on_pr && CHECK_SUITE_ACTIONS.contains(&pr.action.as_str())
    }

    /// Build options for a pull request: a quietly-minted installation token
    /// plus the PR number, so failures can be reported back.
    async fn pr_build_options(&self, pr: &PullRequestEvent, project: &Project) -> BuildOptions {
        BuildOptions {
            token: self
                .quiet_token(self.opts.app_id, pr.installation_id, project)
                .await,
            issue_number: Some(pr.number),
        }
    }
}
