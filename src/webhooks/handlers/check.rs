//! Handler for Checks API events.
//!
//! Check deliveries need more processing than the flow-through kinds: the
//! payload names the App it was destined for (deliveries for other Apps are
//! dropped), and the forwarded payload is enriched with an installation token
//! so downstream workers can act on the check.

use tracing::{info, warn};

use crate::github::auth::installation_token;
use crate::types::{AppId, BuildOptions, InstallationId, IssueNumber, RepoId, Revision};

use super::super::events::GatewayEvent;
use super::super::payload::ForwardedPayload;
use super::{HookError, HookHandler, HookResponse};

/// The per-kind fields the check handler works with.
struct CheckDelivery {
    kind: &'static str,
    repo: RepoId,
    action: String,
    revision: Revision,
    app_id: AppId,
    installation_id: InstallationId,
    first_pull_request: Option<IssueNumber>,
}

impl HookHandler {
    /// Handles `check_suite` and `check_run` deliveries.
    pub(super) async fn handle_check(
        &self,
        event: GatewayEvent,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<HookResponse, HookError> {
        let delivery = match &event {
            GatewayEvent::CheckSuite(e) => CheckDelivery {
                kind: "check_suite",
                repo: e.repo.clone(),
                action: e.action.clone(),
                revision: event.revision(),
                app_id: e.app_id,
                installation_id: e.installation_id,
                first_pull_request: e.first_pull_request,
            },
            GatewayEvent::CheckRun(e) => CheckDelivery {
                kind: "check_run",
                repo: e.repo.clone(),
                action: e.action.clone(),
                revision: event.revision(),
                app_id: e.app_id,
                installation_id: e.installation_id,
                first_pull_request: e.first_pull_request,
            },
            // `handle` only routes check events here.
            _ => return Ok(HookResponse::Ignored),
        };

        if delivery.app_id != self.opts.app_id {
            info!(
                payload_app = %delivery.app_id,
                our_app = %self.opts.app_id,
                "check delivery destined for another app"
            );
            return Ok(HookResponse::Dropped);
        }

        let project = self
            .validated_project(&delivery.repo, signature, body)
            .await?;

        let token = installation_token(
            delivery.app_id,
            delivery.installation_id,
            &project.github,
            &self.key_pem,
        )
        .await
        .map_err(|err| {
            warn!(error = %err, "failed to negotiate a token");
            HookError::AuthFailure
        })?;

        let payload = self
            .check_payload(&delivery, &token.token, token.expires_at, body)
            .map_err(|err| HookError::Internal(err))?;

        let build_opts = BuildOptions {
            token: token.token,
            issue_number: delivery.first_pull_request,
        };

        self.schedule_build(
            delivery.kind,
            Some(&delivery.action),
            &delivery.revision,
            &payload,
            &project,
            &build_opts,
        )
        .await;

        Ok(HookResponse::Complete)
    }

    fn check_payload(
        &self,
        delivery: &CheckDelivery,
        token: &str,
        token_expires: chrono::DateTime<chrono::Utc>,
        body: &[u8],
    ) -> Result<Vec<u8>, String> {
        let mut envelope = ForwardedPayload::new(delivery.kind);
        envelope.token = token.to_string();
        envelope.token_expires = Some(token_expires);
        envelope.app_id = delivery.app_id;
        envelope.installation_id = delivery.installation_id;
        envelope
            .marshal_with_body(body)
            .map_err(|err| format!("JSON encoding error: {err}"))
    }
}
