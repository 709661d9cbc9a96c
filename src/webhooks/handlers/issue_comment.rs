//! Handler for `issue_comment` events, including PR enrichment.
//!
//! Comments on a pull request's conversation tab arrive as `issue_comment`
//! deliveries that know nothing about the PR's head. For comments from
//! allow-listed authors, the enricher fetches the PR and forwards a payload
//! carrying the installation token, its expiry, and the head coordinates,
//! enough for downstream workers to (re-)trigger checks on the PR.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::github::auth::{AuthError, installation_token};
use crate::github::checks::get_pull_request;
use crate::github::error::GitHubApiError;
use crate::github::installation_client;
use crate::types::{AppId, BuildOptions, Project, Revision};

use super::super::events::{IssueCommentEvent, pull_request_ref};
use super::super::payload::{ForwardedPayload, PayloadError};
use super::{HookError, HookHandler, HookResponse};

/// Comment actions that trigger enrichment.
const ENRICHED_ACTIONS: &[&str] = &["created", "edited"];

/// Default ref for builds whose event is unrelated to any branch or PR.
const DEFAULT_REF: &str = "refs/heads/master";

/// Result of enriching a PR-attached comment.
#[derive(Debug, Clone)]
pub struct EnrichedComment {
    /// The PR's head coordinates.
    pub revision: Revision,

    /// The marshalled [`ForwardedPayload`] to hand downstream.
    pub payload: Vec<u8>,
}

/// Enrichment failures, split by the response they map onto.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("auth failed: {0}")]
    Auth(#[from] AuthError),

    #[error("failed to fetch pull request for corresponding issue comment: {0}")]
    PullRequestFetch(#[source] GitHubApiError),

    #[error(transparent)]
    Encode(#[from] PayloadError),
}

/// Fetches PR coordinates and produces the enriched payload.
///
/// A trait so tests can substitute a canned enrichment instead of reaching
/// GitHub.
#[async_trait]
pub trait CommentEnricher: Send + Sync {
    async fn enrich(
        &self,
        event: &IssueCommentEvent,
        project: &Project,
        body: &[u8],
    ) -> Result<EnrichedComment, EnrichError>;
}

/// Production enricher: mints a token and fetches the PR from GitHub.
pub struct GithubEnricher {
    app_id: AppId,
    key_pem: Vec<u8>,
}

impl GithubEnricher {
    pub fn new(app_id: AppId, key_pem: Vec<u8>) -> Self {
        GithubEnricher { app_id, key_pem }
    }
}

#[async_trait]
impl CommentEnricher for GithubEnricher {
    async fn enrich(
        &self,
        event: &IssueCommentEvent,
        project: &Project,
        body: &[u8],
    ) -> Result<EnrichedComment, EnrichError> {
        // The payload's installation may name its own App; fall back to ours.
        let app_id = if event.installation_app_id.is_unset() {
            self.app_id
        } else {
            event.installation_app_id
        };

        let token =
            installation_token(app_id, event.installation_id, &project.github, &self.key_pem)
                .await?;
        let client = installation_client(&token.token, &project.github.base_url)?;

        let pull = get_pull_request(&client, &event.repo, event.issue_number)
            .await
            .map_err(EnrichError::PullRequestFetch)?;

        let revision = Revision::new(pull.head_sha, pull_request_ref(pull.number));

        let mut envelope = ForwardedPayload::new("issue_comment");
        envelope.token = token.token;
        envelope.token_expires = Some(token.expires_at);
        envelope.commit = Some(revision.commit.clone());
        envelope.branch = Some(revision.reference.clone());
        envelope.app_id = app_id;
        envelope.installation_id = event.installation_id;
        let payload = envelope.marshal_with_body(body)?;

        Ok(EnrichedComment { revision, payload })
    }
}

impl HookHandler {
    /// Handles an `issue_comment` delivery.
    pub(super) async fn handle_issue_comment(
        &self,
        event: IssueCommentEvent,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<HookResponse, HookError> {
        let project = self.validated_project(&event.repo, signature, body).await?;

        let mut revision = Revision::default();
        let mut enriched_payload: Option<Vec<u8>> = None;

        if ENRICHED_ACTIONS.contains(&event.action.as_str()) && event.is_pull_request {
            if self.allowed_authors.is_allowed(&event.author_association) {
                let enriched = self
                    .enricher
                    .enrich(&event, &project, body)
                    .await
                    .map_err(|err| match err {
                        EnrichError::Auth(err) => {
                            warn!(error = %err, "failed to negotiate a token");
                            HookError::AuthFailure
                        }
                        EnrichError::PullRequestFetch(err) => {
                            warn!(error = %err, "failed to fetch pull request");
                            HookError::Internal(
                                "failed to fetch pull request for corresponding issue comment"
                                    .to_string(),
                            )
                        }
                        EnrichError::Encode(err) => {
                            HookError::Internal(format!("JSON encoding error: {err}"))
                        }
                    })?;
                revision = enriched.revision;
                enriched_payload = Some(enriched.payload);
            } else {
                info!(
                    association = %event.author_association,
                    "not fetching corresponding pull request for disallowed author"
                );
            }
        }

        // An issue comment unrelated to any PR still builds; default the ref
        // so workers can instantiate.
        if revision.reference.is_empty() {
            revision.reference = DEFAULT_REF.to_string();
        }

        let build_opts = self
            .ice_build_options(&event, &project, enriched_payload.as_deref())
            .await;

        let payload = enriched_payload.as_deref().unwrap_or(body);
        self.schedule_build(
            "issue_comment",
            Some(&event.action),
            &revision,
            payload,
            &project,
            &build_opts,
        )
        .await;

        Ok(HookResponse::Complete)
    }

    /// Build options for an issue comment.
    ///
    /// When the enricher already minted a token into the forwarded payload,
    /// reuse it; otherwise quietly mint one just for registration.
    async fn ice_build_options(
        &self,
        event: &IssueCommentEvent,
        project: &Project,
        enriched_payload: Option<&[u8]>,
    ) -> BuildOptions {
        let token = match enriched_payload {
            Some(payload) => ForwardedPayload::from_marshalled(payload)
                .map(|envelope| envelope.token)
                .unwrap_or_default(),
            None => {
                let app_id = self.effective_app_id(event.installation_app_id);
                self.quiet_token(app_id, event.installation_id, project)
                    .await
            }
        };

        BuildOptions {
            token,
            issue_number: Some(event.issue_number),
        }
    }
}
