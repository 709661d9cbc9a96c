//! The webhook dispatcher.
//!
//! [`HookHandler`] is the core of the gateway: it routes a delivery by its
//! `X-GitHub-Event` header to a per-kind handler, validates the project and
//! signature, applies policy and the emission filter, and schedules builds.
//!
//! Handlers hold no request state; one handler instance serves every request
//! concurrently. Everything mutable lives behind the build store and the
//! reporter's own synchronization.

mod check;
mod event;
mod issue_comment;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::github::auth::installation_token;
use crate::reporter::BuildReporter;
use crate::store::BuildStore;
use crate::types::{AppId, Build, BuildOptions, InstallationId, Project, RepoId, Revision};

use super::events::GatewayEvent;
use super::filter::EmissionFilter;
use super::parser::parse_webhook;
use super::policy::AuthorAllowlist;
use super::signature::verify_signature;

pub use issue_comment::{CommentEnricher, EnrichError, EnrichedComment, GithubEnricher};

/// Startup-immutable gateway behavior switches.
#[derive(Debug, Clone, Default)]
pub struct GatewayOptions {
    /// This gateway's GitHub App ID. Check deliveries for other Apps are
    /// dropped; zero disables every App-authenticated path.
    pub app_id: AppId,

    /// Trigger a check suite for eligible pull requests.
    pub check_suite_on_pr: bool,

    /// Stop processing a PR delivery once a check suite has been triggered
    /// (historically the handler fell through and built the `pull_request`
    /// event anyway; that remains the default).
    pub check_suite_short_circuit: bool,

    /// Fallback webhook secret for projects that carry none.
    pub default_shared_secret: String,

    /// Register eligible builds with the failure reporter.
    pub report_build_failures: bool,
}

/// Successful dispatch outcomes. All of these map to HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookResponse {
    /// The delivery was accepted and builds were scheduled.
    Complete,

    /// Answer to GitHub's `ping`.
    Pong,

    /// Unrecognized event kind.
    Ignored,

    /// Policy rejected the delivery; the body says why.
    Skipped(&'static str),

    /// A check delivery destined for a different App. Dropped without
    /// comment.
    Dropped,
}

impl IntoResponse for HookResponse {
    fn into_response(self) -> Response {
        match self {
            HookResponse::Complete => Json(json!({"status": "Complete"})).into_response(),
            HookResponse::Pong => Json(json!({"message": "OK"})).into_response(),
            HookResponse::Ignored => Json(json!({"message": "Ignored"})).into_response(),
            HookResponse::Skipped(reason) => Json(json!({"status": reason})).into_response(),
            HookResponse::Dropped => StatusCode::OK.into_response(),
        }
    }
}

/// Dispatch failures, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum HookError {
    /// Unreadable or unparseable body.
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// The repository is not registered as a project.
    #[error("project not found")]
    ProjectNotFound,

    /// Neither the project nor the gateway has a shared secret.
    #[error("no secret is configured for this repo")]
    NoSecret,

    /// Missing or mismatched `X-Hub-Signature`.
    #[error("signature validation failed")]
    SignatureInvalid,

    /// JWT signing, client construction, or token exchange failed.
    #[error("auth failed")]
    AuthFailure,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            HookError::MalformedBody(_) => (StatusCode::BAD_REQUEST, "Malformed body"),
            HookError::ProjectNotFound => (StatusCode::BAD_REQUEST, "project not found"),
            HookError::NoSecret => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No secret is configured for this repo.",
            ),
            HookError::SignatureInvalid => (StatusCode::FORBIDDEN, "malformed signature"),
            HookError::AuthFailure => (StatusCode::FORBIDDEN, "Auth Failed"),
            HookError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
        };
        (status, Json(json!({"status": message}))).into_response()
    }
}

/// Routes webhook deliveries and schedules builds.
pub struct HookHandler {
    store: Arc<dyn BuildStore>,
    reporter: Option<Arc<BuildReporter>>,
    enricher: Arc<dyn CommentEnricher>,
    allowed_authors: AuthorAllowlist,
    filter: EmissionFilter,

    /// ASCII-armored RSA private key of the App; lives for the process
    /// lifetime.
    key_pem: Vec<u8>,

    opts: GatewayOptions,
}

impl HookHandler {
    pub fn new(store: Arc<dyn BuildStore>, key_pem: Vec<u8>, opts: GatewayOptions) -> Self {
        let enricher = Arc::new(GithubEnricher::new(opts.app_id, key_pem.clone()));
        HookHandler {
            store,
            reporter: None,
            enricher,
            allowed_authors: AuthorAllowlist::default(),
            filter: EmissionFilter::all(),
            key_pem,
            opts,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<BuildReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn with_allowed_authors(mut self, allowed_authors: AuthorAllowlist) -> Self {
        self.allowed_authors = allowed_authors;
        self
    }

    pub fn with_filter(mut self, filter: EmissionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Replaces the issue-comment enricher (test seam).
    pub fn with_enricher(mut self, enricher: Arc<dyn CommentEnricher>) -> Self {
        self.enricher = enricher;
        self
    }

    /// Routes a delivery to its handler.
    ///
    /// `signature` is the raw `X-Hub-Signature` header, when present.
    pub async fn handle(
        &self,
        event_type: &str,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<HookResponse, HookError> {
        if event_type == "ping" {
            info!("received ping from GitHub");
            return Ok(HookResponse::Pong);
        }

        let event = match parse_webhook(event_type, body) {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!(event_type, "ignoring unsupported event");
                return Ok(HookResponse::Ignored);
            }
            Err(err) => {
                warn!(event_type, error = %err, "failed to parse webhook body");
                return Err(HookError::MalformedBody(err.to_string()));
            }
        };

        match event {
            GatewayEvent::CheckSuite(_) | GatewayEvent::CheckRun(_) => {
                self.handle_check(event, signature, body).await
            }
            GatewayEvent::IssueComment(ice) => {
                self.handle_issue_comment(ice, signature, body).await
            }
            other => self.handle_event(other, signature, body).await,
        }
    }

    /// Resolves the project for a repository and verifies the delivery
    /// signature against its shared secret.
    async fn validated_project(
        &self,
        repo: &RepoId,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<Project, HookError> {
        let name = repo.full_name();
        let project = self.store.get_project(&name).await.map_err(|err| {
            warn!(repo = %name, error = %err, "project lookup failed");
            HookError::ProjectNotFound
        })?;

        let secret = if project.shared_secret.is_empty() {
            &self.opts.default_shared_secret
        } else {
            &project.shared_secret
        };
        if secret.is_empty() {
            return Err(HookError::NoSecret);
        }

        let signature = signature.ok_or(HookError::SignatureInvalid)?;
        if !verify_signature(body, signature, secret.as_bytes()) {
            warn!(repo = %name, "webhook signature mismatch");
            return Err(HookError::SignatureInvalid);
        }

        Ok(project)
    }

    /// Schedules one build for the event type and, when the event carries an
    /// action, a second one for `type:action`, in that order.
    async fn schedule_build(
        &self,
        event_type: &str,
        action: Option<&str>,
        revision: &Revision,
        payload: &[u8],
        project: &Project,
        build_opts: &BuildOptions,
    ) {
        self.build(event_type, revision, payload, project, build_opts)
            .await;
        if let Some(action) = action.filter(|a| !a.is_empty()) {
            let qualified = format!("{event_type}:{action}");
            self.build(&qualified, revision, payload, project, build_opts)
                .await;
        }
    }

    /// Creates one build, subject to the emission filter, and registers it
    /// with the reporter when eligible.
    async fn build(
        &self,
        build_type: &str,
        revision: &Revision,
        payload: &[u8],
        project: &Project,
        build_opts: &BuildOptions,
    ) {
        if !self.filter.should_emit(build_type) {
            info!(build_type, "emission filter suppressed build");
            return;
        }

        let build = Build::new(
            project.id.clone(),
            build_type,
            revision.clone(),
            payload.to_vec(),
        );

        match self.store.create_build(build).await {
            Ok(stored) => {
                if self.opts.report_build_failures && build_opts.reportable() {
                    if let (Some(reporter), Some(issue)) =
                        (&self.reporter, build_opts.issue_number)
                    {
                        reporter.add(&stored, issue, &build_opts.token);
                    }
                }
            }
            Err(err) => {
                // GitHub has acknowledged the delivery by now; all we can do
                // is log and rely on redelivery.
                warn!(build_type, error = %err, "failed to create build");
            }
        }
    }

    /// Mints an installation token, degrading every failure to "no token".
    ///
    /// Used for build options, where a token is an enhancement (it enables
    /// failure reporting and downstream API use) rather than a requirement.
    async fn quiet_token(
        &self,
        app_id: AppId,
        installation_id: InstallationId,
        project: &Project,
    ) -> String {
        match installation_token(app_id, installation_id, &project.github, &self.key_pem).await {
            Ok(minted) => minted.token,
            Err(err) => {
                info!(error = %err, "no installation token for build options");
                String::new()
            }
        }
    }

    /// The configured App id, unless the payload carried a more specific one.
    fn effective_app_id(&self, payload_app_id: AppId) -> AppId {
        if payload_app_id.is_unset() {
            self.opts.app_id
        } else {
            payload_app_id
        }
    }
}
