//! The payload forwarded to downstream build workers.
//!
//! For events the gateway enriches (check events and PR-attached issue
//! comments), the original GitHub body is wrapped in an envelope carrying the
//! installation token, its expiry, and, when known, the commit/branch the
//! worker should act on. The body is re-parsed into a generic JSON object so
//! the wrapper fields merge cleanly with whatever GitHub sent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AppId, InstallationId};

/// Error produced when the original body cannot be re-marshalled.
#[derive(Debug, Error)]
#[error("failed to re-encode webhook body: {0}")]
pub struct PayloadError(#[from] serde_json::Error);

/// The envelope around a forwarded GitHub payload.
///
/// `app_id` and `installation_id` are gateway-internal routing data and are
/// never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardedPayload {
    #[serde(rename = "type")]
    pub event_type: String,

    /// Installation token the worker may use until `token_expires`.
    #[serde(default)]
    pub token: String,

    #[serde(rename = "tokenExpires", default)]
    pub token_expires: Option<DateTime<Utc>>,

    /// Commit the event resolved to, when enrichment established one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// Branch or ref the event resolved to, when enrichment established one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// The original GitHub payload, verbatim.
    pub body: serde_json::Value,

    #[serde(skip)]
    pub app_id: AppId,

    #[serde(skip)]
    pub installation_id: InstallationId,
}

impl ForwardedPayload {
    /// Creates an envelope for the given event type with no credentials.
    pub fn new(event_type: impl Into<String>) -> Self {
        ForwardedPayload {
            event_type: event_type.into(),
            token: String::new(),
            token_expires: None,
            commit: None,
            branch: None,
            body: serde_json::Value::Null,
            app_id: AppId(0),
            installation_id: InstallationId(0),
        }
    }

    /// Serializes the envelope with `body` replaced by the re-parsed original
    /// payload.
    ///
    /// Re-parsing (rather than embedding the raw bytes as a string) keeps the
    /// original object structure so workers can address fields directly.
    pub fn marshal_with_body(mut self, original: &[u8]) -> Result<Vec<u8>, PayloadError> {
        self.body = serde_json::from_slice(original)?;
        Ok(serde_json::to_vec(&self)?)
    }

    /// Attempts to read a previously marshalled envelope, e.g. to reuse the
    /// token embedded by the enricher. Returns `None` when the bytes are not
    /// an envelope.
    pub fn from_marshalled(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }
}
