//! GitHub App authentication.
//!
//! Authentication is a two-step handshake: sign a short-lived RS256 JWT with
//! the App's RSA private key, then exchange it at the installation-token
//! endpoint for an access token scoped to one installation. The installation
//! token is what every repository operation uses, and it is the credential
//! forwarded to downstream workers (valid for at most an hour; the expiry
//! travels with it).

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AppId, GithubDetails, InstallationId};

use super::client::bearer_client;

/// Lifetime of the signed App JWT.
const JWT_LIFETIME_MINUTES: i64 = 5;

/// Errors from the App authentication handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token minting needs both identities; zero means "not in the payload".
    #[error("app ID and installation ID must both be set (app: {app_id}, installation: {installation_id})")]
    MissingIdentity {
        app_id: AppId,
        installation_id: InstallationId,
    },

    #[error("invalid App private key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("JWT signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    #[error("client construction failed: {0}")]
    Client(#[source] octocrab::Error),

    #[error("installation token exchange failed: {0}")]
    Exchange(#[source] octocrab::Error),
}

/// JWT claims for App authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct AppClaims {
    /// The App ID, as a string.
    iss: String,
    iat: i64,
    exp: i64,
}

fn build_claims(app_id: AppId, now: DateTime<Utc>) -> AppClaims {
    AppClaims {
        iss: app_id.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::minutes(JWT_LIFETIME_MINUTES)).timestamp(),
    }
}

/// Signs an RS256 JWT asserting the App's identity.
///
/// `key_pem` is the ASCII-armored RSA private key downloaded from the App's
/// settings page; it lives for the process lifetime.
pub fn sign_app_jwt(app_id: AppId, key_pem: &[u8]) -> Result<String, AuthError> {
    let key = EncodingKey::from_rsa_pem(key_pem).map_err(AuthError::InvalidKey)?;
    let claims = build_claims(app_id, Utc::now());
    encode(&Header::new(Algorithm::RS256), &claims, &key).map_err(AuthError::Signing)
}

/// An installation access token and its expiry.
#[derive(Clone, Deserialize)]
pub struct MintedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// Keep the token out of debug output.
impl std::fmt::Debug for MintedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MintedToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Mints an installation access token for `(app_id, installation_id)`.
///
/// Signs a JWT, builds a bearer client against the project's GitHub endpoint,
/// and calls `POST /app/installations/{id}/access_tokens`.
pub async fn installation_token(
    app_id: AppId,
    installation_id: InstallationId,
    github: &GithubDetails,
    key_pem: &[u8],
) -> Result<MintedToken, AuthError> {
    if app_id.is_unset() || installation_id.is_unset() {
        return Err(AuthError::MissingIdentity {
            app_id,
            installation_id,
        });
    }

    let jwt = sign_app_jwt(app_id, key_pem)?;
    let client = bearer_client(&jwt, &github.base_url)?;

    let route = access_tokens_route(installation_id);
    client
        .post(&route, None::<&()>)
        .await
        .map_err(AuthError::Exchange)
}

fn access_tokens_route(installation_id: InstallationId) -> String {
    format!("/app/installations/{}/access_tokens", installation_id.0)
}
