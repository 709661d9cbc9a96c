//! Construction of authenticated octocrab clients.
//!
//! Two flavors exist, mirroring GitHub's two authentication roles:
//!
//! - **bearer**: `Authorization: Bearer <jwt>`: the App acting as itself.
//!   Only the installation-token endpoint accepts this.
//! - **installation**: `Authorization: token <installation token>`: the App
//!   acting as an installation. All repository operations use this. Note the
//!   token type string differs from the bearer form.
//!
//! Both honor an optional GitHub Enterprise base URL; when empty, the client
//! targets the public API endpoint.

use http::header::AUTHORIZATION;
use octocrab::Octocrab;

use super::auth::AuthError;

/// Builds a client authenticated with the App's signed JWT.
pub fn bearer_client(jwt: &str, base_url: &str) -> Result<Octocrab, AuthError> {
    build(format!("Bearer {jwt}"), base_url)
}

/// Builds a client authenticated with an installation access token.
pub fn installation_client(token: &str, base_url: &str) -> Result<Octocrab, AuthError> {
    build(format!("token {token}"), base_url)
}

fn build(authorization: String, base_url: &str) -> Result<Octocrab, AuthError> {
    let mut builder = Octocrab::builder().add_header(AUTHORIZATION, authorization);
    if !base_url.is_empty() {
        builder = builder.base_uri(base_url).map_err(AuthError::Client)?;
    }
    builder.build().map_err(AuthError::Client)
}
