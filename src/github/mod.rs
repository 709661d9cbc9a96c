//! GitHub App authentication and API operations.
//!
//! The gateway talks to GitHub in two roles: as the App itself (bearer JWT,
//! used only to mint installation tokens) and as an installation of the App
//! (installation token, used for every repository operation).

pub mod auth;
pub mod checks;
pub mod client;
pub mod error;

pub use auth::{AuthError, MintedToken, installation_token, sign_app_jwt};
pub use client::{bearer_client, installation_client};
pub use error::{GitHubApiError, GitHubErrorKind};
