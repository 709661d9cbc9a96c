//! Newtype wrappers for domain identifiers.
//!
//! These types prevent accidental mixing of different ID types (e.g., using an
//! installation ID where an app ID is expected) and make the code more
//! self-documenting.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fmt;
use thiserror::Error;

/// Error returned when parsing an invalid `owner/name` repository string.
#[derive(Debug, Clone, Error)]
#[error("invalid repository name {0:?}: expected \"owner/name\"")]
pub struct InvalidRepoName(pub String);

/// A GitHub App ID, assigned by GitHub when the App is registered.
///
/// Zero means "not configured" and disables every App-authenticated path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(pub u64);

impl AppId {
    /// Returns true if no App ID has been configured.
    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AppId {
    fn from(n: u64) -> Self {
        AppId(n)
    }
}

/// A GitHub App installation ID, scoping the App to one account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallationId(pub u64);

impl InstallationId {
    /// Returns true if the payload carried no installation.
    pub fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for InstallationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for InstallationId {
    fn from(n: u64) -> Self {
        InstallationId(n)
    }
}

/// An issue or pull-request number within a repository.
///
/// This is the value the issues/comments API addresses, not GitHub's opaque
/// database id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueNumber(pub u64);

impl fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for IssueNumber {
    fn from(n: u64) -> Self {
        IssueNumber(n)
    }
}

/// A build identifier, assigned by the build store when the build is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub String);

impl BuildId {
    pub fn new(s: impl Into<String>) -> Self {
        BuildId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the store has not assigned an id yet.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A project identifier in the build store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(s: impl Into<String>) -> Self {
        ProjectId(s.into())
    }

    /// Derives the canonical project id for a repository full name.
    ///
    /// The build store names projects `brigade-<hash of "owner/name">` so
    /// that arbitrary repository names map onto valid resource names.
    pub fn for_repo_name(name: &str) -> Self {
        let digest = Sha1::digest(name.as_bytes());
        ProjectId(format!("brigade-{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A repository identifier (owner/name pair).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        RepoId {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses an `owner/name` string as delivered in webhook payloads.
    pub fn parse(full_name: &str) -> Result<Self, InvalidRepoName> {
        match full_name.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(RepoId::new(owner, name))
            }
            _ => Err(InvalidRepoName(full_name.to_string())),
        }
    }

    /// Returns the `owner/name` form used for project lookup.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_id_parse_valid() {
        let repo = RepoId::parse("octocat/hello-world").unwrap();
        assert_eq!(repo.owner, "octocat");
        assert_eq!(repo.name, "hello-world");
        assert_eq!(repo.full_name(), "octocat/hello-world");
    }

    #[test]
    fn repo_id_parse_rejects_malformed() {
        assert!(RepoId::parse("").is_err());
        assert!(RepoId::parse("no-slash").is_err());
        assert!(RepoId::parse("/name").is_err());
        assert!(RepoId::parse("owner/").is_err());
        assert!(RepoId::parse("a/b/c").is_err());
    }

    #[test]
    fn app_id_unset() {
        assert!(AppId(0).is_unset());
        assert!(!AppId(1234).is_unset());
    }

    #[test]
    fn project_id_for_repo_name_is_stable() {
        let a = ProjectId::for_repo_name("octocat/hello-world");
        let b = ProjectId::for_repo_name("octocat/hello-world");
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("brigade-"));
    }

    #[test]
    fn project_id_differs_per_repo() {
        let a = ProjectId::for_repo_name("octocat/hello-world");
        let b = ProjectId::for_repo_name("octocat/other");
        assert_ne!(a, b);
    }
}
