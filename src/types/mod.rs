//! Core domain types for the gateway.

pub mod build;
pub mod ids;

pub use build::{Build, BuildOptions, GithubDetails, Project, Revision};
pub use ids::{AppId, BuildId, InstallationId, IssueNumber, ProjectId, RepoId};
