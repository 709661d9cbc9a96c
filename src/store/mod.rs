//! The build store interface.
//!
//! The build store is an external system: it persists build records and
//! spawns the worker processes that execute them. The gateway only depends on
//! the two operations below; everything else about the store is opaque.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Build, Project};

pub use memory::InMemoryBuildStore;

/// Errors surfaced by build store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No project is registered under the given name or id.
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// The store rejected or failed the operation.
    #[error("store operation failed: {0}")]
    Operation(String),
}

/// The subset of the build store the gateway consumes.
///
/// `get_project` accepts either the repository full name (`owner/name`) or
/// the derived project id; both forms appear in webhook handling and in the
/// build reporter respectively.
#[async_trait]
pub trait BuildStore: Send + Sync {
    /// Looks up a project by name or id.
    async fn get_project(&self, name: &str) -> Result<Project, StoreError>;

    /// Persists a build and triggers its execution. Returns the stored
    /// record, with `id` assigned.
    async fn create_build(&self, build: Build) -> Result<Build, StoreError>;
}
