//! In-memory build store.
//!
//! Serves two purposes: the default wiring for a standalone gateway (projects
//! seeded from a JSON file, builds recorded and logged), and the store used
//! throughout the test suite. A production deployment replaces this with a
//! client for the real build store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::types::{Build, BuildId, Project};

use super::{BuildStore, StoreError};

/// Thread-safe in-memory project/build storage.
///
/// Locks are held only for map access, never across await points, so plain
/// std locks suffice here.
#[derive(Debug, Default)]
pub struct InMemoryBuildStore {
    /// Projects, indexed by both full name and project id.
    projects: RwLock<HashMap<String, Project>>,

    /// Builds created so far, in creation order.
    builds: RwLock<Vec<Build>>,

    /// Monotonic counter for build id assignment.
    next_build: AtomicU64,
}

impl InMemoryBuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads projects from a JSON file containing an array of [`Project`]
    /// records.
    pub fn from_projects_file(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read(path)
            .map_err(|e| StoreError::Operation(format!("reading {}: {e}", path.display())))?;
        let projects: Vec<Project> = serde_json::from_slice(&raw)
            .map_err(|e| StoreError::Operation(format!("parsing {}: {e}", path.display())))?;

        let store = Self::new();
        for project in projects {
            store.insert_project(project);
        }
        Ok(store)
    }

    /// Registers a project, making it resolvable by name and by id.
    pub fn insert_project(&self, project: Project) {
        let mut projects = self.projects.write().expect("projects lock poisoned");
        projects.insert(project.id.as_str().to_string(), project.clone());
        projects.insert(project.name.clone(), project);
    }

    /// Returns a snapshot of every build created so far.
    pub fn builds(&self) -> Vec<Build> {
        self.builds.read().expect("builds lock poisoned").clone()
    }
}

#[async_trait]
impl BuildStore for InMemoryBuildStore {
    async fn get_project(&self, name: &str) -> Result<Project, StoreError> {
        self.projects
            .read()
            .expect("projects lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ProjectNotFound(name.to_string()))
    }

    async fn create_build(&self, mut build: Build) -> Result<Build, StoreError> {
        if build.id.is_empty() {
            let n = self.next_build.fetch_add(1, Ordering::Relaxed);
            build.id = BuildId::new(format!("{:016x}", n + 1));
        }

        info!(
            build_id = %build.id,
            build_type = %build.build_type,
            project = %build.project_id,
            "Created build"
        );

        self.builds
            .write()
            .expect("builds lock poisoned")
            .push(build.clone());
        Ok(build)
    }
}
