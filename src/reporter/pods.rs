//! Worker pod model and the shared pod index.
//!
//! The cluster watch itself is an external collaborator; the gateway only
//! consumes its Add/Update callbacks. This module holds the minimal pod
//! representation those callbacks deliver and the index the processing loop
//! reads from.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Lifecycle phase of a worker pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    /// A phase outside the known set; processing treats it as retryable.
    Other(String),
}

impl PodPhase {
    pub fn parse(s: &str) -> Self {
        match s {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            "Unknown" => PodPhase::Unknown,
            other => PodPhase::Other(other.to_string()),
        }
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodPhase::Pending => write!(f, "Pending"),
            PodPhase::Running => write!(f, "Running"),
            PodPhase::Succeeded => write!(f, "Succeeded"),
            PodPhase::Failed => write!(f, "Failed"),
            PodPhase::Unknown => write!(f, "Unknown"),
            PodPhase::Other(s) => write!(f, "{s}"),
        }
    }
}

/// The slice of a pod the reporter consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pod {
    pub name: String,
    pub namespace: String,
    pub phase: PodPhase,
}

impl Pod {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, phase: PodPhase) -> Self {
        Pod {
            name: name.into(),
            namespace: namespace.into(),
            phase,
        }
    }

    /// The `namespace/name` key pods are indexed and queued under.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Shared index of the most recently observed state of each pod.
///
/// Written by the watch callbacks (and by build registration, which seeds a
/// placeholder), read by reporter workers.
#[derive(Debug, Default)]
pub struct PodIndex {
    pods: RwLock<HashMap<String, Pod>>,
}

impl PodIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a pod, returning its key.
    pub fn upsert(&self, pod: Pod) -> String {
        let key = pod.key();
        self.pods
            .write()
            .expect("pod index lock poisoned")
            .insert(key.clone(), pod);
        key
    }

    pub fn get(&self, key: &str) -> Option<Pod> {
        self.pods
            .read()
            .expect("pod index lock poisoned")
            .get(key)
            .cloned()
    }

    pub fn remove(&self, key: &str) {
        self.pods
            .write()
            .expect("pod index lock poisoned")
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parse_roundtrip() {
        for phase in ["Pending", "Running", "Succeeded", "Failed", "Unknown"] {
            assert_eq!(PodPhase::parse(phase).to_string(), phase);
        }
        assert_eq!(
            PodPhase::parse("Evicted"),
            PodPhase::Other("Evicted".to_string())
        );
    }

    #[test]
    fn pod_key_is_namespace_qualified() {
        let pod = Pod::new("brigade", "brigade-worker-01", PodPhase::Running);
        assert_eq!(pod.key(), "brigade/brigade-worker-01");
    }

    #[test]
    fn index_upsert_replaces() {
        let index = PodIndex::new();
        let key = index.upsert(Pod::new("ns", "p", PodPhase::Pending));
        index.upsert(Pod::new("ns", "p", PodPhase::Failed));

        assert_eq!(index.get(&key).unwrap().phase, PodPhase::Failed);

        index.remove(&key);
        assert!(index.get(&key).is_none());
    }
}
