//! Projects, revisions, and builds as understood by the build store.
//!
//! These mirror the build store's data model. The gateway reads projects (to
//! find shared secrets and GitHub connection details) and writes builds; it
//! never mutates projects.

use serde::{Deserialize, Serialize};

use super::ids::{BuildId, IssueNumber, ProjectId};

/// Per-project GitHub connection details.
///
/// `base_url` and `upload_url` are only set for GitHub Enterprise; when empty
/// the public endpoint is used. `upload_url` is carried for compatibility with
/// the store's project records but the API client only needs `base_url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubDetails {
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub upload_url: String,

    /// OAuth token for plain (non-App) API access. Unused by the gateway but
    /// present in project records.
    #[serde(default)]
    pub token: String,
}

/// A project registered in the build store.
///
/// Looked up by repository full name (`owner/name`); immutable within a
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,

    /// The repository full name, e.g. `octocat/hello-world`.
    pub name: String,

    /// Webhook shared secret. May be empty, in which case the gateway's
    /// default shared secret applies.
    #[serde(default)]
    pub shared_secret: String,

    #[serde(default)]
    pub github: GithubDetails,
}

impl Project {
    /// Creates a project with the canonical id derived from its name.
    pub fn new(name: impl Into<String>, shared_secret: impl Into<String>) -> Self {
        let name = name.into();
        Project {
            id: ProjectId::for_repo_name(&name),
            name,
            shared_secret: shared_secret.into(),
            github: GithubDetails::default(),
        }
    }
}

/// A point in a repository's history that a build runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    /// Commit SHA. Empty when the event does not identify one.
    #[serde(default)]
    pub commit: String,

    /// Git ref (branch ref, `refs/pull/N/head`, or a tag name).
    #[serde(default, rename = "ref")]
    pub reference: String,
}

impl Revision {
    pub fn new(commit: impl Into<String>, reference: impl Into<String>) -> Self {
        Revision {
            commit: commit.into(),
            reference: reference.into(),
        }
    }
}

/// A build record handed to the build store.
///
/// The store assigns `id` on creation and returns the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Assigned by the store; empty until then.
    #[serde(default)]
    pub id: BuildId,

    pub project_id: ProjectId,

    /// Event type, e.g. `push` or `pull_request:opened`.
    #[serde(rename = "type")]
    pub build_type: String,

    /// Always `github` for builds created by this gateway.
    pub provider: String,

    pub revision: Revision,

    /// The payload forwarded to the worker, as raw JSON bytes.
    #[serde(with = "payload_bytes")]
    pub payload: Vec<u8>,
}

impl Build {
    pub fn new(
        project_id: ProjectId,
        build_type: impl Into<String>,
        revision: Revision,
        payload: Vec<u8>,
    ) -> Self {
        Build {
            id: BuildId::default(),
            project_id,
            build_type: build_type.into(),
            provider: "github".to_string(),
            revision,
            payload,
        }
    }
}

/// Serialize payload bytes as a UTF-8 string (the payload is always JSON).
mod payload_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(de)?.into_bytes())
    }
}

/// Side-channel data the dispatcher attaches to a scheduled build.
///
/// When `token` is non-empty and `issue_number` is set, the build is eligible
/// for failure reporting back to the originating issue or pull request.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Installation token the downstream worker may reuse until it expires.
    pub token: String,

    /// The issue/PR the build originated from, if any.
    pub issue_number: Option<IssueNumber>,
}

impl BuildOptions {
    /// Returns true if this build can be registered for failure reporting.
    pub fn reportable(&self) -> bool {
        !self.token.is_empty() && self.issue_number.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_new_derives_id() {
        let p = Project::new("octocat/hello-world", "s3cr3t");
        assert_eq!(p.id, ProjectId::for_repo_name("octocat/hello-world"));
        assert_eq!(p.shared_secret, "s3cr3t");
    }

    #[test]
    fn revision_serializes_ref_field() {
        let rev = Revision::new("abc", "refs/heads/main");
        let json = serde_json::to_value(&rev).unwrap();
        assert_eq!(json["ref"], "refs/heads/main");
        assert_eq!(json["commit"], "abc");
    }

    #[test]
    fn build_defaults() {
        let b = Build::new(
            ProjectId::new("p"),
            "push",
            Revision::default(),
            b"{}".to_vec(),
        );
        assert!(b.id.is_empty());
        assert_eq!(b.provider, "github");
        assert_eq!(b.build_type, "push");
    }

    #[test]
    fn build_payload_roundtrips_as_json_string() {
        let b = Build::new(
            ProjectId::new("p"),
            "push",
            Revision::default(),
            br#"{"k":"v"}"#.to_vec(),
        );
        let json = serde_json::to_string(&b).unwrap();
        let back: Build = serde_json::from_str(&json).unwrap();
        assert_eq!(back.payload, b.payload);
    }

    #[test]
    fn build_options_reportable() {
        assert!(!BuildOptions::default().reportable());
        assert!(
            !BuildOptions {
                token: "t".into(),
                issue_number: None,
            }
            .reportable()
        );
        assert!(
            BuildOptions {
                token: "t".into(),
                issue_number: Some(IssueNumber(4)),
            }
            .reportable()
        );
    }
}
