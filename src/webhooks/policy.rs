//! Admission policy for pull-request events.
//!
//! PRs from the base repository are trusted; PRs from forks are only built
//! when the author's association with the repository is allow-listed. This
//! keeps untrusted forks from running builds with repository credentials.

use tracing::debug;

use super::events::PullRequestEvent;

/// Pull-request actions that indicate code may have changed (or the PR's
/// lifecycle moved) and a build is warranted.
const ALLOWED_PR_ACTIONS: &[&str] = &[
    "opened",
    "synchronize",
    "reopened",
    "labeled",
    "unlabeled",
    "closed",
];

/// The default author associations allowed to build from forks.
pub const DEFAULT_ALLOWED_AUTHORS: &[&str] = &["COLLABORATOR", "OWNER", "MEMBER"];

/// The set of author associations allowed to trigger builds from forks and to
/// receive issue-comment enrichment.
#[derive(Debug, Clone)]
pub struct AuthorAllowlist {
    associations: Vec<String>,
}

impl AuthorAllowlist {
    /// Builds an allowlist; associations are matched case-sensitively the way
    /// GitHub delivers them (upper case).
    pub fn new(associations: impl IntoIterator<Item = impl Into<String>>) -> Self {
        AuthorAllowlist {
            associations: associations.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, association: &str) -> bool {
        self.associations.iter().any(|a| a == association)
    }
}

impl Default for AuthorAllowlist {
    fn default() -> Self {
        AuthorAllowlist::new(DEFAULT_ALLOWED_AUTHORS.iter().copied())
    }
}

/// Returns true if this pull request is admitted to produce builds.
///
/// Admission requires an allowed action, and additionally an allow-listed
/// author association when the PR's head lives in a fork.
pub fn is_allowed_pull_request(event: &PullRequestEvent, allowlist: &AuthorAllowlist) -> bool {
    if event.head_repo_fork && !allowlist.is_allowed(&event.author_association) {
        debug!(
            association = %event.author_association,
            pr = %event.number,
            "skipping pull request from disallowed author"
        );
        return false;
    }

    if ALLOWED_PR_ACTIONS.contains(&event.action.as_str()) {
        return true;
    }

    debug!(action = %event.action, pr = %event.number, "unsupported pull_request action");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InstallationId, IssueNumber, RepoId};

    fn pr_event(action: &str, fork: bool, association: &str) -> PullRequestEvent {
        PullRequestEvent {
            repo: RepoId::new("octocat", "hello-world"),
            action: action.to_string(),
            number: IssueNumber(1),
            head_sha: "0d1a26e67d8f5eaf1f6ba5c57fc3c7d91ac0fd1c".to_string(),
            head_repo_fork: fork,
            author_association: association.to_string(),
            installation_id: InstallationId(0),
        }
    }

    #[test]
    fn non_fork_is_admitted_regardless_of_association() {
        let allowlist = AuthorAllowlist::default();
        assert!(is_allowed_pull_request(
            &pr_event("opened", false, "NONE"),
            &allowlist
        ));
    }

    #[test]
    fn fork_requires_allowed_association() {
        let allowlist = AuthorAllowlist::default();
        assert!(!is_allowed_pull_request(
            &pr_event("opened", true, "NONE"),
            &allowlist
        ));
        assert!(is_allowed_pull_request(
            &pr_event("opened", true, "OWNER"),
            &allowlist
        ));
    }

    #[test]
    fn every_admitted_action() {
        let allowlist = AuthorAllowlist::default();
        for action in ALLOWED_PR_ACTIONS {
            assert!(
                is_allowed_pull_request(&pr_event(action, false, "NONE"), &allowlist),
                "action {action} should be admitted"
            );
        }
    }

    #[test]
    fn unsupported_action_is_rejected() {
        let allowlist = AuthorAllowlist::default();
        assert!(!is_allowed_pull_request(
            &pr_event("assigned", false, "OWNER"),
            &allowlist
        ));
        assert!(!is_allowed_pull_request(
            &pr_event("review_requested", false, "OWNER"),
            &allowlist
        ));
    }

    #[test]
    fn allowlist_matching_is_exact() {
        let allowlist = AuthorAllowlist::new(["OWNER"]);
        assert!(allowlist.is_allowed("OWNER"));
        assert!(!allowlist.is_allowed("owner"));
        assert!(!allowlist.is_allowed("MEMBER"));
    }
}
