//! Emission filter for build types.
//!
//! Operators configure which events the gateway turns into builds via a list
//! of patterns. A pattern matches a build type (`event` or `event:action`)
//! iff it equals the full type, equals its unqualified prefix (the part
//! before `:`), or is `*`.
//!
//! Note the asymmetry: the pattern `issue_comment` matches the build type
//! `issue_comment:created`, but `issue_comment:created` does not match the
//! build type `issue_comment`.

/// The configured set of emission patterns.
#[derive(Debug, Clone)]
pub struct EmissionFilter {
    patterns: Vec<String>,
}

impl EmissionFilter {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        EmissionFilter {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// The default filter emits everything.
    pub fn all() -> Self {
        EmissionFilter::new(["*"])
    }

    /// Returns true if a build of the given type should be created.
    pub fn should_emit(&self, build_type: &str) -> bool {
        let unqualified = build_type.split(':').next().unwrap_or(build_type);
        self.patterns
            .iter()
            .any(|p| p == build_type || p == unqualified || p == "*")
    }
}

impl Default for EmissionFilter {
    fn default() -> Self {
        EmissionFilter::all()
    }
}
