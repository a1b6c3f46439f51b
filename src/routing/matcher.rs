//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive)
//! - Only match on a path segment boundary
//!
//! # Design Decisions
//! - `/api/users` matches `/api/users`, `/api/users/42` and `/api/users?x=1`
//!   but not `/api/usersettings`
//! - No regex to guarantee O(n) matching

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing `/` is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True if `path` is the prefix itself or lies underneath it.
    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => {
                self.prefix == "/" || rest.is_empty() || rest.starts_with('/') || rest.starts_with('?')
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/api/users");

        assert!(matcher.matches("/api/users"));
        assert!(matcher.matches("/api/users/"));
        assert!(matcher.matches("/api/users/42/profile"));
        assert!(!matcher.matches("/api/usersettings"));
        assert!(!matcher.matches("/api/user"));
        assert!(!matcher.matches("/API/users"));
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let matcher = PathPrefixMatcher::new("/api/jobs/");
        assert_eq!(matcher.prefix(), "/api/jobs");
        assert!(matcher.matches("/api/jobs/7"));
    }

    #[test]
    fn test_root_prefix_matches_everything() {
        let matcher = PathPrefixMatcher::new("/");
        assert!(matcher.matches("/"));
        assert!(matcher.matches("/anything"));
    }
}
