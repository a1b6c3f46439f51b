//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the upstream for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Longest prefix wins, so overlapping prefixes resolve deterministically
//! - O(n) path prefix scan (acceptable for typical route counts)

use std::sync::Arc;

use axum::http::Uri;

use crate::config::UpstreamConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// A backend service the gateway forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    name: String,
    base_url: String,
}

impl Upstream {
    pub fn new(name: impl Into<String>, base_url: &str) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Target URI for a request: the base URL followed by the original path
    /// and query, unchanged.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, axum::http::uri::InvalidUri> {
        format!("{}{}", self.base_url, path_and_query).parse()
    }
}

#[derive(Debug)]
struct Route {
    matcher: PathPrefixMatcher,
    upstream: Arc<Upstream>,
}

/// Immutable prefix table built from the upstream configuration.
#[derive(Debug, Default)]
pub struct ServiceRouter {
    routes: Vec<Route>,
}

impl ServiceRouter {
    pub fn from_config(upstreams: &[UpstreamConfig]) -> Self {
        let mut routes = Vec::new();
        for config in upstreams {
            let upstream = Arc::new(Upstream::new(config.name.clone(), &config.base_url));
            for prefix in &config.path_prefixes {
                routes.push(Route {
                    matcher: PathPrefixMatcher::new(prefix.clone()),
                    upstream: upstream.clone(),
                });
            }
        }
        // Longest prefix first; stable sort keeps config order among equals.
        routes.sort_by(|a, b| b.matcher.prefix().len().cmp(&a.matcher.prefix().len()));

        for route in &routes {
            tracing::debug!(
                prefix = %route.matcher.prefix(),
                upstream = %route.upstream.name(),
                base_url = %route.upstream.base_url(),
                "Registered route"
            );
        }
        Self { routes }
    }

    /// The upstream responsible for `path`, if any.
    pub fn match_path(&self, path: &str) -> Option<&Arc<Upstream>> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(path))
            .map(|route| &route.upstream)
    }

    /// Registered `(prefix, upstream name)` pairs in match order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.matcher.prefix(), r.upstream.name()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ServiceRouter {
        ServiceRouter::from_config(&UpstreamConfig::marketplace_defaults())
    }

    #[test]
    fn test_marketplace_table() {
        let router = router();
        let cases = [
            ("/api/auth/login", "auth"),
            ("/api/users/me", "user"),
            ("/api/workers/12/skills", "user"),
            ("/api/hirers", "user"),
            ("/api/jobs?page=2", "job"),
            ("/api/messages/9", "messaging"),
            ("/api/conversations", "messaging"),
            ("/api/payments/escrow", "payment"),
            ("/api/reviews/5", "review"),
        ];
        for (path, expected) in cases {
            let upstream = router.match_path(path).unwrap_or_else(|| panic!("no route for {}", path));
            assert_eq!(upstream.name(), expected, "path {}", path);
        }
    }

    #[test]
    fn test_unmatched_paths() {
        let router = router();
        assert!(router.match_path("/api/unknown").is_none());
        assert!(router.match_path("/api/jobsearch").is_none());
        assert!(router.match_path("/").is_none());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let router = ServiceRouter::from_config(&[
            UpstreamConfig {
                name: "wide".into(),
                base_url: "http://wide:1".into(),
                url_env: None,
                path_prefixes: vec!["/api".into()],
            },
            UpstreamConfig {
                name: "narrow".into(),
                base_url: "http://narrow:2".into(),
                url_env: None,
                path_prefixes: vec!["/api/jobs".into()],
            },
        ]);
        assert_eq!(router.match_path("/api/jobs/1").map(|u| u.name()), Some("narrow"));
        assert_eq!(router.match_path("/api/other").map(|u| u.name()), Some("wide"));
        assert_eq!(router.routes().next(), Some(("/api/jobs", "narrow")));
    }

    #[test]
    fn test_target_uri_keeps_path_and_query() {
        let upstream = Upstream::new("job", "http://localhost:5003/");
        let uri = upstream.target_uri("/api/jobs/7?expand=hirer").unwrap();
        assert_eq!(uri.to_string(), "http://localhost:5003/api/jobs/7?expand=hirer");
    }
}
