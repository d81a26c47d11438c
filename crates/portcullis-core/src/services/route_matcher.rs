//! Longest-prefix-wins route matching.
//!
//! Given a request method and path, the matcher selects the [`RouteRule`]
//! whose `path_prefix` is a prefix of the path and whose `methods` contain
//! the request method; among candidates, the longest `path_prefix` wins.
//! System paths (`/health`, `/health/live`, `/health/ready`, `/metrics`,
//! `/info`, `/swagger`) are never matched here — the pipeline intercepts
//! them before route matching runs.

use crate::models::route_rule::RouteRule;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RouteMatchError {
    #[error("no route configured for {method} {path}")]
    NoMatch { method: String, path: String },
}

/// Immutable, load-once table of route rules, ordered by descending prefix
/// length so the first match found is always the longest.
pub struct RouteMatcher {
    rules: Vec<Arc<RouteRule>>,
}

impl RouteMatcher {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        let mut rules: Vec<Arc<RouteRule>> = rules.into_iter().map(Arc::new).collect();
        // Longest prefix first so find_match's linear scan returns the
        // longest match without needing to compare lengths at lookup time.
        rules.sort_by(|a, b| b.path_prefix.len().cmp(&a.path_prefix.len()));
        Self { rules }
    }

    /// Finds the longest-prefix rule whose methods contain `method` and
    /// whose `path_prefix` is a prefix of `path`.
    pub fn find_match(&self, method: &str, path: &str) -> Result<Arc<RouteRule>, RouteMatchError> {
        self.rules
            .iter()
            .find(|rule| rule.allows_method(method) && rule.matches_prefix(path))
            .cloned()
            .ok_or_else(|| RouteMatchError::NoMatch {
                method: method.to_string(),
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::AHashSet;

    fn rule(prefix: &str, upstream: &str, methods: &[&str], requires_auth: bool) -> RouteRule {
        RouteRule {
            path_prefix: prefix.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect::<AHashSet<_>>(),
            upstream: upstream.to_string(),
            requires_auth,
            required_roles: None,
            public: false,
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let matcher = RouteMatcher::new(vec![
            rule("/api", "general", &["GET"], false),
            rule("/api/orders", "orders", &["GET"], false),
        ]);

        let matched = matcher.find_match("GET", "/api/orders/42").unwrap();
        assert_eq!(matched.upstream, "orders");
    }

    #[test]
    fn falls_back_to_shorter_prefix_outside_longer_scope() {
        let matcher = RouteMatcher::new(vec![
            rule("/api", "general", &["GET"], false),
            rule("/api/orders", "orders", &["GET"], false),
        ]);

        let matched = matcher.find_match("GET", "/api/users").unwrap();
        assert_eq!(matched.upstream, "general");
    }

    #[test]
    fn method_not_in_rule_is_not_a_match() {
        let matcher = RouteMatcher::new(vec![rule("/api", "general", &["GET"], false)]);
        let result = matcher.find_match("POST", "/api/things");
        assert!(result.is_err());
    }

    #[test]
    fn no_matching_prefix() {
        let matcher = RouteMatcher::new(vec![rule("/api", "general", &["GET"], false)]);
        let result = matcher.find_match("GET", "/unrelated");
        assert_eq!(
            result,
            Err(RouteMatchError::NoMatch {
                method: "GET".to_string(),
                path: "/unrelated".to_string(),
            })
        );
    }
}
