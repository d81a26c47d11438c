//! Black-box coverage for longest-prefix route matching, layered on top of
//! the unit tests already embedded in `services::route_matcher`. This file
//! exercises the matcher through a realistic multi-upstream route table
//! instead of the two- and three-rule fixtures used there.

use ahash::AHashSet;
use portcullis_core::models::route_rule::RouteRule;
use portcullis_core::services::route_matcher::{RouteMatchError, RouteMatcher};

fn route(prefix: &str, upstream: &str, methods: &[&str]) -> RouteRule {
    RouteRule {
        path_prefix: prefix.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect::<AHashSet<_>>(),
        upstream: upstream.to_string(),
        requires_auth: false,
        required_roles: None,
        public: false,
    }
}

fn gateway_routes() -> Vec<RouteRule> {
    vec![
        route("/api", "general", &["GET"]),
        route("/api/orders", "orders", &["GET", "POST"]),
        route("/api/orders/admin", "orders-admin", &["GET", "POST", "DELETE"]),
        route("/api/users", "users", &["GET", "PUT"]),
        route("/cats", "cat-facts", &["GET"]),
    ]
}

#[test]
fn deepest_configured_prefix_wins_across_three_overlapping_rules() {
    let matcher = RouteMatcher::new(gateway_routes());

    let matched = matcher.find_match("GET", "/api/orders/admin/42").unwrap();
    assert_eq!(matched.upstream, "orders-admin");

    let matched = matcher.find_match("GET", "/api/orders/99").unwrap();
    assert_eq!(matched.upstream, "orders");

    let matched = matcher.find_match("GET", "/api/anything-else").unwrap();
    assert_eq!(matched.upstream, "general");
}

#[test]
fn method_restriction_is_scoped_to_the_matched_rule_not_the_whole_table() {
    let matcher = RouteMatcher::new(gateway_routes());

    // DELETE only exists on /api/orders/admin, not on the shorter /api/orders prefix.
    let result = matcher.find_match("DELETE", "/api/orders/1");
    assert!(result.is_err());

    let result = matcher.find_match("DELETE", "/api/orders/admin/1");
    assert!(result.is_ok());
}

#[test]
fn exact_prefix_match_with_no_trailing_segment_matches() {
    let matcher = RouteMatcher::new(gateway_routes());
    let matched = matcher.find_match("GET", "/api/users").unwrap();
    assert_eq!(matched.upstream, "users");
}

#[test]
fn unconfigured_path_is_a_no_match_error() {
    let matcher = RouteMatcher::new(gateway_routes());
    let result = matcher.find_match("GET", "/nonexistent");
    assert_eq!(
        result.unwrap_err(),
        RouteMatchError::NoMatch { method: "GET".to_string(), path: "/nonexistent".to_string() }
    );
}

#[test]
fn empty_and_root_paths_without_a_matching_prefix_are_rejected() {
    let matcher = RouteMatcher::new(vec![route("/api", "general", &["GET"])]);
    assert!(matcher.find_match("GET", "").is_err());
    assert!(matcher.find_match("GET", "/").is_err());
}

#[test]
fn method_matching_is_case_insensitive() {
    let matcher = RouteMatcher::new(vec![route("/api", "general", &["GET"])]);
    assert!(matcher.find_match("get", "/api/things").is_ok());
}

#[test]
fn empty_route_table_matches_nothing() {
    let matcher = RouteMatcher::new(vec![]);
    assert!(matcher.find_match("GET", "/anything").is_err());
}
