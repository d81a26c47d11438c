//! Integration tests for configuration validation: security checks and
//! structural error reporting against a fully assembled [`GatewayConfig`].

use ahash::AHashSet;
use portcullis_core::config::settings::{GateSection, GatewayConfig, HealthChecksSection, JwtSection, RedisSection};
use portcullis_core::config::validation::{ConfigValidator, ValidationResult};
use portcullis_core::models::route_rule::RouteRule;
use std::collections::HashMap;

fn route(prefix: &str, upstream: &str, methods: &[&str], requires_auth: bool) -> RouteRule {
    RouteRule {
        path_prefix: prefix.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect::<AHashSet<_>>(),
        upstream: upstream.to_string(),
        requires_auth,
        required_roles: None,
        public: false,
    }
}

fn config_with(services: &[(&str, &str)], routes: Vec<RouteRule>) -> GatewayConfig {
    GatewayConfig {
        gate: GateSection {
            services: services.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>(),
            allowed_routes: routes,
            default_timeout_seconds: 30,
            max_payload_size_bytes: 1024 * 1024,
            enable_caching: false,
            cache_expiration_minutes: 5,
            secret: None,
        },
        jwt: JwtSection::default(),
        redis: RedisSection::default(),
        health_checks: HealthChecksSection::default(),
    }
}

#[test]
fn empty_route_table_is_an_error() {
    let config = config_with(&[], vec![]);
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("No routes configured")));
}

#[test]
fn unknown_upstream_reference_is_an_error() {
    let config = config_with(
        &[("orders", "https://orders.internal")],
        vec![route("/api/users", "users", &["GET"], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("unknown upstream 'users'")));
}

#[test]
fn path_traversal_in_prefix_is_an_error() {
    let config = config_with(
        &[("orders", "https://orders.internal")],
        vec![route("/api/../admin", "orders", &["GET"], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("Path traversal")));
}

#[test]
fn prefix_not_starting_with_slash_is_an_error() {
    let config = config_with(
        &[("orders", "https://orders.internal")],
        vec![route("api/orders", "orders", &["GET"], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("must start with '/'")));
}

#[test]
fn insecure_http_upstream_warns_but_does_not_invalidate() {
    let config = config_with(
        &[("orders", "http://orders.example.com")],
        vec![route("/api/orders", "orders", &["GET"], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(result.is_valid);
    assert!(result.warnings.iter().any(|w| w.contains("Insecure HTTP upstream")));
}

#[test]
fn localhost_http_upstream_does_not_trigger_the_insecure_warning() {
    let config = config_with(
        &[("orders", "http://localhost:9001")],
        vec![route("/api/orders", "orders", &["GET"], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(!result.warnings.iter().any(|w| w.contains("Insecure HTTP upstream")));
}

#[test]
fn upstream_missing_scheme_is_an_error() {
    let config = config_with(
        &[("orders", "orders.example.com")],
        vec![route("/api/orders", "orders", &["GET"], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("without http(s):// scheme")));
}

#[test]
fn all_http_upstreams_triggers_an_aggregate_warning() {
    let config = config_with(
        &[("orders", "http://orders.example.com"), ("users", "http://users.example.com")],
        vec![
            route("/api/orders", "orders", &["GET"], false),
            route("/api/users", "users", &["GET"], false),
        ],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(result.warnings.iter().any(|w| w.contains("All upstreams use plain HTTP")));
}

#[test]
fn many_methods_on_one_route_warns() {
    let config = config_with(
        &[("orders", "https://orders.example.com")],
        vec![route("/api/orders", "orders", &["GET", "POST", "PUT", "DELETE", "PATCH"], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(result.warnings.iter().any(|w| w.contains("many HTTP methods")));
}

#[test]
fn duplicate_path_prefixes_warn() {
    let config = config_with(
        &[("orders", "https://orders.example.com"), ("orders2", "https://orders2.example.com")],
        vec![
            route("/api/orders", "orders", &["GET"], false),
            route("/api/orders", "orders2", &["POST"], false),
        ],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(result.warnings.iter().any(|w| w.contains("Duplicate pathPrefix")));
}

#[test]
fn valid_configuration_has_no_errors() {
    let config = config_with(
        &[("orders", "https://orders.example.com")],
        vec![
            route("/api/health", "orders", &["GET"], false),
            route("/api/orders", "orders", &["GET", "POST"], false),
        ],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(result.is_valid);
    assert!(result.errors.is_empty());
}

#[test]
fn empty_route_methods_is_an_error() {
    let config = config_with(
        &[("orders", "https://orders.example.com")],
        vec![route("/api/orders", "orders", &[], false)],
    );
    let result = ConfigValidator::validate_comprehensive(&config);
    assert!(!result.is_valid);
    assert!(result.errors.iter().any(|e| e.contains("no allowed methods")));
}

#[test]
fn validation_result_accumulates_independently() {
    let mut result = ValidationResult::new();
    assert!(result.is_valid);

    result.add_warning("just a warning".to_string());
    assert!(result.is_valid);

    result.add_error("fatal".to_string());
    assert!(!result.is_valid);
    assert_eq!(result.errors, vec!["fatal".to_string()]);
}
