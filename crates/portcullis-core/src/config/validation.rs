//! Configuration validation with detailed error reporting.
//!
//! Validates a loaded [`GatewayConfig`] for structural soundness, security
//! posture, and references that must resolve (`upstream` names, JWT secret
//! presence in production) before the gateway starts serving traffic.

use crate::config::settings::{is_production, GatewayConfig};
use log::{info, warn};
use std::collections::HashSet;

/// Result of configuration validation, categorized by severity.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { is_valid: true, ..Default::default() }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_comprehensive(config: &GatewayConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_basic_structure(config, &mut result);
        Self::validate_upstream_references(config, &mut result);
        Self::validate_auth_requirements(config, &mut result);
        Self::validate_security(config, &mut result);
        Self::validate_route_conflicts(config, &mut result);
        Self::log_validation_results(&result);

        result
    }

    fn validate_basic_structure(config: &GatewayConfig, result: &mut ValidationResult) {
        if config.gate.allowed_routes.is_empty() {
            result.add_error(
                "No routes configured in gate.allowed_routes - gateway will reject all traffic"
                    .to_string(),
            );
        }

        for (index, route) in config.gate.allowed_routes.iter().enumerate() {
            if !route.path_prefix.starts_with('/') {
                result.add_error(format!(
                    "Route {} has invalid pathPrefix '{}': must start with '/'",
                    index, route.path_prefix
                ));
            }
            if route.methods.is_empty() {
                result.add_error(format!("Route {} has no allowed methods", index));
            }
            if route.path_prefix.contains("..") {
                result.add_error(format!(
                    "Path traversal sequence detected in route {} pathPrefix '{}'",
                    index, route.path_prefix
                ));
            }
        }

        if config.gate.services.is_empty() {
            result.add_warning("No services configured in gate.services".to_string());
        }
    }

    fn validate_upstream_references(config: &GatewayConfig, result: &mut ValidationResult) {
        for route in &config.gate.allowed_routes {
            if !config.gate.services.contains_key(&route.upstream) {
                result.add_error(format!(
                    "Route '{}' references unknown upstream '{}'",
                    route.path_prefix, route.upstream
                ));
            }
        }
    }

    fn validate_auth_requirements(config: &GatewayConfig, result: &mut ValidationResult) {
        let any_requires_auth = config.gate.allowed_routes.iter().any(|r| r.requires_auth);
        let has_secret = config
            .jwt
            .secret
            .as_ref()
            .map(|s| !s.is_empty())
            .unwrap_or(false);

        if any_requires_auth && !has_secret && is_production() {
            result.add_error(
                "One or more routes require authentication but jwt.secret is not configured in \
                 production (PORTCULLIS_ENV=production)"
                    .to_string(),
            );
        }

        if let Some(secret) = &config.jwt.secret {
            if !secret.is_empty() && secret.len() < 32 {
                result.add_warning(
                    "jwt.secret is shorter than 32 characters - consider a longer secret"
                        .to_string(),
                );
            }
        }

        if !has_secret && !is_production() {
            result.add_recommendation(
                "No jwt.secret configured; token validation is disabled and all requests are \
                 treated as anonymous (development mode only)"
                    .to_string(),
            );
        }
    }

    fn validate_security(config: &GatewayConfig, result: &mut ValidationResult) {
        let mut http_upstreams = 0;
        let mut https_upstreams = 0;

        for (name, base_url) in &config.gate.services {
            if base_url.starts_with("http://") {
                http_upstreams += 1;
                if !base_url.contains("localhost") && !base_url.contains("127.0.0.1") {
                    result.add_warning(format!(
                        "Insecure HTTP upstream '{}' at {} - consider HTTPS",
                        name, base_url
                    ));
                }
            } else if base_url.starts_with("https://") {
                https_upstreams += 1;
            } else {
                result.add_error(format!(
                    "Upstream '{}' has base URL '{}' without http(s):// scheme",
                    name, base_url
                ));
            }
        }

        if http_upstreams > 0 && https_upstreams == 0 {
            result.add_warning(
                "All upstreams use plain HTTP - consider HTTPS for production".to_string(),
            );
        }

        for route in &config.gate.allowed_routes {
            if route.methods.len() > 4 {
                result.add_warning(format!(
                    "Route '{}' allows many HTTP methods ({}) - consider restricting",
                    route.path_prefix,
                    route.methods.len()
                ));
            }
        }
    }

    fn validate_route_conflicts(config: &GatewayConfig, result: &mut ValidationResult) {
        let mut seen_prefixes: HashSet<&str> = HashSet::new();
        for route in &config.gate.allowed_routes {
            if !seen_prefixes.insert(route.path_prefix.as_str()) {
                result.add_warning(format!(
                    "Duplicate pathPrefix '{}' across multiple route rules - longest-prefix \
                     matching makes ordering irrelevant, but duplicates indicate misconfiguration",
                    route.path_prefix
                ));
            }
        }
    }

    fn log_validation_results(result: &ValidationResult) {
        if result.is_valid {
            info!("Configuration validation passed");
        } else {
            for error in &result.errors {
                log::error!("Validation error: {}", error);
            }
        }
        for warning in &result.warnings {
            warn!("Validation warning: {}", warning);
        }
        for recommendation in &result.recommendations {
            info!("Recommendation: {}", recommendation);
        }
    }
}
