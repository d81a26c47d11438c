//! Route configuration: the immutable rule table the gateway matches requests against.
//!
//! A [`RouteRule`] binds a path prefix and a set of allowed HTTP methods to a
//! named upstream, with optional authentication/authorization requirements.
//! Rules are loaded once from configuration and never mutated at runtime;
//! [`crate::services::route_matcher::RouteMatcher`] is the only thing that
//! reads them on the request path.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry in the gateway's route table.
///
/// `pathPrefix` must start with `/`. `methods` must be non-empty. `upstream`
/// is a key into [`Services`] and is validated to resolve at load time by
/// [`crate::config::validation::ConfigValidator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRule {
    pub path_prefix: String,
    pub methods: AHashSet<String>,
    pub upstream: String,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default)]
    pub required_roles: Option<AHashSet<String>>,
    /// Marks a route as subject to the looser `public` rate-limit policy
    /// (login-shaped auth endpoints and the like) instead of `global`.
    #[serde(default)]
    pub public: bool,
}

impl RouteRule {
    pub fn allows_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }

    /// True if `path` falls under this rule's prefix.
    pub fn matches_prefix(&self, path: &str) -> bool {
        path.starts_with(self.path_prefix.as_str())
    }
}

/// Map from logical upstream name to its base URL, as loaded from config.
///
/// Immutable after load; shared by reference across the gateway via `Arc`.
pub type Services = HashMap<String, String>;
