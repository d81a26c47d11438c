//! Per-request state threaded through the ingress pipeline.

use super::principal::Principal;
use super::route_rule::RouteRule;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    pub started_at: Instant,
    pub received_at: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub matched_route: Option<Arc<RouteRule>>,
    pub principal: Option<Principal>,
    pub upstream_name: Option<String>,
    pub attempt: u32,
    pub from_cache: bool,
}

impl RequestContext {
    pub fn new(correlation_id: String, method: String, path: String) -> Self {
        Self {
            correlation_id,
            started_at: Instant::now(),
            received_at: Utc::now(),
            method,
            path,
            matched_route: None,
            principal: None,
            upstream_name: None,
            attempt: 0,
            from_cache: false,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}
