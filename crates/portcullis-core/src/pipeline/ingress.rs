//! The gateway's single request-handling entry point.
//!
//! `handle_request` composes every service in the mandated order: CORS
//! preflight, rate limiting, token validation, route matching/authorization,
//! cache lookup, forwarding (retry + circuit breaker), cache population, and
//! finally the response. Every error produced anywhere along the way is
//! rendered through [`GatewayError::to_http_response`] so the client always
//! sees the canonical JSON error document with a correlation id.
//!
//! Rate limiting needs to know whether the target route is `public` before
//! the authoritative route-match/authorize step runs later in the order
//! below — resolved by doing one cheap, read-only route lookup up front for
//! policy selection, and reusing that same match for the authoritative step
//! rather than matching twice. See DESIGN.md.

use crate::config::settings::GatewayConfig;
use crate::models::error::GatewayError;
use crate::models::request_context::RequestContext;
use crate::services::cache::{Cache, CacheLookup};
use crate::services::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::services::forwarder::Forwarder;
use crate::services::health::HealthAggregator;
use crate::services::rate_limiter::{Policy, RateLimiter};
use crate::services::route_matcher::RouteMatcher;
use crate::services::token_validator::TokenValidator;
use crate::routes::metrics_routes::MetricsCollector;
use crate::middleware::cors;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::BytesMut;
use futures_util::StreamExt;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

/// All gateway services, built once at startup and shared across workers.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub route_matcher: RouteMatcher,
    pub token_validator: TokenValidator,
    pub forwarder: Arc<Forwarder>,
    pub cache: Option<Cache>,
    pub rate_limiter: RateLimiter,
    pub health: Arc<HealthAggregator>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, token_validator: TokenValidator) -> Self {
        let routes = config.routes().to_vec();
        let services = config.services().clone();
        let breakers = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
        let default_timeout = Duration::from_secs(config.gate.default_timeout_seconds);
        let gateway_secret = config.gate.secret.clone();
        let cache = config
            .gate
            .enable_caching
            .then(|| Cache::new(config.gate.max_payload_size_bytes.saturating_mul(64)));

        let health = HealthAggregator::new(services.clone(), Duration::from_secs(config.health_checks.unhealthy_timeout_seconds));
        health.spawn_background_prober(Duration::from_secs(config.health_checks.check_interval_seconds));

        Self {
            route_matcher: RouteMatcher::new(routes),
            forwarder: Arc::new(Forwarder::new(services, breakers, default_timeout, gateway_secret)),
            cache,
            rate_limiter: RateLimiter::new(),
            health,
            token_validator,
            config,
        }
    }
}

pub async fn handle_request(
    state: &GatewayState,
    req: HttpRequest,
    mut payload: web::Payload,
    metrics: &MetricsCollector,
) -> HttpResponse {
    let correlation_id = uuid::Uuid::new_v4().to_string();
    let method = req.method().to_string();
    let path = req.path().to_string();
    let mut ctx = RequestContext::new(correlation_id.clone(), method.clone(), path.clone());

    if cors::is_preflight(&req) {
        return cors::preflight_response();
    }

    match run_pipeline(state, &req, &mut payload, &mut ctx).await {
        Ok(mut response) => {
            response.headers_mut().insert(
                HeaderName::from_static("x-correlation-id"),
                HeaderValue::from_str(&correlation_id).unwrap_or(HeaderValue::from_static("invalid")),
            );
            info!(
                "{} {} -> {} ({}ms, correlation_id={})",
                method,
                path,
                response.status().as_u16(),
                ctx.elapsed_ms(),
                correlation_id
            );
            metrics.record_request(response.status().is_success(), ctx.started_at.elapsed());
            response
        }
        Err(err) => {
            warn!(
                "{} {} -> {} ({}, correlation_id={})",
                method,
                path,
                err.status_code(),
                err,
                correlation_id
            );
            metrics.record_request(false, ctx.started_at.elapsed());
            err.to_http_response(&req, &correlation_id)
        }
    }
}

async fn run_pipeline(
    state: &GatewayState,
    req: &HttpRequest,
    payload: &mut web::Payload,
    ctx: &mut RequestContext,
) -> Result<HttpResponse, GatewayError> {
    let preliminary_match = state.route_matcher.find_match(&ctx.method, &ctx.path).ok();
    let policy = Policy::for_route(preliminary_match.as_ref().map(|r| r.public).unwrap_or(false));
    state
        .rate_limiter
        .admit(policy)
        .await
        .map_err(|rejected| GatewayError::TooManyRequests {
            policy: if policy == Policy::Public { "public".to_string() } else { "global".to_string() },
            retry_after_secs: rejected.retry_after_secs,
        })?;

    ctx.principal = state.token_validator.validate(req);

    let rule = preliminary_match.ok_or(GatewayError::Forbidden)?;

    if rule.requires_auth && ctx.principal.is_none() {
        return Err(GatewayError::Unauthorized);
    }
    if let Some(principal) = &ctx.principal {
        if !principal.satisfies_roles(rule.required_roles.as_ref()) {
            return Err(GatewayError::Forbidden);
        }
    }

    ctx.matched_route = Some(rule.clone());
    ctx.upstream_name = Some(rule.upstream.clone());

    let has_auth_header = req.headers().contains_key("Authorization");
    let cacheable_request = state.cache.is_some() && Cache::is_cacheable_request(&ctx.method, has_auth_header);

    let (cache_key, cache_subject) = if cacheable_request {
        let vary_values: Vec<String> = Vec::new();
        Cache::compute_key(&rule.upstream, &ctx.method, &ctx.path, req.uri().query().unwrap_or(""), &vary_values)
    } else {
        (String::new(), String::new())
    };

    let mut fetch_guard = None;
    if cacheable_request {
        if let Some(cache) = &state.cache {
            match cache.get_or_lock(&cache_key).await {
                CacheLookup::Hit(entry) => {
                    ctx.from_cache = true;
                    return Ok(build_cached_response(entry));
                }
                CacheLookup::Miss(guard) => fetch_guard = Some(guard),
            }
        }
    }

    let body = read_body_capped(payload, state.config.gate.max_payload_size_bytes).await?;
    let (response, cache_material) = state
        .forwarder
        .forward(req, &rule, body, &ctx.correlation_id, cacheable_request, ctx.principal.as_ref())
        .await?;

    if let (Some(cache), Some(guard)) = (&state.cache, fetch_guard) {
        match cache_material
            .filter(|m| Cache::is_cacheable_response(m.status, header_value(&m.headers, "cache-control").as_deref()))
        {
            Some(material) => {
                let ttl_secs = Cache::resolve_ttl_secs(
                    header_value(&material.headers, "cache-control").as_deref(),
                    state.config.gate.cache_expiration_minutes * 60,
                );
                let now = chrono::Utc::now();
                let entry = crate::models::cache_entry::CacheEntry {
                    key: cache_key,
                    status: material.status,
                    headers: material.headers,
                    body: material.body,
                    stored_at: now,
                    expires_at: now + chrono::Duration::seconds(ttl_secs as i64),
                };
                cache.complete(guard, entry, cache_subject);
            }
            None => drop(guard),
        }
    }

    Ok(response)
}

fn header_value(headers: &[(String, String)], name: &str) -> Option<String> {
    headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.clone())
}

async fn read_body_capped(payload: &mut web::Payload, limit: usize) -> Result<web::Bytes, GatewayError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| GatewayError::BadRequest(format!("error reading request body: {}", e)))?;
        if buf.len() + chunk.len() > limit {
            return Err(GatewayError::PayloadTooLarge(buf.len() + chunk.len()));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn build_cached_response(entry: crate::models::cache_entry::CacheEntry) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(entry.status).unwrap_or(actix_web::http::StatusCode::OK);
    let mut builder = HttpResponse::build(status);
    for (name, value) in &entry.headers {
        if let (Ok(header_name), Ok(header_value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            builder.insert_header((header_name, header_value));
        }
    }
    builder.insert_header(("X-Cache", "HIT"));
    builder.body(entry.body)
}
