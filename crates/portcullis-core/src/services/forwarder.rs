//! Forwards one gateway request to one upstream and streams the response back.
//!
//! A pooled `reqwest::Client` per backend, a `tokio::time::timeout` around
//! the send, and circuit-breaker-gated dispatch. Clients are kept in a
//! per-upstream table since timeouts and pool behavior are logically
//! per-upstream, not global, and every forwarded request carries the full
//! hop-by-hop header set stripped, plus injected `X-Gateway-Request-Id`,
//! `X-Gateway-Service`, `X-Gateway-Forwarded-For`, `X-Gateway-Original-Host`,
//! `X-Gateway-Timestamp`, an optional `X-Gateway-Secret`, and (when the
//! caller carries a [`Principal`]) `X-User-Id`/`X-User-Email`/`X-User-Name`/
//! `X-User-Role`.

use crate::models::error::GatewayError;
use crate::models::principal::Principal;
use crate::models::route_rule::{RouteRule, Services};
use crate::services::circuit_breaker::{CircuitBreakerError, CircuitBreakerRegistry, CircuitState};
use crate::services::retry::{backoff_for_attempt, is_idempotent, is_retryable_status, MAX_ATTEMPTS};
use crate::utils::path::join_upstream_url;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use dashmap::DashMap;
use log::{debug, warn};
use std::str::FromStr;
use std::time::Duration;

/// Request headers never forwarded upstream, and response headers never
/// forwarded back to the client — connection-scoped, not message-scoped.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Builds and shares one `reqwest::Client` per upstream, keyed by upstream
/// name so connection pools stay isolated between backends.
pub struct Forwarder {
    clients: DashMap<String, reqwest::Client>,
    services: Services,
    breakers: CircuitBreakerRegistry,
    default_timeout: Duration,
    gateway_secret: Option<String>,
}

impl Forwarder {
    pub fn new(
        services: Services,
        breakers: CircuitBreakerRegistry,
        default_timeout: Duration,
        gateway_secret: Option<String>,
    ) -> Self {
        Self { clients: DashMap::new(), services, breakers, default_timeout, gateway_secret }
    }

    fn client_for(&self, upstream: &str) -> reqwest::Client {
        if let Some(existing) = self.clients.get(upstream) {
            return existing.clone();
        }
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(120))
            .timeout(self.default_timeout)
            .build()
            .unwrap_or_default();
        self.clients.insert(upstream.to_string(), client.clone());
        client
    }

    /// Sends `body` to the upstream named by `rule.upstream`, retrying
    /// transient failures under the upstream's circuit breaker.
    ///
    /// When `buffer_for_cache` is set, the response body is read fully into
    /// memory instead of streamed, and a [`CacheMaterial`] snapshot is
    /// returned alongside the `HttpResponse` — cacheable requests are
    /// necessarily GET/HEAD and bounded, so buffering them is what makes
    /// populating the cache possible at all; every other response streams.
    pub async fn forward(
        &self,
        req: &HttpRequest,
        rule: &RouteRule,
        body: web::Bytes,
        correlation_id: &str,
        buffer_for_cache: bool,
        principal: Option<&Principal>,
    ) -> Result<(HttpResponse, Option<CacheMaterial>), GatewayError> {
        let base_url = self.services.get(&rule.upstream).ok_or_else(|| {
            GatewayError::Internal(format!("upstream '{}' has no configured base URL", rule.upstream))
        })?;

        let url = join_upstream_url(base_url, req.path(), req.uri().query());
        let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
            .map_err(|_| GatewayError::BadRequest("unsupported HTTP method".to_string()))?;
        let client = self.client_for(&rule.upstream);
        let breaker = self.breakers.get_or_insert(&rule.upstream);
        let retryable_method = is_idempotent(req.method().as_str());

        let mut last_err: Option<GatewayError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            let is_last_attempt = attempt + 1 == MAX_ATTEMPTS;
            if attempt > 0 {
                if !retryable_method {
                    break;
                }
                tokio::time::sleep(backoff_for_attempt(attempt - 1)).await;
            }

            let mut request = client.request(method.clone(), &url).body(body.clone());
            request = apply_forwarded_headers(
                request,
                req,
                &rule.upstream,
                correlation_id,
                self.gateway_secret.as_deref(),
                principal,
            );

            let upstream = rule.upstream.clone();
            let outcome = breaker.call(async { send_attempt(request).await }).await;

            match outcome {
                Ok(response) => return build_response(response, buffer_for_cache).await,
                Err(CircuitBreakerError::CircuitOpen) => {
                    return Err(GatewayError::ServiceUnavailable { upstream });
                }
                Err(CircuitBreakerError::OperationFailed(AttemptError::UpstreamStatus(response))) => {
                    let status = response.status().as_u16();
                    if is_last_attempt || !retryable_method {
                        return build_response(response, buffer_for_cache).await;
                    }
                    debug!("upstream '{}' returned retryable status {} on attempt {}", upstream, status, attempt);
                    last_err = Some(GatewayError::BadGateway { upstream });
                }
                Err(CircuitBreakerError::OperationFailed(AttemptError::Transport(send_err))) => {
                    warn!("forwarding to '{}' failed on attempt {}: {}", upstream, attempt, send_err);
                    last_err = Some(classify_send_error(&upstream, &send_err));
                    if !retryable_method {
                        break;
                    }
                }
            }
        }

        Err(last_err.unwrap_or(GatewayError::Internal("forwarding exhausted with no recorded error".to_string())))
    }

    /// Per-upstream `(state, failure_count)`, for the metrics endpoint.
    pub fn breaker_snapshot(&self) -> Vec<(String, CircuitState, u64)> {
        self.breakers.snapshot()
    }
}

/// The circuit breaker's unit of success/failure for one attempt: a
/// transport-level failure, or a response carrying one of the retryable
/// upstream statuses (429/502/503/504), both count as failures;
/// any other response status is a breaker success even if it's a 4xx/5xx the
/// client should still see.
enum AttemptError {
    Transport(reqwest::Error),
    UpstreamStatus(reqwest::Response),
}

async fn send_attempt(request: reqwest::RequestBuilder) -> Result<reqwest::Response, AttemptError> {
    let response = request.send().await.map_err(AttemptError::Transport)?;
    if is_retryable_status(response.status().as_u16()) {
        return Err(AttemptError::UpstreamStatus(response));
    }
    Ok(response)
}

fn classify_send_error(upstream: &str, err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::GatewayTimeout { upstream: upstream.to_string() }
    } else {
        GatewayError::BadGateway { upstream: upstream.to_string() }
    }
}

fn apply_forwarded_headers(
    mut request: reqwest::RequestBuilder,
    req: &HttpRequest,
    upstream: &str,
    correlation_id: &str,
    gateway_secret: Option<&str>,
    principal: Option<&Principal>,
) -> reqwest::RequestBuilder {
    for (name, value) in req.headers().iter() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        if let Ok(value_str) = value.to_str() {
            request = request.header(name.as_str(), value_str);
        }
    }

    request = request
        .header("X-Gateway-Request-Id", correlation_id)
        .header("X-Gateway-Service", upstream)
        .header("X-Gateway-Forwarded-For", client_ip(req))
        .header("X-Gateway-Original-Host", original_host(req))
        .header("X-Gateway-Timestamp", chrono::Utc::now().to_rfc3339());

    if let Some(secret) = gateway_secret {
        request = request.header("X-Gateway-Secret", secret);
    }

    if let Some(principal) = principal {
        request = request.header("X-User-Id", &principal.user_id);
        if let Some(email) = &principal.email {
            request = request.header("X-User-Email", email);
        }
        if let Some(name) = &principal.name {
            request = request.header("X-User-Name", name);
        }
        if !principal.roles.is_empty() {
            let roles = principal.roles.iter().cloned().collect::<Vec<_>>().join(",");
            request = request.header("X-User-Role", roles);
        }
    }

    request
}

fn original_host(req: &HttpRequest) -> String {
    req.headers()
        .get("Host")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| req.connection_info().host().to_string())
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info().peer_addr().unwrap_or("unknown").to_string()
}

/// A response snapshot suitable for [`crate::services::cache::Cache`]
/// storage — only produced when the forwarder was asked to buffer.
pub struct CacheMaterial {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: bytes::Bytes,
}

async fn build_response(
    response: reqwest::Response,
    buffer_for_cache: bool,
) -> Result<(HttpResponse, Option<CacheMaterial>), GatewayError> {
    if buffer_for_cache {
        build_buffered_response(response).await
    } else {
        Ok((build_streaming_response(response), None))
    }
}

fn build_streaming_response(response: reqwest::Response) -> HttpResponse {
    let status = actix_web::http::StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);

    let mut builder = HttpResponse::build(status);
    copy_response_headers(&response, &mut builder);
    builder.streaming(response.bytes_stream())
}

async fn build_buffered_response(
    response: reqwest::Response,
) -> Result<(HttpResponse, Option<CacheMaterial>), GatewayError> {
    let status = actix_web::http::StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY);

    let mut builder = HttpResponse::build(status);
    copy_response_headers(&response, &mut builder);

    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter(|(name, _)| !HOP_BY_HOP_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();

    let body = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Internal(format!("failed reading response body for caching: {}", e)))?;

    let material = CacheMaterial { status: status.as_u16(), headers, body: body.clone() };
    Ok((builder.body(body), Some(material)))
}

fn copy_response_headers(response: &reqwest::Response, builder: &mut actix_web::HttpResponseBuilder) {
    for (name, value) in response.headers().iter() {
        if HOP_BY_HOP_HEADERS.contains(&name.as_str().to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(header_name), Ok(header_value)) =
            (HeaderName::from_str(name.as_str()), HeaderValue::from_bytes(value.as_bytes()))
        {
            builder.insert_header((header_name, header_value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_filtered_case_insensitively() {
        assert!(HOP_BY_HOP_HEADERS.contains(&"connection"));
        assert!(HOP_BY_HOP_HEADERS.contains(&"transfer-encoding"));
        assert!(!HOP_BY_HOP_HEADERS.contains(&"content-type"));
    }
}
