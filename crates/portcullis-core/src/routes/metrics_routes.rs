//! Prometheus-text metrics endpoint.
//!
//! Request counters plus one gauge line per upstream circuit breaker,
//! sourced from
//! [`crate::services::circuit_breaker::CircuitBreakerRegistry::snapshot`].

use crate::services::circuit_breaker::CircuitState;
use crate::services::forwarder::Forwarder;
use actix_web::{web, HttpResponse, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct MetricsCollector {
    pub requests_total: Arc<AtomicU64>,
    pub requests_success: Arc<AtomicU64>,
    pub requests_error: Arc<AtomicU64>,
    pub response_time_sum_ms: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            requests_success: Arc::new(AtomicU64::new(0)),
            requests_error: Arc::new(AtomicU64::new(0)),
            response_time_sum_ms: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn record_request(&self, success: bool, response_time: Duration) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.response_time_sum_ms.fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);
        if success {
            self.requests_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn circuit_state_label(state: CircuitState) -> &'static str {
    match state {
        CircuitState::Closed => "closed",
        CircuitState::Open => "open",
        CircuitState::HalfOpen => "half_open",
    }
}

pub async fn metrics(
    metrics: web::Data<MetricsCollector>,
    forwarder: web::Data<Arc<Forwarder>>,
) -> Result<HttpResponse> {
    let total = metrics.requests_total.load(Ordering::Relaxed);
    let success = metrics.requests_success.load(Ordering::Relaxed);
    let error = metrics.requests_error.load(Ordering::Relaxed);
    let response_time_sum = metrics.response_time_sum_ms.load(Ordering::Relaxed);
    let uptime = metrics.start_time.elapsed().as_secs();

    let avg_response_time = if total > 0 { response_time_sum as f64 / total as f64 } else { 0.0 };
    let success_rate = if total > 0 { (success as f64 / total as f64) * 100.0 } else { 100.0 };

    let mut breaker_lines = String::new();
    breaker_lines.push_str("# HELP portcullis_circuit_breaker_state Circuit breaker state (0=closed, 1=open, 2=half_open)\n");
    breaker_lines.push_str("# TYPE portcullis_circuit_breaker_state gauge\n");
    for (upstream, state, failures) in forwarder.breaker_snapshot() {
        breaker_lines.push_str(&format!(
            "portcullis_circuit_breaker_state{{upstream=\"{}\",state=\"{}\"}} {}\n",
            upstream,
            circuit_state_label(state),
            state as u8
        ));
        breaker_lines.push_str(&format!(
            "portcullis_circuit_breaker_failures{{upstream=\"{}\"}} {}\n",
            upstream, failures
        ));
    }

    let metrics_text = format!(
        r#"# HELP portcullis_requests_total Total number of HTTP requests handled
# TYPE portcullis_requests_total counter
portcullis_requests_total {total}

# HELP portcullis_requests_success_total Total number of successful HTTP requests
# TYPE portcullis_requests_success_total counter
portcullis_requests_success_total {success}

# HELP portcullis_requests_error_total Total number of failed HTTP requests
# TYPE portcullis_requests_error_total counter
portcullis_requests_error_total {error}

# HELP portcullis_response_time_avg_ms Average response time in milliseconds
# TYPE portcullis_response_time_avg_ms gauge
portcullis_response_time_avg_ms {avg_response_time:.2}

# HELP portcullis_success_rate Success rate percentage
# TYPE portcullis_success_rate gauge
portcullis_success_rate {success_rate:.2}

# HELP portcullis_uptime_seconds Service uptime in seconds
# TYPE portcullis_uptime_seconds counter
portcullis_uptime_seconds {uptime}

{breaker_lines}"#
    );

    Ok(HttpResponse::Ok().content_type("text/plain; version=0.0.4; charset=utf-8").body(metrics_text))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics));
}
