//! Liveness, readiness, and aggregate health endpoints.
//!
//! Each handler reads live state from a shared [`HealthAggregator`] rather
//! than answering a static "healthy".

use crate::services::health::HealthAggregator;
use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use std::sync::Arc;

/// Always 200 while the process is accepting connections at all — does not
/// consult upstream health.
pub async fn liveness(start_time: web::Data<std::time::Instant>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "alive",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// 200 only if no upstream is reporting `Unhealthy`.
pub async fn readiness(health: web::Data<Arc<HealthAggregator>>) -> Result<HttpResponse> {
    let ready = health.is_ready();
    let status = if ready { HttpResponse::Ok() } else { HttpResponse::ServiceUnavailable() }
        .json(serde_json::json!({
            "status": if ready { "ready" } else { "not_ready" },
            "upstreams": health.all_snapshots(),
        }));
    Ok(status)
}

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    deep: Option<String>,
}

/// Aggregate health document. `?deep=true` forces a synchronous probe round
/// before answering instead of serving the last background-prober snapshot;
/// any other non-empty, non-boolean value for `deep` is a 400.
pub async fn health(
    health: web::Data<Arc<HealthAggregator>>,
    query: web::Query<HealthQuery>,
) -> Result<HttpResponse, crate::models::error::GatewayError> {
    if let Some(deep) = &query.deep {
        match deep.as_str() {
            "true" => health.probe_all().await,
            "false" => {}
            other => {
                return Err(crate::models::error::GatewayError::BadRequest(format!(
                    "invalid 'deep' query parameter: '{}' (expected 'true' or 'false')",
                    other
                )))
            }
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": health.aggregate_status(),
        "upstreams": health.all_snapshots(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health/live", web::get().to(liveness))
        .route("/health/ready", web::get().to(readiness))
        .route("/health", web::get().to(health));
}
