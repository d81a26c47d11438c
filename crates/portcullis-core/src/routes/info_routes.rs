//! Version/uptime/build info, kept as its own endpoint distinct from
//! `/health` since it carries static build metadata rather than liveness
//! state.

use actix_web::{web, HttpResponse, Result};
use std::time::Instant;

pub async fn info(start_time: web::Data<Instant>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": start_time.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/info", web::get().to(info));
}
