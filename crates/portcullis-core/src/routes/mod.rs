//! Observable endpoints that sit beside the proxy pipeline: health, metrics,
//! and build info. These are intercepted before the catch-all route ever
//! consults the route matcher — see [`crate::utils::path`]'s system-path
//! handling.
//!
//! - [`health_routes`] - liveness/readiness/aggregate health for orchestrators
//! - [`metrics_routes`] - Prometheus-text metrics
//! - [`info_routes`] - version/uptime/build metadata

pub mod health_routes;
pub mod info_routes;
pub mod metrics_routes;
