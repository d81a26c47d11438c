//! Portcullis API Gateway Server
//!
//! Binary entry point: loads and validates configuration, builds the shared
//! gateway state once, and runs an `actix-web` `HttpServer` whose single
//! catch-all route hands every request to [`portcullis_core::pipeline::handle_request`].

use portcullis_core::config::settings::load_settings;
use portcullis_core::config::validation::ConfigValidator;
use portcullis_core::logs::logger::configure_logger;
use portcullis_core::middleware::security::security_headers;
use portcullis_core::pipeline::{handle_request, GatewayState};
use portcullis_core::routes::metrics_routes::MetricsCollector;
use portcullis_core::routes::{health_routes, info_routes, metrics_routes};
use portcullis_core::services::token_validator::TokenValidator;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let config = match load_settings() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting Portcullis API Gateway v{}", env!("CARGO_PKG_VERSION"));

    let validation_result = ConfigValidator::validate_comprehensive(&config);
    for warning in &validation_result.warnings {
        log::warn!("{}", warning);
    }
    if !validation_result.is_valid {
        error!("Configuration validation failed:");
        for err in &validation_result.errors {
            error!("  - {}", err);
        }
        std::process::exit(1);
    }
    info!("Configuration validated successfully with {} warnings", validation_result.warnings.len());

    let token_validator = match TokenValidator::from_config(&config.jwt) {
        Ok(validator) => validator,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let host = std::env::var("PORTCULLIS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("PORTCULLIS_PORT")
        .unwrap_or_else(|_| "8100".to_string())
        .parse::<u16>()
        .unwrap_or(8100);

    let state = Arc::new(GatewayState::new(config, token_validator));
    let health = state.health.clone();
    let forwarder = state.forwarder.clone();
    let metrics_collector = MetricsCollector::default();
    let start_time = Instant::now();

    info!("Listening on {}:{}", host, port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(health.clone()))
            .app_data(web::Data::new(forwarder.clone()))
            .app_data(web::Data::new(metrics_collector.clone()))
            .app_data(web::Data::new(start_time))
            .wrap(security_headers())
            .configure(health_routes::configure)
            .configure(metrics_routes::configure)
            .configure(info_routes::configure)
            .default_service(web::route().to(catch_all))
    })
    .bind((host.as_str(), port))?
    .run();

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => error!("Server error: {}", e),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
        }
    }

    Ok(())
}

async fn catch_all(
    state: web::Data<Arc<GatewayState>>,
    metrics: web::Data<MetricsCollector>,
    req: HttpRequest,
    payload: web::Payload,
) -> HttpResponse {
    handle_request(&state, req, payload, &metrics).await
}
