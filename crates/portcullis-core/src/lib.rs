//! # Portcullis
//!
//! An async HTTP API gateway built with Rust and Actix Web. Portcullis sits
//! in front of a set of upstream HTTP services and handles the concerns each
//! of them would otherwise duplicate: route matching, bearer-token
//! validation, rate limiting, response caching, retries, and per-upstream
//! circuit breaking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use portcullis_core::config::settings::load_settings;
//! use portcullis_core::config::validation::ConfigValidator;
//! use portcullis_core::services::token_validator::TokenValidator;
//! use portcullis_core::pipeline::GatewayState;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_settings()?;
//! let result = ConfigValidator::validate_comprehensive(&config);
//! if !result.is_valid {
//!     return Err(result.errors.join("; ").into());
//! }
//!
//! let token_validator = TokenValidator::from_config(&config.jwt)?;
//! let _state = GatewayState::new(config, token_validator);
//! # Ok(())
//! # }
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! Client ─▶ CORS preflight ─▶ rate limit ─▶ token validate ─▶ route match
//!           /authorize ─▶ cache lookup ─▶ forward (retry + circuit breaker)
//!           ─▶ cache store ─▶ response
//! ```
//!
//! Every stage above lives in [`pipeline::ingress::run_pipeline`]; each box
//! is a service module under [`services`] rather than a middleware stack, so
//! the order is explicit and impossible to reorder by accident.
//!
//! ## Module Organization
//!
//! - [`config`] - YAML configuration schema, loading, and validation
//! - [`models`] - Data models: route rules, principals, cache entries, errors
//! - [`services`] - Business logic: routing, auth, caching, rate limiting,
//!   circuit breaking, retries, forwarding, health aggregation
//! - [`pipeline`] - The single request-handling entry point
//! - [`middleware`] - Cross-cutting concerns outside the main pipeline
//! - [`routes`] - Health, metrics, and info endpoints
//! - [`utils`] - Small shared helpers
//! - [`logs`] - Structured logging setup
//!
//! ## Environment Variables
//!
//! - `PORTCULLIS_CONFIG_PATH`: configuration file path (default: `./gateway.yaml`)
//! - `PORTCULLIS_HOST`: server bind address (default: `0.0.0.0`)
//! - `PORTCULLIS_PORT`: server port (default: `8100`)
//! - `PORTCULLIS_ENV`: set to `production` to require a configured JWT secret
//! - `NO_COLOR`: disable colored log output

pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod services;
pub mod utils;
