//! YAML configuration schema and the hardened file loader.
//!
//! Configuration is a single YAML document with four top-level sections:
//! `gate` (services, route table, payload/timeout defaults), `jwt` (token
//! validation parameters), `redis` (optional external cache backend — not
//! implemented, see [`RedisSection`]), and `health_checks` (prober cadence).

use crate::models::route_rule::{RouteRule, Services};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_payload_bytes() -> usize {
    1024 * 1024
}

fn default_cache_expiration_minutes() -> u64 {
    5
}

fn default_check_interval_seconds() -> u64 {
    30
}

fn default_unhealthy_timeout_seconds() -> u64 {
    10
}

/// `Gate` section: services table, route table, and gateway-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSection {
    pub services: Services,
    #[serde(default)]
    pub allowed_routes: Vec<RouteRule>,
    #[serde(default = "default_timeout_seconds")]
    pub default_timeout_seconds: u64,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_size_bytes: usize,
    #[serde(default)]
    pub enable_caching: bool,
    #[serde(default = "default_cache_expiration_minutes")]
    pub cache_expiration_minutes: u64,
    /// Shared secret forwarded to upstreams as `X-Gateway-Secret`, if set.
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_true() -> bool {
    true
}

/// `Jwt` section: symmetric-key validation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtSection {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_true")]
    pub validate_issuer: bool,
    #[serde(default = "default_true")]
    pub validate_audience: bool,
    #[serde(default = "default_true")]
    pub validate_lifetime: bool,
    #[serde(default = "default_true")]
    pub validate_issuer_signing_key: bool,
}

impl Default for JwtSection {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: None,
            audience: None,
            validate_issuer: true,
            validate_audience: true,
            validate_lifetime: true,
            validate_issuer_signing_key: true,
        }
    }
}

/// `Redis` section: an external cache backend this crate accepts in
/// configuration for forward-compatibility but does not implement. A
/// non-empty connection string is logged as a warning at boot and the
/// in-memory cache is used regardless (see SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RedisSection {
    #[serde(default)]
    pub connection_string: String,
}

/// `HealthChecks` section: background prober cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChecksSection {
    #[serde(default = "default_check_interval_seconds")]
    pub check_interval_seconds: u64,
    #[serde(default = "default_unhealthy_timeout_seconds")]
    pub unhealthy_timeout_seconds: u64,
}

impl Default for HealthChecksSection {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval_seconds(),
            unhealthy_timeout_seconds: default_unhealthy_timeout_seconds(),
        }
    }
}

/// Top-level deserialize target for the gateway's YAML configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub gate: GateSection,
    #[serde(default)]
    pub jwt: JwtSection,
    #[serde(default)]
    pub redis: RedisSection,
    #[serde(default)]
    pub health_checks: HealthChecksSection,
}

impl GatewayConfig {
    pub fn routes(&self) -> &[RouteRule] {
        &self.gate.allowed_routes
    }

    pub fn services(&self) -> &Services {
        &self.gate.services
    }
}

/// Loads and validates the gateway's YAML configuration from the file system.
///
/// # Configuration File Location
///
/// 1. `PORTCULLIS_CONFIG_PATH` environment variable, if set
/// 2. Default: `./gateway.yaml` (relative to the current working directory)
///
/// # Security
///
/// Path traversal protection (the resolved path must stay within the working
/// directory), a 10MB file size cap, and path canonicalization before read.
pub fn load_settings() -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let config_path = std::env::var("PORTCULLIS_CONFIG_PATH")
        .unwrap_or_else(|_| "./gateway.yaml".to_string());

    debug!("Loading configuration from: {}", config_path);

    let path = Path::new(&config_path);
    if !path.exists() {
        return Err(format!("Cannot resolve config path '{}'", config_path).into());
    }

    let canonical_path = path
        .canonicalize()
        .map_err(|e| format!("Cannot resolve config path '{}': {}", config_path, e))?;

    let current_dir =
        std::env::current_dir().map_err(|e| format!("Cannot get current directory: {}", e))?;

    if !canonical_path.starts_with(&current_dir) {
        warn!("Config path '{}' is outside working directory", config_path);
        return Err("Config path outside working directory".into());
    }

    let metadata = fs::metadata(&canonical_path)
        .map_err(|e| format!("Cannot read config file metadata: {}", e))?;

    const MAX_CONFIG_SIZE: u64 = 10 * 1024 * 1024;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(format!(
            "Config file too large: {} bytes (max: {} bytes)",
            metadata.len(),
            MAX_CONFIG_SIZE
        )
        .into());
    }

    let config_data = fs::read_to_string(&canonical_path)
        .map_err(|e| format!("Cannot read config file: {}", e))?;

    let settings: GatewayConfig =
        serde_yaml::from_str(&config_data).map_err(|e| format!("Invalid YAML: {}", e))?;

    if !settings.redis.connection_string.is_empty() {
        warn!(
            "redis.connection_string is configured but the Redis cache backend is not implemented; \
             falling back to the in-memory cache"
        );
    }

    debug!(
        "Successfully loaded configuration with {} routes and {} services",
        settings.gate.allowed_routes.len(),
        settings.gate.services.len()
    );

    Ok(settings)
}

/// `true` only when `PORTCULLIS_ENV` is explicitly set to `production`.
pub fn is_production() -> bool {
    std::env::var("PORTCULLIS_ENV").map(|v| v == "production").unwrap_or(false)
}
