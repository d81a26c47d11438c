//! Integration tests for YAML configuration loading and its hardening
//! (env var resolution, malformed input, path traversal protection, file
//! size cap).

use once_cell::sync::Lazy;
use portcullis_core::config::settings::load_settings;
use std::env;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn minimal_config_yaml() -> String {
    r#"
gate:
  services:
    orders: "http://localhost:9001"
  allowedRoutes:
    - pathPrefix: "/api/orders"
      methods: ["GET"]
      upstream: "orders"
"#
    .to_string()
}

/// `load_settings` requires the resolved path to stay within the current
/// working directory, so these fixtures are created in-tree rather than
/// under `/tmp`.
fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new_in(".").unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_a_well_formed_config_from_the_env_path() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let file = write_config(&minimal_config_yaml());
    env::set_var("PORTCULLIS_CONFIG_PATH", file.path());

    let result = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    let config = result.expect("well-formed config should load");
    assert_eq!(config.gate.services.get("orders").map(String::as_str), Some("http://localhost:9001"));
    assert_eq!(config.routes().len(), 1);
}

#[test]
fn missing_config_file_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    env::set_var("PORTCULLIS_CONFIG_PATH", "./this-file-does-not-exist.yaml");

    let result = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Cannot resolve config path"));
}

#[test]
fn malformed_yaml_is_an_error() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let file = write_config("gate: [this is not, a valid, mapping");
    env::set_var("PORTCULLIS_CONFIG_PATH", file.path());

    let result = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("Invalid YAML"));
}

#[test]
fn oversized_config_file_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let mut file = NamedTempFile::new_in(".").unwrap();
    let oversized = "# ".to_string() + &"x".repeat(11 * 1024 * 1024);
    file.write_all(oversized.as_bytes()).unwrap();
    file.flush().unwrap();
    env::set_var("PORTCULLIS_CONFIG_PATH", file.path());

    let result = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    let err = result.unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[test]
fn path_traversal_outside_working_directory_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    env::set_var("PORTCULLIS_CONFIG_PATH", "../../../../etc/passwd");

    let result = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    let err = result.unwrap_err().to_string();
    assert!(err.contains("Cannot resolve config path") || err.contains("outside working directory"));
}

#[test]
fn redis_connection_string_is_accepted_but_does_not_fail_loading() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let yaml = format!("{}\nredis:\n  connectionString: \"redis://localhost:6379\"\n", minimal_config_yaml());
    let file = write_config(&yaml);
    env::set_var("PORTCULLIS_CONFIG_PATH", file.path());

    let result = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    let config = result.expect("a configured-but-unsupported redis backend should still load");
    assert_eq!(config.redis.connection_string, "redis://localhost:6379");
}

#[test]
fn multi_route_config_preserves_order_and_fields() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let yaml = r#"
gate:
  services:
    orders: "http://localhost:9001"
    users: "http://localhost:9002"
  allowedRoutes:
    - pathPrefix: "/api/orders"
      methods: ["GET", "POST"]
      upstream: "orders"
      requiresAuth: true
    - pathPrefix: "/api/users/{id}"
      methods: ["GET"]
      upstream: "users"
"#;
    let file = write_config(yaml);
    env::set_var("PORTCULLIS_CONFIG_PATH", file.path());

    let result = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    let config = result.expect("multi-route config should load");
    assert_eq!(config.routes().len(), 2);
    assert!(config.routes()[0].requires_auth);
    assert!(!config.routes()[1].requires_auth);
}

#[test]
fn current_directory_is_unchanged_after_loading() {
    let _lock = ENV_MUTEX.lock().unwrap();
    let original_dir = env::current_dir().unwrap();

    let file = write_config(&minimal_config_yaml());
    env::set_var("PORTCULLIS_CONFIG_PATH", file.path());
    let _ = load_settings();
    env::remove_var("PORTCULLIS_CONFIG_PATH");

    assert_eq!(original_dir, env::current_dir().unwrap());
}
