//! Configuration loading tests
//!
//! Run with: `cargo test --test config_tests`

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use employee_gateway::Error;
use employee_gateway::config::{BackoffConfig, Config};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_file() {
    let file = write_config(
        r#"
server:
  host: 0.0.0.0
  port: 9000
  shutdown_timeout: 5s
upstream:
  base_url: http://upstream:8112/api/v1/employee
  connect_timeout: 2s
  request_timeout: 90s
  headers:
    x-tenant: acme
retry:
  enabled: true
  max_attempts: 20
  backoff:
    mode: fixed
    interval: 1s
cache:
  enabled: true
  ttl: 5m
observability:
  log_bodies: false
"#,
    );

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.shutdown_timeout, Duration::from_secs(5));
    assert_eq!(config.upstream.base_url, "http://upstream:8112/api/v1/employee");
    assert_eq!(config.upstream.request_timeout, Duration::from_secs(90));
    assert_eq!(config.upstream.headers.get("x-tenant").map(String::as_str), Some("acme"));
    assert_eq!(config.retry.max_attempts, 20);
    assert_eq!(
        config.retry.backoff,
        BackoffConfig::Fixed {
            interval: Duration::from_secs(1)
        }
    );
    assert_eq!(config.cache.ttl, Some(Duration::from_secs(300)));
    assert!(!config.observability.log_bodies);
}

#[test]
fn test_partial_file_keeps_defaults() {
    let file = write_config("retry:\n  max_attempts: 5\n");

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.retry.max_attempts, 5);
    assert!(config.retry.enabled);
    assert_eq!(config.retry.backoff, BackoffConfig::default());
    assert_eq!(config.server.port, 8111);
    assert_eq!(
        config.upstream.base_url,
        "http://localhost:8112/api/v1/employee"
    );
    assert!(config.cache.enabled);
}

#[test]
fn test_server_surface_from_file() {
    let file = write_config(
        r#"
server:
  base_path: /employees
  cors:
    allowed_origins:
      - https://hr.example.com
      - http://localhost:5173
    allow_credentials: false
"#,
    );

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(config.server.base_path, "/employees");
    assert_eq!(
        config.server.cors.allowed_origins,
        vec!["https://hr.example.com", "http://localhost:5173"]
    );
    assert!(!config.server.cors.allow_credentials);
    assert!(config.server.cors.enabled);
}

#[test]
fn test_server_surface_defaults() {
    let config = Config::default();
    assert_eq!(config.server.base_path, "/api/v1/employee");
    assert_eq!(config.server.cors.allowed_origins, vec!["http://localhost:3000"]);
    assert!(config.server.cors.allow_credentials);
}

#[test]
fn test_wildcard_origin_with_credentials_rejected() {
    let file = write_config("server:\n  cors:\n    allowed_origins: [\"*\"]\n");
    assert!(matches!(
        Config::load(Some(file.path())),
        Err(Error::Config(msg)) if msg.contains("allow_credentials")
    ));
}

#[test]
fn test_exponential_backoff_from_file() {
    let file = write_config(
        "retry:\n  backoff:\n    mode: exponential\n    initial_interval: 500ms\n    multiplier: 3.0\n    max_interval: 30s\n",
    );

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(
        config.retry.backoff,
        BackoffConfig::Exponential {
            initial_interval: Duration::from_millis(500),
            multiplier: 3.0,
            max_interval: Duration::from_secs(30),
        }
    );
}

#[test]
fn test_missing_file_is_config_error() {
    let result = Config::load(Some(Path::new("/definitely/not/here/gateway.yaml")));
    assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("not found")));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let file = write_config("retry:\n  max_attempts: 0\n");
    assert!(matches!(
        Config::load(Some(file.path())),
        Err(Error::Config(_))
    ));

    let file = write_config("upstream:\n  base_url: not a url\n");
    assert!(matches!(
        Config::load(Some(file.path())),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_unknown_backoff_mode_rejected() {
    let file = write_config("retry:\n  backoff:\n    mode: random\n");
    assert!(Config::load(Some(file.path())).is_err());
}

#[test]
fn test_header_placeholder_default_expanded() {
    let file = write_config(
        "upstream:\n  headers:\n    authorization: \"Bearer ${EMPLOYEE_GATEWAY_TEST_UNSET_TOKEN:-anonymous}\"\n",
    );

    let config = Config::load(Some(file.path())).unwrap();

    assert_eq!(
        config.upstream.headers.get("authorization").map(String::as_str),
        Some("Bearer anonymous")
    );
}

#[test]
fn test_effective_config_round_trips_through_yaml() {
    let mut config = Config::default();
    config.cache.ttl = Some(Duration::from_secs(30));

    let yaml = serde_yaml::to_string(&config).unwrap();
    let file = write_config(&yaml);
    let reloaded = Config::load(Some(file.path())).unwrap();

    assert_eq!(reloaded.cache.ttl, Some(Duration::from_secs(30)));
    assert_eq!(reloaded.retry.backoff, config.retry.backoff);
}
