use super::*;
use clap::Parser;

#[test]
fn defaults_are_memory_backend_on_localhost() {
    let config = Config::parse_from(["fastloop"]);
    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.port, 8000);
    assert_eq!(config.state_type, StateBackend::Memory);
}

#[test]
fn redis_config_url_without_password() {
    let config = Config::parse_from(["fastloop", "--redis-host", "cache.internal", "--redis-port", "6380"]);
    let url = config.redis_config().url();
    assert_eq!(url, "redis://cache.internal:6380/0");
}

#[test]
fn redis_config_url_with_password_and_ssl() {
    let config = Config::parse_from([
        "fastloop",
        "--redis-host",
        "cache.internal",
        "--redis-password",
        "secret",
        "--redis-ssl",
        "true",
    ]);
    let url = config.redis_config().url();
    assert_eq!(url, "rediss://:secret@cache.internal:6379/0");
}

#[test]
fn merge_file_fills_in_only_unset_fields() {
    let mut config = Config::parse_from(["fastloop", "--port", "9001"]);
    let file = FileConfig {
        host: Some("10.0.0.5".to_string()),
        port: Some(7000),
        redis: None,
    };
    config.merge_file(&file);
    assert_eq!(config.host, "10.0.0.5");
    // explicit flag wins over file value
    assert_eq!(config.port, 9001);
}

#[test]
fn loop_delay_never_negative() {
    let config = Config::parse_from(["fastloop", "--loop-delay-s", "-5"]);
    assert_eq!(config.loop_delay(), std::time::Duration::from_secs(0));
}
