#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use garden_core::GardenError;
use garden_hub::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
hub:
  port: 9000
  allowed_originz: "*" # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(matches!(err, GardenError::Malformed(_)));
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.hub.port, 8787);
    assert_eq!(cfg.hub.port_attempts, 5);
    assert_eq!(cfg.hub.allowed_origins, "*");
}

#[test]
fn version_is_gated() {
    let err = config::load_from_str("version: 2").expect_err("must fail");
    assert!(matches!(err, GardenError::UnsupportedVersion));
}

#[test]
fn port_attempts_range_is_enforced() {
    let bad = r#"
version: 1
hub:
  port_attempts: 0
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(matches!(err, GardenError::Malformed(_)));
}

#[test]
fn env_overrides_apply_after_parsing() {
    let mut cfg = config::load_from_str("version: 1").unwrap();
    std::env::set_var("GARDEN_HUB_HOST", "127.0.0.1");
    std::env::set_var("GARDEN_HUB_PORT", "9100");
    std::env::set_var("GARDEN_HUB_ORIGINS", "https://garden.example");
    config::apply_env_overrides(&mut cfg).unwrap();
    std::env::remove_var("GARDEN_HUB_HOST");
    std::env::remove_var("GARDEN_HUB_PORT");
    std::env::remove_var("GARDEN_HUB_ORIGINS");

    assert_eq!(cfg.hub.host, "127.0.0.1");
    assert_eq!(cfg.hub.port, 9100);
    assert_eq!(cfg.hub.allowed_origins, "https://garden.example");
}
