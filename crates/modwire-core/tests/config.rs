use std::time::Duration;

use modwire_core::config::ResolverConfig;

#[test]
fn defaults() {
    let config = ResolverConfig::default();
    assert_eq!(config.max_multiple_suppliers, 10);
    assert!(!config.relaxed);
    assert!(config.preferred_module.is_none());
}

#[test]
fn derived_timeout_grows_with_batch_and_is_capped() {
    let config = ResolverConfig::default();
    assert_eq!(config.search_timeout(0), Duration::from_secs(30));
    assert_eq!(config.search_timeout(100), Duration::from_millis(33_000));
    assert_eq!(config.search_timeout(1_000_000), Duration::from_secs(90));
}

#[test]
fn explicit_timeout_overrides_derivation() {
    let config = ResolverConfig::parse_toml("timeout-ms = 250").unwrap();
    assert_eq!(config.search_timeout(1_000), Duration::from_millis(250));
}

#[test]
fn parse_all_fields() {
    let config = ResolverConfig::parse_toml(
        r#"
timeout-ms = 1000
max-multiple-suppliers = 3
preferred-module = "system"
relaxed = true
"#,
    )
    .unwrap();
    assert_eq!(config.max_multiple_suppliers, 3);
    assert_eq!(config.preferred_module.as_deref(), Some("system"));
    assert!(config.relaxed);
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ResolverConfig::load(&dir.path().join("modwire.toml")).unwrap();
    assert_eq!(config.max_multiple_suppliers, 10);
}

#[test]
fn invalid_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("modwire.toml");
    std::fs::write(&path, "timeout-ms = \"soon\"").unwrap();
    let err = ResolverConfig::load(&path).unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}
