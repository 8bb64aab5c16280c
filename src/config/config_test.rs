use super::*;

#[test]
fn defaults_are_valid() {
    let settings = Settings::default();
    settings.validate().unwrap();

    assert_eq!(settings.tailer.max_read_retries, 5);
    assert_eq!(settings.tailer.initial_backoff_ms, 50);
    assert_eq!(settings.tailer.max_backoff_ms, 5_000);
    assert_eq!(settings.storage.flush_every_ms, Some(500));
}

#[test]
fn load_without_sources_yields_defaults() {
    let settings = Settings::load(None).unwrap();
    assert_eq!(settings.tailer.max_read_retries, 5);
}

#[test]
fn zero_retries_are_rejected() {
    let config = TailerConfig {
        max_read_retries: 0,
        ..TailerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn inverted_backoff_bounds_are_rejected() {
    let config = TailerConfig {
        initial_backoff_ms: 10_000,
        max_backoff_ms: 100,
        ..TailerConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn zero_cache_capacity_is_rejected() {
    let config = StorageConfig {
        cache_capacity_bytes: 0,
        ..StorageConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn environment_overrides_defaults() {
    temp_env::with_var(
        "NODE_REAPER__TAILER__MAX_READ_RETRIES",
        Some("9"),
        || {
            let settings = Settings::load(None).unwrap();
            assert_eq!(settings.tailer.max_read_retries, 9);
            // Untouched sections keep their defaults.
            assert_eq!(settings.tailer.initial_backoff_ms, 50);
        },
    );
}

#[test]
fn invalid_environment_values_fail_validation() {
    temp_env::with_var(
        "NODE_REAPER__TAILER__MAX_READ_RETRIES",
        Some("0"),
        || {
            assert!(Settings::load(None).is_err());
        },
    );
}
