//! Loading the facade from the process environment. Kept in its own binary
//! because it sets process-wide variables.

use stratus_storage::{CloudStorage, ConfigLayer};

#[test]
fn test_from_env_surfaces_settings_file_errors() {
    let dir = tempfile::tempdir().unwrap();

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ \"setups\": ").unwrap();
    std::env::set_var("CLOUD_STORAGE_CONFIG", &broken);
    assert!(CloudStorage::from_env().is_err());

    std::env::set_var("CLOUD_STORAGE_CONFIG", dir.path().join("missing.json"));
    assert!(CloudStorage::from_env().is_err());

    let valid = dir.path().join("storage.json");
    std::fs::write(
        &valid,
        r#"{ "setups": { "media": { "driver": "local", "container": "inbox" } } }"#,
    )
    .unwrap();
    std::env::set_var("CLOUD_STORAGE_CONFIG", &valid);
    let storage = CloudStorage::from_env().unwrap();
    std::env::remove_var("CLOUD_STORAGE_CONFIG");

    let config = storage.resolve("media", &ConfigLayer::new());
    assert_eq!(config.driver, "local");
    assert_eq!(config.container, "inbox");
}
