//! Driver registry
//!
//! Maps lower-case driver identifiers to the factories that build them. The
//! built-in registry knows `s3`, `cf` and `local` (per enabled feature); hosts
//! may register further adapters at start-up.

use std::collections::HashMap;
use std::sync::Arc;

use stratus_core::{DriverConfig, StorageError, StorageResult};

use crate::traits::Driver;

/// Builds driver instances for one backend.
pub trait DriverFactory: Send + Sync {
    /// Registry identifier, lower-case
    fn driver_type(&self) -> &'static str;

    fn create_driver(&self, config: DriverConfig) -> StorageResult<Box<dyn Driver>>;
}

/// Registry of available drivers
#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in driver enabled at compile time.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "storage-s3")]
        registry.register(Arc::new(crate::s3::S3DriverFactory::default()));
        #[cfg(feature = "storage-cloudfiles")]
        registry.register(Arc::new(crate::cloudfiles::CloudFilesDriverFactory::default()));
        #[cfg(feature = "storage-local")]
        registry.register(Arc::new(crate::local::LocalDriverFactory));
        registry
    }

    /// Register a factory under its lower-cased identifier, replacing any
    /// earlier registration.
    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        let id = factory.driver_type().trim().to_lowercase();
        tracing::debug!(driver = %id, "Registering storage driver");
        self.factories.insert(id, factory);
    }

    pub fn contains(&self, driver: &str) -> bool {
        self.factories.contains_key(&driver.trim().to_lowercase())
    }

    /// Registered identifiers, sorted
    pub fn drivers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Build the driver named by `config.driver`.
    ///
    /// Unknown identifiers fail with `InvalidDriver` without constructing
    /// anything.
    pub fn create(&self, config: DriverConfig) -> StorageResult<Box<dyn Driver>> {
        let resolved = config.driver_id();
        let factory = self.factories.get(&resolved).ok_or_else(|| {
            tracing::warn!(
                requested = %config.driver,
                resolved = %resolved,
                "Unknown storage driver"
            );
            StorageError::InvalidDriver {
                requested: config.driver.clone(),
                resolved: resolved.clone(),
            }
        })?;

        factory.create_driver(config)
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::{ConfigLayer, ErrorKind, StorageSettings};

    fn config(driver: &str) -> DriverConfig {
        StorageSettings::default().resolve("", &ConfigLayer::new().with("driver", driver))
    }

    #[test]
    fn test_builtin_drivers() {
        let registry = DriverRegistry::with_builtin();
        assert_eq!(registry.drivers(), vec!["cf", "local", "s3"]);
        assert!(registry.contains(" S3 "));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let driver = DriverRegistry::with_builtin().create(config("LOCAL")).unwrap();
        assert_eq!(driver.name(), "local");
        assert_eq!(driver.get_config("driver"), Some("LOCAL".into()));
    }

    #[test]
    fn test_unknown_driver() {
        let err = DriverRegistry::with_builtin()
            .create(config("Dropbox"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidDriver);
        assert_eq!(
            err,
            StorageError::InvalidDriver {
                requested: "Dropbox".into(),
                resolved: "dropbox".into(),
            }
        );
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let err = DriverRegistry::new().create(config("s3")).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidDriver);
    }
}
