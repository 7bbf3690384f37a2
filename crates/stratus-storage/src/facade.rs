//! Storage facade
//!
//! [`CloudStorage`] pairs the settings with a driver registry and forges
//! configured drivers:
//!
//! ```no_run
//! use stratus_storage::{CloudStorage, ConfigLayer};
//!
//! # fn main() -> Result<(), stratus_storage::StorageError> {
//! let driver = CloudStorage::global().forge(
//!     "s3",
//!     ConfigLayer::new()
//!         .with("access_key", "K")
//!         .with("access_secret", "S")
//!         .with("container", "bucket1"),
//! )?;
//! assert_eq!(driver.get_config("container"), Some("bucket1".into()));
//! # Ok(())
//! # }
//! ```

use std::sync::OnceLock;

use stratus_core::{ConfigLayer, DriverConfig, Setup, StorageResult, StorageSettings};

use crate::factory::DriverRegistry;
use crate::traits::Driver;

static GLOBAL: OnceLock<CloudStorage> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct CloudStorage {
    settings: StorageSettings,
    registry: DriverRegistry,
}

impl CloudStorage {
    pub fn new(settings: StorageSettings, registry: DriverRegistry) -> Self {
        Self { settings, registry }
    }

    /// Facade over the built-in drivers.
    pub fn from_settings(settings: StorageSettings) -> Self {
        Self::new(settings, DriverRegistry::with_builtin())
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    pub fn registry(&self) -> &DriverRegistry {
        &self.registry
    }

    /// Effective configuration for `setup` plus `overrides`.
    pub fn resolve(&self, setup: impl Into<Setup>, overrides: &ConfigLayer) -> DriverConfig {
        self.settings.resolve(setup, overrides)
    }

    /// Build a driver for `setup` with `overrides` applied last.
    pub fn forge(
        &self,
        setup: impl Into<Setup>,
        overrides: ConfigLayer,
    ) -> StorageResult<Box<dyn Driver>> {
        let config = self.resolve(setup, &overrides);
        let driver = self.registry.create(config)?;

        tracing::debug!(
            driver = driver.name(),
            container = %driver.config().container,
            "Storage driver forged"
        );

        Ok(driver)
    }

    /// Facade over the built-in drivers with settings from the environment.
    ///
    /// Unlike [`CloudStorage::global`] this surfaces a missing or malformed
    /// `CLOUD_STORAGE_CONFIG` file. Hosts that must not run on built-in
    /// defaults can `CloudStorage::from_env()?.install()` at start-up.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::from_settings(StorageSettings::from_env()?))
    }

    /// Install this facade as the process-wide instance.
    ///
    /// Fails, handing the facade back, when one is already installed.
    pub fn install(self) -> Result<(), Self> {
        GLOBAL.set(self)
    }

    /// Process-wide facade. Built with [`CloudStorage::from_env`] on first
    /// use unless [`CloudStorage::install`] ran earlier.
    ///
    /// When the settings cannot be loaded the facade falls back to the
    /// built-in settings (an `s3` driver with no credentials or container)
    /// and logs a warning. Every operation of the default driver then fails
    /// with its own error kind rather than at start-up.
    pub fn global() -> &'static CloudStorage {
        GLOBAL.get_or_init(|| {
            Self::from_env().unwrap_or_else(|e| {
                tracing::warn!(
                    error = %e,
                    "Failed to load storage settings, using built-in defaults"
                );
                Self::default()
            })
        })
    }
}

impl Default for CloudStorage {
    fn default() -> Self {
        Self::from_settings(StorageSettings::default())
    }
}
