//! Driver contract
//!
//! This module defines the Driver trait that all storage backends must implement.

use std::path::Path;

use async_trait::async_trait;
use stratus_core::{ConfigValue, DriverConfig, ErrorKind, FailureOrigin, ObjectEntry};
use stratus_core::{StorageError, StorageResult};

/// Object-storage driver
///
/// One instance owns one [`DriverConfig`]. Configuration is mutated through
/// `&mut self`, so an instance shared between tasks has to be wrapped in a lock
/// by the caller (see [`crate::shared`]).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Registry identifier of the backend (`s3`, `cf`, `local`, ...)
    fn name(&self) -> &'static str;

    fn config(&self) -> &DriverConfig;

    fn config_mut(&mut self) -> &mut DriverConfig;

    fn get_config(&self, key: &str) -> Option<ConfigValue> {
        self.config().get(key)
    }

    /// Change one setting. Takes effect on the next operation.
    fn set_config(&mut self, key: &str, value: ConfigValue) {
        self.config_mut().set(key, value);
    }

    /// Resolve the container for an operation: the explicit argument, else the
    /// configured default. An empty result fails with `kind`.
    fn container_name(&self, explicit: Option<&str>, kind: ErrorKind) -> StorageResult<String> {
        let name = match explicit {
            Some(name) if !name.trim().is_empty() => name.trim(),
            _ => self.config().container.trim(),
        };

        if name.is_empty() {
            return Err(StorageError::operation(
                kind,
                FailureOrigin::Rejected,
                "No container given and no default container configured",
            ));
        }

        Ok(name.to_string())
    }

    /// Validate a container argument the operation cannot default.
    fn required_container(&self, name: &str, kind: ErrorKind) -> StorageResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::operation(
                kind,
                FailureOrigin::Rejected,
                "Container name must not be empty",
            ));
        }

        Ok(name.to_string())
    }

    /// Upload a local file. The object key is `target` when given, else the
    /// file's base name.
    async fn upload_object(
        &self,
        path: &Path,
        target: Option<&str>,
        container: Option<&str>,
    ) -> StorageResult<()>;

    async fn delete_object(&self, key: &str, container: Option<&str>) -> StorageResult<()>;

    /// Create a public-read container and return its public URL.
    async fn create_container(&self, name: &str, location: Option<&str>) -> StorageResult<String>;

    /// Delete a container. Fails with origin `NotEmpty` while it holds objects.
    async fn delete_container(&self, container: Option<&str>) -> StorageResult<()>;

    /// List at most one backend page of objects under `prefix`, ordered by key.
    async fn list_objects(
        &self,
        prefix: Option<&str>,
        container: Option<&str>,
    ) -> StorageResult<Vec<ObjectEntry>>;

    /// Public base URL of a container, ending in exactly one `/`.
    async fn get_container_url(&self, container: Option<&str>) -> StorageResult<String>;

    /// Copy `key` from one container to another. The destination key defaults
    /// to `key` without its leading `/`.
    async fn copy_to(
        &self,
        from_container: &str,
        to_container: &str,
        key: &str,
        new_key: Option<&str>,
    ) -> StorageResult<()>;

    /// `Ok(false)` for a missing object or container; errors only for
    /// transport or authentication failures.
    async fn object_exists(&self, key: &str, container: Option<&str>) -> StorageResult<bool>;
}
