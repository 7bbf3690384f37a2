//! Shared default driver
//!
//! A process-wide driver forged lazily from [`CloudStorage::global`] with no
//! setup override, then reused for the life of the process. The functions here
//! delegate to it; use [`CloudStorage::forge`] for anything needing more than
//! one configuration.
//!
//! Access is serialised by a mutex, so a `set_config` and the operation that
//! follows it never interleave with another caller.

use std::path::Path;

use stratus_core::{ConfigValue, ObjectEntry, Setup, StorageResult};
use tokio::sync::{Mutex, MutexGuard, OnceCell};

use crate::facade::CloudStorage;
use crate::traits::Driver;

static DEFAULT_DRIVER: OnceCell<Mutex<Box<dyn Driver>>> = OnceCell::const_new();

/// Lock the default driver, forging it on first use.
pub async fn driver() -> StorageResult<MutexGuard<'static, Box<dyn Driver>>> {
    let cell = DEFAULT_DRIVER
        .get_or_try_init(|| async {
            let driver = CloudStorage::global().forge(Setup::Default, Default::default())?;
            tracing::info!(driver = driver.name(), "Default storage driver initialised");
            Ok::<_, stratus_core::StorageError>(Mutex::new(driver))
        })
        .await?;
    Ok(cell.lock().await)
}

pub async fn get_config(key: &str) -> StorageResult<Option<ConfigValue>> {
    Ok(driver().await?.get_config(key))
}

pub async fn set_config(key: &str, value: impl Into<ConfigValue>) -> StorageResult<()> {
    driver().await?.set_config(key, value.into());
    Ok(())
}

pub async fn upload_object(
    path: &Path,
    target: Option<&str>,
    container: Option<&str>,
) -> StorageResult<()> {
    driver().await?.upload_object(path, target, container).await
}

pub async fn delete_object(key: &str, container: Option<&str>) -> StorageResult<()> {
    driver().await?.delete_object(key, container).await
}

pub async fn create_container(name: &str, location: Option<&str>) -> StorageResult<String> {
    driver().await?.create_container(name, location).await
}

pub async fn delete_container(container: Option<&str>) -> StorageResult<()> {
    driver().await?.delete_container(container).await
}

pub async fn list_objects(
    prefix: Option<&str>,
    container: Option<&str>,
) -> StorageResult<Vec<ObjectEntry>> {
    driver().await?.list_objects(prefix, container).await
}

pub async fn get_container_url(container: Option<&str>) -> StorageResult<String> {
    driver().await?.get_container_url(container).await
}

pub async fn copy_to(
    from_container: &str,
    to_container: &str,
    key: &str,
    new_key: Option<&str>,
) -> StorageResult<()> {
    driver()
        .await?
        .copy_to(from_container, to_container, key, new_key)
        .await
}

pub async fn object_exists(key: &str, container: Option<&str>) -> StorageResult<bool> {
    driver().await?.object_exists(key, container).await
}
