//! Local filesystem driver
//!
//! Containers are directories under the `root` extra key and objects are files
//! inside them. Public URLs are `{base_url}/{container}/`, with `base_url`
//! defaulting to `file://{root}`. Intended for development and tests.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use stratus_core::constants::LIST_PAGE_SIZE;
use stratus_core::{DriverConfig, ErrorKind, FailureOrigin, ObjectEntry};
use stratus_core::{StorageError, StorageResult};
use tokio::fs;

use crate::backend::BackendError;
use crate::factory::DriverFactory;
use crate::files::describe_local_file;
use crate::keys::{destination_key, ensure_trailing_slash, is_safe_key, normalize_key};
use crate::traits::Driver;

pub const DRIVER_ID: &str = "local";

/// Local filesystem driver
#[derive(Debug, Clone)]
pub struct LocalDriver {
    config: DriverConfig,
}

impl LocalDriver {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    fn root(&self, kind: ErrorKind) -> StorageResult<PathBuf> {
        self.config
            .extra_str("root")
            .map(PathBuf::from)
            .ok_or_else(|| {
                StorageError::operation(
                    kind,
                    FailureOrigin::Rejected,
                    "No root directory configured for the local driver",
                )
            })
    }

    fn base_url(&self, root: &Path) -> String {
        match self.config.extra_str("base_url") {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("file://{}", root.display().to_string().trim_end_matches('/')),
        }
    }

    /// Directory of a container. Names must be a single safe path segment.
    fn container_dir(&self, container: &str, kind: ErrorKind) -> StorageResult<PathBuf> {
        if !is_safe_key(container) || container.contains('/') {
            return Err(StorageError::operation(
                kind,
                FailureOrigin::Rejected,
                format!("Invalid container name: {}", container),
            ));
        }
        Ok(self.root(kind)?.join(container))
    }

    /// Path of an object. Keys resolving outside the container are rejected.
    fn object_path(&self, dir: &Path, key: &str, kind: ErrorKind) -> StorageResult<PathBuf> {
        if !is_safe_key(key) {
            return Err(StorageError::operation(
                kind,
                FailureOrigin::Rejected,
                format!("Invalid object key: {}", key),
            ));
        }
        Ok(dir.join(normalize_key(key)))
    }

    async fn require_dir(dir: &Path, kind: ErrorKind) -> StorageResult<()> {
        if fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            Ok(())
        } else {
            Err(StorageError::operation(
                kind,
                FailureOrigin::NotFound,
                format!("Container {} does not exist", dir.display()),
            ))
        }
    }

    /// Remove directories left empty between `path` and the container.
    async fn prune_empty_parents(container_dir: &Path, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == container_dir || !dir.starts_with(container_dir) {
                break;
            }
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    async fn walk(dir: &Path) -> std::io::Result<Vec<(String, u64)>> {
        let mut found = Vec::new();
        let mut pending = vec![dir.to_path_buf()];

        while let Some(current) = pending.pop() {
            let mut entries = fs::read_dir(&current).await?;
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                let path = entry.path();
                if metadata.is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(dir) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    found.push((key, metadata.len()));
                }
            }
        }

        Ok(found)
    }
}

fn failed(kind: ErrorKind, path: &Path, start: Instant, err: std::io::Error) -> StorageError {
    let err = BackendError::from(err);
    tracing::error!(
        error = %err,
        path = %path.display(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Local storage {} failed",
        kind
    );
    StorageError::operation(kind, err.origin(), format!("{}: {}", path.display(), err))
}

#[async_trait]
impl Driver for LocalDriver {
    fn name(&self) -> &'static str {
        DRIVER_ID
    }

    fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn config_mut(&mut self) -> &mut DriverConfig {
        &mut self.config
    }

    async fn upload_object(
        &self,
        path: &Path,
        target: Option<&str>,
        container: Option<&str>,
    ) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::UploadObject;

        let file = describe_local_file(path, target).await?;
        let container = self.container_name(container, KIND)?;
        let dir = self.container_dir(&container, KIND)?;
        let dest = self.object_path(&dir, &file.base_name, KIND)?;
        let start = Instant::now();

        Self::require_dir(&dir, KIND).await?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(KIND, parent, start, e))?;
        }
        let size = fs::copy(&file.path, &dest)
            .await
            .map_err(|e| failed(KIND, &dest, start, e))?;

        tracing::info!(
            path = %dest.display(),
            key = %file.base_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn delete_object(&self, key: &str, container: Option<&str>) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::DeleteObject;

        let container = self.container_name(container, KIND)?;
        let dir = self.container_dir(&container, KIND)?;
        let path = self.object_path(&dir, key, KIND)?;
        let start = Instant::now();

        fs::remove_file(&path)
            .await
            .map_err(|e| failed(KIND, &path, start, e))?;
        Self::prune_empty_parents(&dir, &path).await;

        tracing::info!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn create_container(&self, name: &str, _location: Option<&str>) -> StorageResult<String> {
        const KIND: ErrorKind = ErrorKind::CreateContainer;

        let container = self.required_container(name, KIND)?;
        let dir = self.container_dir(&container, KIND)?;
        let start = Instant::now();

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| failed(KIND, &dir, start, e))?;

        let url = ensure_trailing_slash(&format!(
            "{}/{}",
            self.base_url(&self.root(KIND)?),
            container
        ));

        tracing::info!(
            path = %dir.display(),
            url = %url,
            "Local storage container created"
        );

        Ok(url)
    }

    async fn delete_container(&self, container: Option<&str>) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::DeleteContainer;

        let container = self.container_name(container, KIND)?;
        let dir = self.container_dir(&container, KIND)?;
        let start = Instant::now();

        Self::require_dir(&dir, KIND).await?;

        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| failed(KIND, &dir, start, e))?;
        if entries
            .next_entry()
            .await
            .map_err(|e| failed(KIND, &dir, start, e))?
            .is_some()
        {
            return Err(StorageError::operation(
                KIND,
                FailureOrigin::NotEmpty,
                format!("Container {} is not empty", container),
            ));
        }

        fs::remove_dir(&dir)
            .await
            .map_err(|e| failed(KIND, &dir, start, e))?;

        tracing::info!(
            path = %dir.display(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage container deleted"
        );

        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: Option<&str>,
        container: Option<&str>,
    ) -> StorageResult<Vec<ObjectEntry>> {
        const KIND: ErrorKind = ErrorKind::ListObjects;

        let container = self.container_name(container, KIND)?;
        let dir = self.container_dir(&container, KIND)?;
        let prefix = prefix.map(normalize_key).unwrap_or_default();
        let start = Instant::now();

        Self::require_dir(&dir, KIND).await?;

        let mut found = Self::walk(&dir)
            .await
            .map_err(|e| failed(KIND, &dir, start, e))?;
        found.retain(|(key, _)| key.starts_with(prefix));
        found.sort();
        found.truncate(LIST_PAGE_SIZE);

        Ok(found
            .into_iter()
            .map(|(key, size)| ObjectEntry::from_key(key, size))
            .collect())
    }

    async fn get_container_url(&self, container: Option<&str>) -> StorageResult<String> {
        const KIND: ErrorKind = ErrorKind::InvalidContainer;

        let container = self.container_name(container, KIND)?;
        let dir = self.container_dir(&container, KIND)?;

        Self::require_dir(&dir, KIND).await?;

        Ok(ensure_trailing_slash(&format!(
            "{}/{}",
            self.base_url(&self.root(KIND)?),
            container
        )))
    }

    async fn copy_to(
        &self,
        from_container: &str,
        to_container: &str,
        key: &str,
        new_key: Option<&str>,
    ) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::CopyObject;

        let from_dir = self.container_dir(&self.required_container(from_container, KIND)?, KIND)?;
        let to_dir = self.container_dir(&self.required_container(to_container, KIND)?, KIND)?;
        let target_key = destination_key(key, new_key);
        let from_path = self.object_path(&from_dir, key, KIND)?;
        let to_path = self.object_path(&to_dir, &target_key, KIND)?;
        let start = Instant::now();

        Self::require_dir(&to_dir, KIND).await?;
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| failed(KIND, parent, start, e))?;
        }
        fs::copy(&from_path, &to_path)
            .await
            .map_err(|e| failed(KIND, &from_path, start, e))?;

        tracing::info!(
            from_path = %from_path.display(),
            to_path = %to_path.display(),
            "Local storage copy successful"
        );

        Ok(())
    }

    async fn object_exists(&self, key: &str, container: Option<&str>) -> StorageResult<bool> {
        const KIND: ErrorKind = ErrorKind::ObjectExists;

        let container = self.container_name(container, KIND)?;
        let dir = self.container_dir(&container, KIND)?;
        if !is_safe_key(key) {
            return Ok(false);
        }
        let path = self.object_path(&dir, key, KIND)?;
        let start = Instant::now();

        file_found(fs::metadata(&path).await).map_err(|e| failed(KIND, &path, start, e))
    }
}

/// `Ok(false)` when nothing is at the path, other I/O failures pass through.
fn file_found(metadata: std::io::Result<std::fs::Metadata>) -> std::io::Result<bool> {
    match metadata {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if matches!(
            e.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
        ) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Registers the `local` driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDriverFactory;

impl DriverFactory for LocalDriverFactory {
    fn driver_type(&self) -> &'static str {
        DRIVER_ID
    }

    fn create_driver(&self, config: DriverConfig) -> StorageResult<Box<dyn Driver>> {
        Ok(Box::new(LocalDriver::new(config)))
    }
}
