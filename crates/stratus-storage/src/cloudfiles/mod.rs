//! Rackspace CloudFiles driver
//!
//! Sessions authenticate with username = `access_key` and API key =
//! `access_secret`. Containers are published through the CDN, and the CDN URI
//! is the container's public URL. Location hints are ignored.

mod client;

pub use client::{HttpProbe, RackspaceConnector};

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use stratus_core::constants::{CDN_TTL_SECS, DEFAULT_USERAGENT, LIST_PAGE_SIZE};
use stratus_core::{DriverConfig, ErrorKind, FailureOrigin, ObjectEntry};
use stratus_core::{StorageError, StorageResult};

use crate::backend::{BackendError, BackendResult};
use crate::factory::DriverFactory;
use crate::files::describe_local_file;
use crate::keys::{destination_key, ensure_trailing_slash, normalize_key};
use crate::traits::Driver;

pub const DRIVER_ID: &str = "cf";

/// CloudFiles operations the driver needs.
#[async_trait]
pub trait CloudFilesApi: Send + Sync {
    async fn create_container(&self, name: &str) -> BackendResult<()>;

    async fn delete_container(&self, name: &str) -> BackendResult<()>;

    /// CDN-enable an existing container and return its CDN URI.
    async fn make_public(&self, name: &str, ttl: u32) -> BackendResult<String>;

    async fn list_objects(
        &self,
        container: &str,
        limit: usize,
        prefix: Option<&str>,
    ) -> BackendResult<Vec<ObjectEntry>>;

    async fn put_object(&self, container: &str, key: &str, body: Bytes) -> BackendResult<()>;

    async fn delete_object(&self, container: &str, key: &str) -> BackendResult<()>;

    async fn copy_object(
        &self,
        from_container: &str,
        key: &str,
        to_container: &str,
        new_key: &str,
    ) -> BackendResult<()>;
}

/// Authenticates and opens a CloudFiles session from the current configuration.
#[async_trait]
pub trait CloudFilesConnector: Send + Sync {
    async fn connect(&self, config: &DriverConfig) -> BackendResult<Box<dyn CloudFilesApi>>;
}

/// Lightweight existence check against a public object URL.
#[async_trait]
pub trait ObjectProbe: Send + Sync {
    /// HTTP status of a HEAD request to `url`, sent as `useragent`.
    async fn status(&self, url: &str, useragent: &str) -> BackendResult<u16>;
}

/// CloudFiles driver
pub struct CloudFilesDriver {
    config: DriverConfig,
    connector: Arc<dyn CloudFilesConnector>,
    probe: Arc<dyn ObjectProbe>,
}

impl CloudFilesDriver {
    pub fn new(
        config: DriverConfig,
        connector: Arc<dyn CloudFilesConnector>,
        probe: Arc<dyn ObjectProbe>,
    ) -> Self {
        Self {
            config,
            connector,
            probe,
        }
    }

    async fn session(&self, kind: ErrorKind) -> StorageResult<Box<dyn CloudFilesApi>> {
        tracing::debug!(
            username = %self.config.access_key,
            region = self.config.extra_str("region").unwrap_or("default"),
            "Authenticating CloudFiles session"
        );
        self.connector.connect(&self.config).await.map_err(|e| {
            if let BackendError::Authentication(_) = e {
                tracing::warn!(
                    username = %self.config.access_key,
                    error = %e,
                    "CloudFiles authentication failed"
                );
            }
            e.into_storage(kind)
        })
    }

    fn useragent(&self) -> &str {
        match self.config.useragent.trim() {
            "" => DEFAULT_USERAGENT,
            useragent => useragent,
        }
    }

    fn cdn_ttl(&self) -> u32 {
        self.config
            .extra_str("cdn_ttl")
            .and_then(|ttl| ttl.parse().ok())
            .unwrap_or(CDN_TTL_SECS)
    }

    async fn container_url(
        &self,
        cf: &dyn CloudFilesApi,
        container: &str,
    ) -> BackendResult<String> {
        let uri = cf.make_public(container, self.cdn_ttl()).await?;
        Ok(ensure_trailing_slash(&uri))
    }
}

fn failed(
    kind: ErrorKind,
    container: &str,
    key: &str,
    start: Instant,
    err: BackendError,
) -> StorageError {
    tracing::error!(
        error = %err,
        container = %container,
        key = %key,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "CloudFiles {} failed",
        kind
    );
    err.into_storage(kind)
}

#[async_trait]
impl Driver for CloudFilesDriver {
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
        let start = Instant::now();

        let body = tokio::fs::read(&file.path).await.map_err(|e| {
            StorageError::operation(KIND, FailureOrigin::Local, e.to_string())
        })?;
        let size = body.len() as u64;

        let cf = self.session(KIND).await?;
        cf.put_object(&container, &file.base_name, Bytes::from(body))
            .await
            .map_err(|e| failed(KIND, &container, &file.base_name, start, e))?;

        tracing::info!(
            container = %container,
            key = %file.base_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "CloudFiles upload successful"
        );

        Ok(())
    }

    async fn delete_object(&self, key: &str, container: Option<&str>) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::DeleteObject;

        let container = self.container_name(container, KIND)?;
        let key = normalize_key(key);
        let start = Instant::now();

        let cf = self.session(KIND).await?;
        cf.delete_object(&container, key)
            .await
            .map_err(|e| failed(KIND, &container, key, start, e))?;

        tracing::info!(
            container = %container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "CloudFiles delete successful"
        );

        Ok(())
    }

    async fn create_container(&self, name: &str, location: Option<&str>) -> StorageResult<String> {
        const KIND: ErrorKind = ErrorKind::CreateContainer;

        let container = self.required_container(name, KIND)?;
        if let Some(location) = location {
            tracing::debug!(location = %location, "CloudFiles ignores container location");
        }
        let start = Instant::now();

        let cf = self.session(KIND).await?;
        cf.create_container(&container)
            .await
            .map_err(|e| failed(KIND, &container, "", start, e))?;
        let url = self
            .container_url(cf.as_ref(), &container)
            .await
            .map_err(|e| failed(KIND, &container, "", start, e))?;

        tracing::info!(
            container = %container,
            url = %url,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "CloudFiles container created"
        );

        Ok(url)
    }

    async fn delete_container(&self, container: Option<&str>) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::DeleteContainer;

        let container = self.container_name(container, KIND)?;
        let start = Instant::now();

        let cf = self.session(KIND).await?;
        cf.delete_container(&container)
            .await
            .map_err(|e| failed(KIND, &container, "", start, e))?;

        tracing::info!(
            container = %container,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "CloudFiles container deleted"
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
        let prefix = prefix.map(normalize_key).filter(|p| !p.is_empty());
        let start = Instant::now();

        let cf = self.session(KIND).await?;
        let mut entries = cf
            .list_objects(&container, LIST_PAGE_SIZE, prefix)
            .await
            .map_err(|e| failed(KIND, &container, prefix.unwrap_or(""), start, e))?;

        entries.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        entries.truncate(LIST_PAGE_SIZE);

        tracing::debug!(
            container = %container,
            prefix = prefix.unwrap_or(""),
            count = entries.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "CloudFiles list successful"
        );

        Ok(entries)
    }

    async fn get_container_url(&self, container: Option<&str>) -> StorageResult<String> {
        const KIND: ErrorKind = ErrorKind::InvalidContainer;

        let container = self.container_name(container, KIND)?;
        let start = Instant::now();

        let cf = self.session(KIND).await?;
        self.container_url(cf.as_ref(), &container)
            .await
            .map_err(|e| failed(KIND, &container, "", start, e))
    }

    async fn copy_to(
        &self,
        from_container: &str,
        to_container: &str,
        key: &str,
        new_key: Option<&str>,
    ) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::CopyObject;

        let from = self.required_container(from_container, KIND)?;
        let to = self.required_container(to_container, KIND)?;
        let source_key = normalize_key(key);
        let target_key = destination_key(key, new_key);
        let start = Instant::now();

        let cf = self.session(KIND).await?;
        cf.copy_object(&from, source_key, &to, &target_key)
            .await
            .map_err(|e| failed(KIND, &from, source_key, start, e))?;

        tracing::info!(
            from_container = %from,
            to_container = %to,
            from_key = %source_key,
            to_key = %target_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "CloudFiles copy successful"
        );

        Ok(())
    }

    async fn object_exists(&self, key: &str, container: Option<&str>) -> StorageResult<bool> {
        const KIND: ErrorKind = ErrorKind::ObjectExists;

        let container = self.container_name(container, KIND)?;
        let key = normalize_key(key);
        let start = Instant::now();

        let cf = self.session(KIND).await?;
        let base = match self.container_url(cf.as_ref(), &container).await {
            Ok(url) => url,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(failed(KIND, &container, key, start, e)),
        };

        let url = format!("{}{}", base, client::encode_path(key));
        let status = self
            .probe
            .status(&url, self.useragent())
            .await
            .map_err(|e| failed(KIND, &container, key, start, e))?;

        tracing::debug!(url = %url, status = status, "CloudFiles existence probe");

        Ok(status == 200)
    }
}

/// Registers the `cf` driver.
pub struct CloudFilesDriverFactory {
    connector: Arc<dyn CloudFilesConnector>,
    probe: Arc<dyn ObjectProbe>,
}

impl CloudFilesDriverFactory {
    pub fn new(connector: Arc<dyn CloudFilesConnector>, probe: Arc<dyn ObjectProbe>) -> Self {
        Self { connector, probe }
    }
}

impl Default for CloudFilesDriverFactory {
    fn default() -> Self {
        Self::new(
            Arc::new(RackspaceConnector::default()),
            Arc::new(HttpProbe::default()),
        )
    }
}

impl DriverFactory for CloudFilesDriverFactory {
    fn driver_type(&self) -> &'static str {
        DRIVER_ID
    }

    fn create_driver(&self, config: DriverConfig) -> StorageResult<Box<dyn Driver>> {
        Ok(Box::new(CloudFilesDriver::new(
            config,
            self.connector.clone(),
            self.probe.clone(),
        )))
    }
}
