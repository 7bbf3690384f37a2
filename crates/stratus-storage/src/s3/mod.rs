//! Amazon S3 (and S3-compatible) driver
//!
//! The driver talks to S3 through the [`S3Api`] capability, obtained from an
//! [`S3Connector`] at the start of every operation using the driver's current
//! credentials. [`AwsS3Connector`] is the production connector.

mod client;

pub use client::AwsS3Connector;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use stratus_core::constants::LIST_PAGE_SIZE;
use stratus_core::{DriverConfig, ErrorKind, FailureOrigin, ObjectEntry};
use stratus_core::{StorageError, StorageResult};

use crate::backend::{BackendError, BackendResult};
use crate::factory::DriverFactory;
use crate::files::describe_local_file;
use crate::keys::{destination_key, ensure_trailing_slash, normalize_key};
use crate::traits::Driver;

pub const DRIVER_ID: &str = "s3";

const DEFAULT_PUBLIC_HOST: &str = "https://s3.amazonaws.com";

/// S3 operations the driver needs. Objects and buckets are written with the
/// `public-read` canned ACL.
#[async_trait]
pub trait S3Api: Send + Sync {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()>;

    /// `Ok(false)` when the object (or its bucket) does not exist.
    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<bool>;

    async fn create_bucket(&self, bucket: &str, location: Option<&str>) -> BackendResult<()>;

    async fn delete_bucket(&self, bucket: &str) -> BackendResult<()>;

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        max_keys: usize,
    ) -> BackendResult<Vec<ObjectEntry>>;

    async fn copy_object(
        &self,
        from_bucket: &str,
        key: &str,
        to_bucket: &str,
        new_key: &str,
    ) -> BackendResult<()>;
}

/// Opens an S3 session from the current configuration.
#[async_trait]
pub trait S3Connector: Send + Sync {
    async fn connect(&self, config: &DriverConfig) -> BackendResult<Box<dyn S3Api>>;
}

/// S3 driver
pub struct S3Driver {
    config: DriverConfig,
    connector: Arc<dyn S3Connector>,
}

impl S3Driver {
    pub fn new(config: DriverConfig, connector: Arc<dyn S3Connector>) -> Self {
        Self { config, connector }
    }

    async fn session(&self, kind: ErrorKind) -> StorageResult<Box<dyn S3Api>> {
        tracing::debug!(
            region = self.config.extra_str("region").unwrap_or("us-east-1"),
            endpoint = self.config.extra_str("endpoint").unwrap_or("default"),
            "Opening S3 session"
        );
        self.connector
            .connect(&self.config)
            .await
            .map_err(|e| e.into_storage(kind))
    }

    /// Public URL template for a bucket
    fn public_url(&self, bucket: &str) -> String {
        let host = self
            .config
            .extra_str("endpoint")
            .unwrap_or(DEFAULT_PUBLIC_HOST)
            .trim_end_matches('/');
        ensure_trailing_slash(&format!("{}/{}", host, bucket))
    }

    async fn container_url(&self, s3: &dyn S3Api, bucket: &str) -> BackendResult<String> {
        if !s3.bucket_exists(bucket).await? {
            return Err(BackendError::NotFound(format!(
                "Bucket {} does not exist",
                bucket
            )));
        }
        Ok(self.public_url(bucket))
    }
}

fn failed(
    kind: ErrorKind,
    bucket: &str,
    key: &str,
    start: Instant,
    err: BackendError,
) -> StorageError {
    tracing::error!(
        error = %err,
        bucket = %bucket,
        key = %key,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "S3 {} failed",
        kind
    );
    err.into_storage(kind)
}

#[async_trait]
impl Driver for S3Driver {
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
        let bucket = self.container_name(container, KIND)?;
        let start = Instant::now();

        let body = tokio::fs::read(&file.path).await.map_err(|e| {
            StorageError::operation(KIND, FailureOrigin::Local, e.to_string())
        })?;
        let size = body.len() as u64;

        let s3 = self.session(KIND).await?;
        s3.put_object(&bucket, &file.base_name, Bytes::from(body))
            .await
            .map_err(|e| failed(KIND, &bucket, &file.base_name, start, e))?;

        tracing::info!(
            bucket = %bucket,
            key = %file.base_name,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn delete_object(&self, key: &str, container: Option<&str>) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::DeleteObject;

        let bucket = self.container_name(container, KIND)?;
        let key = normalize_key(key);
        let start = Instant::now();

        let s3 = self.session(KIND).await?;

        // S3 deletes succeed for missing keys
        let exists = s3
            .head_object(&bucket, key)
            .await
            .map_err(|e| failed(KIND, &bucket, key, start, e))?;
        if !exists {
            return Err(failed(
                KIND,
                &bucket,
                key,
                start,
                BackendError::NotFound(format!("Object {} does not exist", key)),
            ));
        }

        s3.delete_object(&bucket, key)
            .await
            .map_err(|e| failed(KIND, &bucket, key, start, e))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn create_container(&self, name: &str, location: Option<&str>) -> StorageResult<String> {
        const KIND: ErrorKind = ErrorKind::CreateContainer;

        let bucket = self.required_container(name, KIND)?;
        let start = Instant::now();

        let s3 = self.session(KIND).await?;
        s3.create_bucket(&bucket, location)
            .await
            .map_err(|e| failed(KIND, &bucket, "", start, e))?;

        let url = self
            .container_url(s3.as_ref(), &bucket)
            .await
            .map_err(|e| failed(KIND, &bucket, "", start, e))?;

        tracing::info!(
            bucket = %bucket,
            location = location.unwrap_or("default"),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bucket created"
        );

        Ok(url)
    }

    async fn delete_container(&self, container: Option<&str>) -> StorageResult<()> {
        const KIND: ErrorKind = ErrorKind::DeleteContainer;

        let bucket = self.container_name(container, KIND)?;
        let start = Instant::now();

        let s3 = self.session(KIND).await?;
        s3.delete_bucket(&bucket)
            .await
            .map_err(|e| failed(KIND, &bucket, "", start, e))?;

        tracing::info!(
            bucket = %bucket,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bucket deleted"
        );

        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: Option<&str>,
        container: Option<&str>,
    ) -> StorageResult<Vec<ObjectEntry>> {
        const KIND: ErrorKind = ErrorKind::ListObjects;

        let bucket = self.container_name(container, KIND)?;
        let prefix = prefix.map(normalize_key).filter(|p| !p.is_empty());
        let start = Instant::now();

        let s3 = self.session(KIND).await?;
        let mut entries = s3
            .list_objects(&bucket, prefix, LIST_PAGE_SIZE)
            .await
            .map_err(|e| failed(KIND, &bucket, prefix.unwrap_or(""), start, e))?;

        entries.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        entries.truncate(LIST_PAGE_SIZE);

        tracing::debug!(
            bucket = %bucket,
            prefix = prefix.unwrap_or(""),
            count = entries.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list successful"
        );

        Ok(entries)
    }

    async fn get_container_url(&self, container: Option<&str>) -> StorageResult<String> {
        const KIND: ErrorKind = ErrorKind::InvalidContainer;

        let bucket = self.container_name(container, KIND)?;
        let start = Instant::now();

        let s3 = self.session(KIND).await?;
        self.container_url(s3.as_ref(), &bucket)
            .await
            .map_err(|e| failed(KIND, &bucket, "", start, e))
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

        let s3 = self.session(KIND).await?;

        if !s3
            .bucket_exists(&from)
            .await
            .map_err(|e| failed(KIND, &from, source_key, start, e))?
        {
            return Err(failed(
                KIND,
                &from,
                source_key,
                start,
                BackendError::NotFound(format!("Bucket {} does not exist", from)),
            ));
        }

        s3.copy_object(&from, source_key, &to, &target_key)
            .await
            .map_err(|e| failed(KIND, &from, source_key, start, e))?;

        tracing::info!(
            from_bucket = %from,
            to_bucket = %to,
            from_key = %source_key,
            to_key = %target_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 copy successful"
        );

        Ok(())
    }

    async fn object_exists(&self, key: &str, container: Option<&str>) -> StorageResult<bool> {
        const KIND: ErrorKind = ErrorKind::ObjectExists;

        let bucket = self.container_name(container, KIND)?;
        let key = normalize_key(key);
        let start = Instant::now();

        let s3 = self.session(KIND).await?;
        match s3.head_object(&bucket, key).await {
            Ok(exists) => Ok(exists),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(failed(KIND, &bucket, key, start, e)),
        }
    }
}

/// Registers the `s3` driver.
pub struct S3DriverFactory {
    connector: Arc<dyn S3Connector>,
}

impl S3DriverFactory {
    pub fn new(connector: Arc<dyn S3Connector>) -> Self {
        Self { connector }
    }
}

impl Default for S3DriverFactory {
    fn default() -> Self {
        Self::new(Arc::new(AwsS3Connector))
    }
}

impl DriverFactory for S3DriverFactory {
    fn driver_type(&self) -> &'static str {
        DRIVER_ID
    }

    fn create_driver(&self, config: DriverConfig) -> StorageResult<Box<dyn Driver>> {
        Ok(Box::new(S3Driver::new(config, self.connector.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::ConfigLayer;
    use stratus_core::StorageSettings;

    struct Unreachable;

    #[async_trait]
    impl S3Connector for Unreachable {
        async fn connect(&self, _config: &DriverConfig) -> BackendResult<Box<dyn S3Api>> {
            Err(BackendError::Transport("connection refused".into()))
        }
    }

    fn driver(overrides: ConfigLayer) -> S3Driver {
        let config = StorageSettings::default().resolve("", &overrides);
        S3Driver::new(config, Arc::new(Unreachable))
    }

    #[test]
    fn test_public_url_default_host() {
        let driver = driver(ConfigLayer::new());
        assert_eq!(
            driver.public_url("photos"),
            "https://s3.amazonaws.com/photos/"
        );
    }

    #[test]
    fn test_public_url_custom_endpoint() {
        let driver = driver(ConfigLayer::new().with("endpoint", "http://localhost:9000/"));
        assert_eq!(driver.public_url("photos"), "http://localhost:9000/photos/");
    }

    #[tokio::test]
    async fn test_connect_failure_is_operation_kind() {
        let driver = driver(ConfigLayer::new().with("container", "b"));
        let err = driver.delete_container(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteContainer);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_container_rejected_before_connect() {
        let driver = driver(ConfigLayer::new());
        let err = driver.list_objects(None, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ListObjects);
        assert_eq!(err.origin(), Some(FailureOrigin::Rejected));
    }
}
