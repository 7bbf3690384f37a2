//! In-memory backends for driver tests.
//!
//! [`MemoryCloud`] stores containers and objects in a shared map and hands out
//! S3 and CloudFiles sessions over it, counting every session opened.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use stratus_storage::cloudfiles::CloudFilesDriverFactory;
use stratus_storage::s3::S3DriverFactory;
use stratus_storage::{
    BackendError, BackendResult, CloudFilesApi, CloudFilesConnector, CloudStorage, ConfigLayer,
    Driver, DriverConfig, DriverRegistry, ObjectEntry, ObjectProbe, S3Api, S3Connector, Setup,
    StorageSettings,
};
use tempfile::TempDir;

/// Secret the in-memory identity service rejects.
pub const BAD_SECRET: &str = "wrong-secret";

const CDN_HOST: &str = "https://cdn.test";

type Containers = BTreeMap<String, BTreeMap<String, Bytes>>;

#[derive(Clone, Default)]
pub struct MemoryCloud {
    containers: Arc<Mutex<Containers>>,
    sessions: Arc<AtomicUsize>,
    probe_agents: Arc<Mutex<Vec<String>>>,
}

impl MemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions opened so far
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// User agents seen by existence probes
    pub fn probe_agents(&self) -> Vec<String> {
        self.probe_agents.lock().unwrap().clone()
    }

    pub fn has_object(&self, container: &str, key: &str) -> bool {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .is_some_and(|objects| objects.contains_key(key))
    }

    pub fn object(&self, container: &str, key: &str) -> Option<Bytes> {
        self.containers
            .lock()
            .unwrap()
            .get(container)
            .and_then(|objects| objects.get(key).cloned())
    }

    fn authenticate(&self, config: &DriverConfig) -> BackendResult<()> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        if config.access_secret == BAD_SECRET {
            return Err(BackendError::Authentication(format!(
                "Invalid credentials for {}",
                config.access_key
            )));
        }
        Ok(())
    }

    fn with_container<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut BTreeMap<String, Bytes>) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut containers = self.containers.lock().unwrap();
        match containers.get_mut(name) {
            Some(objects) => f(objects),
            None => Err(BackendError::NotFound(format!("No such container: {}", name))),
        }
    }

    fn create(&self, name: &str) {
        self.containers
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default();
    }

    fn remove(&self, name: &str) -> BackendResult<()> {
        let mut containers = self.containers.lock().unwrap();
        match containers.get(name) {
            None => Err(BackendError::NotFound(format!("No such container: {}", name))),
            Some(objects) if !objects.is_empty() => {
                Err(BackendError::NotEmpty(format!("Container {} is not empty", name)))
            }
            Some(_) => {
                containers.remove(name);
                Ok(())
            }
        }
    }

    fn list(
        &self,
        name: &str,
        prefix: Option<&str>,
        limit: usize,
    ) -> BackendResult<Vec<ObjectEntry>> {
        self.with_container(name, |objects| {
            Ok(objects
                .iter()
                .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
                .take(limit)
                .map(|(key, body)| ObjectEntry::from_key(key.clone(), body.len() as u64))
                .collect())
        })
    }

    fn copy(&self, from: &str, key: &str, to: &str, new_key: &str) -> BackendResult<()> {
        let body = self.with_container(from, |objects| {
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| BackendError::NotFound(format!("No such key: {}", key)))
        })?;
        self.with_container(to, |objects| {
            objects.insert(new_key.to_string(), body);
            Ok(())
        })
    }

    pub fn s3_connector(&self) -> MemoryS3Connector {
        MemoryS3Connector(self.clone())
    }

    pub fn cf_connector(&self) -> MemoryCfConnector {
        MemoryCfConnector(self.clone())
    }

    pub fn probe(&self) -> MemoryProbe {
        MemoryProbe(self.clone())
    }

    /// Built-in registry with `s3` and `cf` bound to this cloud.
    pub fn registry(&self) -> DriverRegistry {
        let mut registry = DriverRegistry::with_builtin();
        registry.register(Arc::new(S3DriverFactory::new(Arc::new(self.s3_connector()))));
        registry.register(Arc::new(CloudFilesDriverFactory::new(
            Arc::new(self.cf_connector()),
            Arc::new(self.probe()),
        )));
        registry
    }
}

pub struct MemoryS3Connector(MemoryCloud);

#[async_trait]
impl S3Connector for MemoryS3Connector {
    async fn connect(&self, config: &DriverConfig) -> BackendResult<Box<dyn S3Api>> {
        self.0.authenticate(config)?;
        Ok(Box::new(MemoryS3(self.0.clone())))
    }
}

struct MemoryS3(MemoryCloud);

#[async_trait]
impl S3Api for MemoryS3 {
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> BackendResult<()> {
        self.0.with_container(bucket, |objects| {
            objects.insert(key.to_string(), body);
            Ok(())
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()> {
        // Real S3 ignores missing keys
        self.0.with_container(bucket, |objects| {
            objects.remove(key);
            Ok(())
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<bool> {
        Ok(self.0.has_object(bucket, key))
    }

    async fn create_bucket(&self, bucket: &str, _location: Option<&str>) -> BackendResult<()> {
        self.0.create(bucket);
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> BackendResult<()> {
        self.0.remove(bucket)
    }

    async fn bucket_exists(&self, bucket: &str) -> BackendResult<bool> {
        Ok(self.0.containers.lock().unwrap().contains_key(bucket))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        max_keys: usize,
    ) -> BackendResult<Vec<ObjectEntry>> {
        self.0.list(bucket, prefix, max_keys)
    }

    async fn copy_object(
        &self,
        from_bucket: &str,
        key: &str,
        to_bucket: &str,
        new_key: &str,
    ) -> BackendResult<()> {
        self.0.copy(from_bucket, key, to_bucket, new_key)
    }
}

pub struct MemoryCfConnector(MemoryCloud);

#[async_trait]
impl CloudFilesConnector for MemoryCfConnector {
    async fn connect(&self, config: &DriverConfig) -> BackendResult<Box<dyn CloudFilesApi>> {
        self.0.authenticate(config)?;
        Ok(Box::new(MemoryCloudFiles(self.0.clone())))
    }
}

struct MemoryCloudFiles(MemoryCloud);

#[async_trait]
impl CloudFilesApi for MemoryCloudFiles {
    async fn create_container(&self, name: &str) -> BackendResult<()> {
        self.0.create(name);
        Ok(())
    }

    async fn delete_container(&self, name: &str) -> BackendResult<()> {
        self.0.remove(name)
    }

    async fn make_public(&self, name: &str, _ttl: u32) -> BackendResult<String> {
        self.0
            .with_container(name, |_| Ok(format!("{}/{}", CDN_HOST, name)))
    }

    async fn list_objects(
        &self,
        container: &str,
        limit: usize,
        prefix: Option<&str>,
    ) -> BackendResult<Vec<ObjectEntry>> {
        self.0.list(container, prefix, limit)
    }

    async fn put_object(&self, container: &str, key: &str, body: Bytes) -> BackendResult<()> {
        self.0.with_container(container, |objects| {
            objects.insert(key.to_string(), body);
            Ok(())
        })
    }

    async fn delete_object(&self, container: &str, key: &str) -> BackendResult<()> {
        self.0.with_container(container, |objects| {
            objects
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| BackendError::NotFound(format!("No such object: {}", key)))
        })
    }

    async fn copy_object(
        &self,
        from_container: &str,
        key: &str,
        to_container: &str,
        new_key: &str,
    ) -> BackendResult<()> {
        self.0.copy(from_container, key, to_container, new_key)
    }
}

/// Answers HEAD probes against `https://cdn.test/{container}/{key}`.
pub struct MemoryProbe(MemoryCloud);

#[async_trait]
impl ObjectProbe for MemoryProbe {
    async fn status(&self, url: &str, useragent: &str) -> BackendResult<u16> {
        self.0.probe_agents.lock().unwrap().push(useragent.to_string());
        let path = url
            .strip_prefix(CDN_HOST)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| BackendError::Transport(format!("Unexpected probe URL {}", url)))?;
        let (container, key) = path.split_once('/').unwrap_or((path, ""));
        let key = urlencoding::decode(key)
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(if self.0.has_object(container, &key) { 200 } else { 404 })
    }
}

/// Scratch area: a local driver root plus a directory of source files.
pub struct Workspace {
    pub dir: TempDir,
    pub cloud: MemoryCloud,
    pub storage: CloudStorage,
}

impl Workspace {
    pub fn new() -> Self {
        stratus_core::telemetry::init_tracing();
        let dir = tempfile::tempdir().unwrap();
        let cloud = MemoryCloud::new();
        let root = dir.path().join("root");
        std::fs::create_dir_all(&root).unwrap();

        let settings = StorageSettings::default()
            .with_setup("s3", ConfigLayer::new().with("driver", "s3"))
            .with_setup("cf", ConfigLayer::new().with("driver", "cf"))
            .with_setup(
                "local",
                ConfigLayer::new()
                    .with("driver", "local")
                    .with("root", root.display().to_string()),
            );
        let storage = CloudStorage::new(settings, cloud.registry());

        Self {
            dir,
            cloud,
            storage,
        }
    }

    /// Driver for a backend with credentials and a default container.
    pub fn driver(&self, backend: &str, container: &str) -> Box<dyn Driver> {
        self.storage
            .forge(
                Setup::from(backend),
                ConfigLayer::new()
                    .with("access_key", "K")
                    .with("access_secret", "S")
                    .with("container", container),
            )
            .unwrap()
    }

    /// Write a source file and return its path.
    pub fn source(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join("sources").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn missing_source(&self) -> PathBuf {
        self.dir.path().join("sources").join("does-not-exist.txt")
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Every backend the contract tests run against.
pub const BACKENDS: [&str; 3] = ["s3", "cf", "local"];
