//! Stratus Storage Library
//!
//! This crate provides the [`Driver`] trait every object-storage backend
//! implements, the registry/factory that picks a backend from configuration,
//! and the backend adapters themselves (S3, Rackspace CloudFiles and a local
//! filesystem adapter for development).
//!
//! # Container resolution
//!
//! Every object operation takes an optional explicit container. When it is
//! absent the driver's current `container` setting is used, read again on every
//! call, so `set_config("container", ..)` takes effect on the next operation.
//!
//! # Sessions
//!
//! Adapters open a fresh backend session inside each operation from the
//! current credentials. Nothing is cached between calls.

pub(crate) mod backend;
#[cfg(feature = "storage-cloudfiles")]
pub mod cloudfiles;
pub mod facade;
pub mod factory;
pub mod files;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod shared;
pub mod traits;

// Re-export commonly used types
pub use backend::{BackendError, BackendResult};
#[cfg(feature = "storage-cloudfiles")]
pub use cloudfiles::{CloudFilesApi, CloudFilesConnector, CloudFilesDriver, ObjectProbe};
pub use facade::CloudStorage;
pub use factory::{DriverFactory, DriverRegistry};
#[cfg(feature = "storage-local")]
pub use local::LocalDriver;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Api, S3Connector, S3Driver};
pub use stratus_core::{
    ConfigLayer, ConfigValue, DriverConfig, ErrorKind, FailureOrigin, FileInfo, ObjectEntry, Setup,
    StorageError, StorageResult, StorageSettings,
};
pub use traits::Driver;
