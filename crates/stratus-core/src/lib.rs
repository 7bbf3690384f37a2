//! Stratus Core Library
//!
//! This crate provides the configuration model, error taxonomy and listing models
//! shared by every Stratus storage driver. Driver implementations live in the
//! `stratus-storage` crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod telemetry;

// Re-export commonly used types
pub use config::{ConfigLayer, ConfigValue, DriverConfig, Setup, StorageSettings};
pub use error::{ErrorKind, FailureOrigin, StorageError, StorageResult};
pub use models::{FileInfo, ObjectEntry};
