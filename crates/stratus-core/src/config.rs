//! Configuration module
//!
//! Driver configuration is resolved from layers. Each [`ConfigLayer`] carries the
//! well-known keys as optional typed fields plus an open map for backend-specific
//! keys. [`StorageSettings`] holds the defaults block and the named setup groups,
//! and [`StorageSettings::resolve`] merges
//! built-in defaults → settings defaults → setup → caller overrides (later wins,
//! per key) into the [`DriverConfig`] a driver instance owns.

use std::collections::BTreeMap;
use std::env;
use std::fmt;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DRIVER, DEFAULT_SETUP, DEFAULT_USERAGENT, KEY_ACCESS_KEY, KEY_ACCESS_SECRET,
    KEY_CONTAINER, KEY_DRIVER, KEY_USERAGENT,
};

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    String(String),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            ConfigValue::Bool(_) => None,
        }
    }

    /// Interpret the value as a flag. Strings coming from the environment
    /// ("true", "1", "yes", "on") are accepted as well.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
        }
    }

    fn into_string(self) -> String {
        match self {
            ConfigValue::String(s) => s,
            ConfigValue::Bool(b) => b.to_string(),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

/// One layer of configuration. Unset keys leave lower layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub useragent: Option<String>,
    /// Backend-specific keys (`region`, `endpoint`, `root`, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, ConfigValue>,
}

impl ConfigLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in defaults every resolution starts from.
    pub fn builtin() -> Self {
        Self {
            driver: Some(DEFAULT_DRIVER.to_string()),
            access_key: Some(String::new()),
            access_secret: Some(String::new()),
            container: Some(String::new()),
            useragent: Some(DEFAULT_USERAGENT.to_string()),
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style setter.
    pub fn with(mut self, key: &str, value: impl Into<ConfigValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        let value = value.into();
        match key {
            KEY_DRIVER => self.driver = Some(value.into_string()),
            KEY_ACCESS_KEY => self.access_key = Some(value.into_string()),
            KEY_ACCESS_SECRET => self.access_secret = Some(value.into_string()),
            KEY_CONTAINER => self.container = Some(value.into_string()),
            KEY_USERAGENT => self.useragent = Some(value.into_string()),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Shallow merge: every key set in `other` replaces the same key here.
    pub fn merge(&mut self, other: &ConfigLayer) {
        fn take(slot: &mut Option<String>, incoming: &Option<String>) {
            if let Some(value) = incoming {
                *slot = Some(value.clone());
            }
        }

        take(&mut self.driver, &other.driver);
        take(&mut self.access_key, &other.access_key);
        take(&mut self.access_secret, &other.access_secret);
        take(&mut self.container, &other.container);
        take(&mut self.useragent, &other.useragent);

        for (key, value) in &other.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.driver.is_none()
            && self.access_key.is_none()
            && self.access_secret.is_none()
            && self.container.is_none()
            && self.useragent.is_none()
            && self.extra.is_empty()
    }
}

/// Effective configuration owned by a driver instance.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub driver: String,
    pub access_key: String,
    pub access_secret: String,
    pub container: String,
    pub useragent: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, ConfigValue>,
}

impl DriverConfig {
    /// Look up a key, well-known or backend-specific.
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        match key {
            KEY_DRIVER => Some(self.driver.clone().into()),
            KEY_ACCESS_KEY => Some(self.access_key.clone().into()),
            KEY_ACCESS_SECRET => Some(self.access_secret.clone().into()),
            KEY_CONTAINER => Some(self.container.clone().into()),
            KEY_USERAGENT => Some(self.useragent.clone().into()),
            other => self.extra.get(other).cloned(),
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<ConfigValue>) {
        let value = value.into();
        match key {
            KEY_DRIVER => self.driver = value.into_string(),
            KEY_ACCESS_KEY => self.access_key = value.into_string(),
            KEY_ACCESS_SECRET => self.access_secret = value.into_string(),
            KEY_CONTAINER => self.container = value.into_string(),
            KEY_USERAGENT => self.useragent = value.into_string(),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Non-empty string value of a backend-specific key.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra
            .get(key)
            .and_then(ConfigValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn extra_bool(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(ConfigValue::as_bool)
    }

    /// Registry key for the configured driver: trimmed and lower-cased.
    pub fn driver_id(&self) -> String {
        self.driver.trim().to_lowercase()
    }
}

impl From<ConfigLayer> for DriverConfig {
    fn from(layer: ConfigLayer) -> Self {
        Self {
            driver: layer.driver.unwrap_or_default(),
            access_key: layer.access_key.unwrap_or_default(),
            access_secret: layer.access_secret.unwrap_or_default(),
            container: layer.container.unwrap_or_default(),
            useragent: layer.useragent.unwrap_or_default(),
            extra: layer.extra,
        }
    }
}

impl fmt::Debug for DriverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverConfig")
            .field("driver", &self.driver)
            .field("access_key", &self.access_key)
            .field(
                "access_secret",
                &if self.access_secret.is_empty() {
                    ""
                } else {
                    "<redacted>"
                },
            )
            .field("container", &self.container)
            .field("useragent", &self.useragent)
            .field("extra", &self.extra)
            .finish()
    }
}

/// Which setup group a resolution starts from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Setup {
    /// The settings' `default_setup` group
    #[default]
    Default,
    /// A named group from the setups table
    Named(String),
    /// A configuration block supplied directly by the caller
    Inline(ConfigLayer),
}

impl From<&str> for Setup {
    fn from(name: &str) -> Self {
        if name.is_empty() {
            Setup::Default
        } else {
            Setup::Named(name.to_string())
        }
    }
}

impl From<String> for Setup {
    fn from(name: String) -> Self {
        Setup::from(name.as_str())
    }
}

impl From<Option<&str>> for Setup {
    fn from(name: Option<&str>) -> Self {
        name.map(Setup::from).unwrap_or_default()
    }
}

impl From<ConfigLayer> for Setup {
    fn from(layer: ConfigLayer) -> Self {
        Setup::Inline(layer)
    }
}

fn default_setup_name() -> String {
    DEFAULT_SETUP.to_string()
}

/// Defaults block plus named setup groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "ConfigLayer::builtin")]
    pub defaults: ConfigLayer,
    #[serde(default = "default_setup_name")]
    pub default_setup: String,
    #[serde(default)]
    pub setups: BTreeMap<String, ConfigLayer>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            defaults: ConfigLayer::builtin(),
            default_setup: default_setup_name(),
            setups: BTreeMap::new(),
        }
    }
}

impl StorageSettings {
    pub fn with_defaults(mut self, defaults: ConfigLayer) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_setup(mut self, name: impl Into<String>, layer: ConfigLayer) -> Self {
        self.setups.insert(name.into(), layer);
        self
    }

    pub fn setup(&self, name: &str) -> Option<&ConfigLayer> {
        self.setups.get(name)
    }

    /// Resolve the effective configuration for a driver.
    ///
    /// An unknown setup name is not an error: resolution continues with the
    /// defaults and overrides only.
    pub fn resolve(&self, setup: impl Into<Setup>, overrides: &ConfigLayer) -> DriverConfig {
        let setup_layer = match setup.into() {
            Setup::Default => self.lookup(&self.default_setup),
            Setup::Named(name) => self.lookup(&name),
            Setup::Inline(layer) => layer,
        };

        let mut layer = ConfigLayer::builtin();
        layer.merge(&self.defaults);
        layer.merge(&setup_layer);
        layer.merge(overrides);

        DriverConfig::from(layer)
    }

    fn lookup(&self, name: &str) -> ConfigLayer {
        match self.setups.get(name) {
            Some(layer) => layer.clone(),
            None => {
                tracing::debug!(setup = %name, "Setup group not found, using defaults only");
                ConfigLayer::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        serde_json::from_str(json).context("Failed to parse storage settings")
    }

    /// Load settings from the environment.
    ///
    /// `CLOUD_STORAGE_CONFIG` may name a JSON settings file; the individual
    /// `CLOUD_STORAGE_*` variables then overlay its `defaults` block.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let mut settings = match env_var("CLOUD_STORAGE_CONFIG") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read storage settings file {}", path))?;
                Self::from_json(&raw)?
            }
            None => Self::default(),
        };

        let overlay = [
            ("CLOUD_STORAGE_DRIVER", KEY_DRIVER),
            ("CLOUD_STORAGE_ACCESS_KEY", KEY_ACCESS_KEY),
            ("CLOUD_STORAGE_ACCESS_SECRET", KEY_ACCESS_SECRET),
            ("CLOUD_STORAGE_CONTAINER", KEY_CONTAINER),
            ("CLOUD_STORAGE_USERAGENT", KEY_USERAGENT),
        ];
        for (var, key) in overlay {
            if let Some(value) = env_var(var) {
                settings.defaults.set(key, value);
            }
        }

        if let Some(default_setup) = env_var("CLOUD_STORAGE_DEFAULT_SETUP") {
            settings.default_setup = default_setup;
        }

        Ok(settings)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
