//! Shared constants

/// Driver identifier used when no configuration layer names one.
pub const DEFAULT_DRIVER: &str = "s3";

/// Setup group name used when the caller passes no setup.
pub const DEFAULT_SETUP: &str = "default";

/// User agent sent by adapters that speak HTTP themselves.
pub const DEFAULT_USERAGENT: &str = concat!("stratus/", env!("CARGO_PKG_VERSION"));

/// Maximum number of entries returned by a single `list_objects` call.
pub const LIST_PAGE_SIZE: usize = 1000;

/// CDN time-to-live (seconds) applied when a container is made public.
pub const CDN_TTL_SECS: u32 = 3600;

// Well-known configuration keys
pub const KEY_DRIVER: &str = "driver";
pub const KEY_ACCESS_KEY: &str = "access_key";
pub const KEY_ACCESS_SECRET: &str = "access_secret";
pub const KEY_CONTAINER: &str = "container";
pub const KEY_USERAGENT: &str = "useragent";
