//! Listing and local file models

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One entry of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Full object key, e.g. `photos/2024/cat.jpg`
    pub full_name: String,
    /// Last path segment, e.g. `cat.jpg`
    pub base_name: String,
    /// Text after the last `.` of the base name, empty when there is none
    pub extension: String,
    pub size: u64,
}

impl ObjectEntry {
    pub fn from_key(key: impl Into<String>, size: u64) -> Self {
        let full_name = key.into();
        let base_name = full_name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let extension = split_extension(&base_name).to_string();

        Self {
            full_name,
            base_name,
            extension,
            size,
        }
    }
}

/// Metadata derived from a local source file before upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub directory: PathBuf,
    /// Object key the file is stored under
    pub base_name: String,
    pub extension: String,
    pub size: u64,
}

/// Extension of a base name. Dot-files such as `.env` have none.
pub fn split_extension(base_name: &str) -> &str {
    match base_name.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &base_name[idx + 1..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_from_nested_key() {
        let entry = ObjectEntry::from_key("photos/2024/cat.tar.gz", 42);
        assert_eq!(entry.full_name, "photos/2024/cat.tar.gz");
        assert_eq!(entry.base_name, "cat.tar.gz");
        assert_eq!(entry.extension, "gz");
        assert_eq!(entry.size, 42);
    }

    #[test]
    fn test_entry_without_extension() {
        let entry = ObjectEntry::from_key("README", 0);
        assert_eq!(entry.base_name, "README");
        assert_eq!(entry.extension, "");

        let entry = ObjectEntry::from_key("config/.env", 3);
        assert_eq!(entry.base_name, ".env");
        assert_eq!(entry.extension, "");
    }
}
