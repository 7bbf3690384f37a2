//! Local source file inspection shared by every adapter.

use std::path::Path;

use stratus_core::models::split_extension;
use stratus_core::{FileInfo, StorageError, StorageResult};

use crate::keys::normalize_key;

/// Describe a local file before upload.
///
/// Fails with `InvalidFile` when `path` does not exist or is not a regular
/// file. `target` overrides the base name (leading `/` removed).
pub async fn describe_local_file(path: &Path, target: Option<&str>) -> StorageResult<FileInfo> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| StorageError::InvalidFile(format!("{}: {}", path.display(), e)))?;

    if !metadata.is_file() {
        return Err(StorageError::InvalidFile(format!(
            "{}: not a regular file",
            path.display()
        )));
    }

    let base_name = match target.map(normalize_key).filter(|t| !t.is_empty()) {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StorageError::InvalidFile(format!("{}: no file name", path.display()))
            })?,
    };
    let extension = split_extension(base_name.rsplit('/').next().unwrap_or_default()).to_string();

    Ok(FileInfo {
        path: path.to_path_buf(),
        directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        base_name,
        extension,
        size: metadata.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratus_core::ErrorKind;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_describe_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        tokio::fs::write(&path, b"%PDF").await.unwrap();

        let info = describe_local_file(&path, None).await.unwrap();
        assert_eq!(info.base_name, "report.pdf");
        assert_eq!(info.extension, "pdf");
        assert_eq!(info.size, 4);
        assert_eq!(info.directory, dir.path());
    }

    #[tokio::test]
    async fn test_target_overrides_base_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        tokio::fs::write(&path, b"x").await.unwrap();

        let info = describe_local_file(&path, Some("/docs/2024/q1.txt"))
            .await
            .unwrap();
        assert_eq!(info.base_name, "docs/2024/q1.txt");
        assert_eq!(info.extension, "txt");
    }

    #[tokio::test]
    async fn test_missing_file_is_invalid_file() {
        let dir = tempdir().unwrap();
        let err = describe_local_file(&dir.path().join("nope.txt"), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFile);
    }

    #[tokio::test]
    async fn test_directory_is_invalid_file() {
        let dir = tempdir().unwrap();
        let err = describe_local_file(dir.path(), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFile);
    }
}
