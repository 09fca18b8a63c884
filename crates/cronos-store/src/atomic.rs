//! Atomic document replacement.
//!
//! A write is split into two steps. [`stage`] writes and fsyncs a sibling temp
//! file; [`commit`] renames it over the target. Readers only ever see the old
//! or the new complete document.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::StoreError;

/// Serialize `value` as pretty JSON with object keys sorted.
pub(crate) fn to_sorted_json<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    // serde_json::Value maps are BTreeMaps, which sorts keys on output.
    let value =
        serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let mut bytes =
        serde_json::to_vec_pretty(&value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `bytes` to a fresh temp file next to `target` and flush it to disk.
pub(crate) async fn stage(target: &Path, bytes: &[u8]) -> Result<PathBuf, StoreError> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).await?;

    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));

    let mut file = fs::File::create(&temp).await?;
    let written = async {
        file.write_all(bytes).await?;
        file.sync_all().await
    }
    .await;
    drop(file);

    if let Err(e) = written {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(temp)
}

/// Move a staged temp file over `target`.
pub(crate) async fn commit(temp: &Path, target: &Path) -> Result<(), StoreError> {
    if let Err(e) = fs::rename(temp, target).await {
        let _ = fs::remove_file(temp).await;
        return Err(e.into());
    }
    Ok(())
}

pub(crate) async fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let temp = stage(target, bytes).await?;
    commit(&temp, target).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.json");

        write_atomic(&target, b"first").await.unwrap();
        write_atomic(&target, b"second").await.unwrap();

        assert_eq!(fs::read_to_string(&target).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.json");
        write_atomic(&target, b"[]").await.unwrap();

        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["doc.json".to_string()]);
    }

    #[tokio::test]
    async fn test_staged_write_is_invisible_until_commit() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.json");
        write_atomic(&target, b"old").await.unwrap();

        let temp = stage(&target, b"new").await.unwrap();
        assert_eq!(fs::read_to_string(&target).await.unwrap(), "old");

        commit(&temp, &target).await.unwrap();
        assert_eq!(fs::read_to_string(&target).await.unwrap(), "new");
        assert!(!temp.exists());
    }

    #[test]
    fn test_sorted_json_orders_keys() {
        #[derive(Serialize)]
        struct Doc {
            zeta: u8,
            alpha: u8,
        }
        let bytes = to_sorted_json(&Doc { zeta: 1, alpha: 2 }).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("alpha").unwrap() < text.find("zeta").unwrap());
        assert!(text.contains('\n'));
    }
}
