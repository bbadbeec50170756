use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;
use tracing::{debug, warn};

use crate::dao::storage::{StorageError, StorageResult};

/// JSON documents keyed by `<namespace>.<sub_key>` inside one directory.
///
/// Reads never fail: a missing, unreadable or corrupt document is logged and treated as empty.
/// Writes replace the document atomically and report failures.
#[derive(Debug, Clone)]
pub struct LocalKvStore {
    root: Arc<Path>,
    namespace: Arc<str>,
}

impl LocalKvStore {
    pub fn new(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            root: Arc::from(root.into()),
            namespace: Arc::from(namespace.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, sub_key: &str) -> PathBuf {
        self.root.join(format!("{}.{}.json", self.namespace, sub_key))
    }

    /// Load the document stored under `sub_key`, or the default value when there is none.
    pub async fn read<T>(&self, sub_key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let path = self.path(sub_key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "local document missing; treating as empty");
                return T::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read local document; treating as empty");
                return T::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt local document; treating as empty");
                T::default()
            }
        }
    }

    /// Replace the document stored under `sub_key`.
    pub async fn write<T>(&self, sub_key: &str, value: &T) -> StorageResult<()>
    where
        T: ?Sized + Serialize,
    {
        let path = self.path(sub_key);
        let payload = serde_json::to_vec_pretty(value)
            .map_err(|source| StorageError::unavailable(format!("encoding `{sub_key}`"), source))?;

        fs::create_dir_all(&self.root).await.map_err(|source| {
            StorageError::unavailable(
                format!("creating data directory `{}`", self.root.display()),
                source,
            )
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &payload).await.map_err(|source| {
            StorageError::unavailable(format!("writing `{}`", tmp.display()), source)
        })?;
        fs::rename(&tmp, &path).await.map_err(|source| {
            StorageError::unavailable(format!("replacing `{}`", path.display()), source)
        })?;

        Ok(())
    }

    /// Delete the document stored under `sub_key`. Missing documents are fine.
    pub async fn remove(&self, sub_key: &str) -> StorageResult<()> {
        let path = self.path(sub_key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::unavailable(
                format!("removing `{}`", path.display()),
                source,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_document_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let kv = LocalKvStore::new(dir.path(), "golf_score_app");
        let users: Vec<String> = kv.read("users").await;
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn corrupt_document_reads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("golf_score_app.users.json"), b"{not json").unwrap();
        let kv = LocalKvStore::new(dir.path(), "golf_score_app");
        let users: Vec<String> = kv.read("users").await;
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn write_then_read_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let kv = LocalKvStore::new(dir.path().join("nested"), "ns");
        kv.write("scores", &vec![1u32, 2, 3]).await.unwrap();
        assert!(dir.path().join("nested/ns.scores.json").exists());

        let values: Vec<u32> = kv.read("scores").await;
        assert_eq!(values, vec![1, 2, 3]);

        kv.remove("scores").await.unwrap();
        kv.remove("scores").await.unwrap();
        let values: Vec<u32> = kv.read("scores").await;
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn namespaces_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let first = LocalKvStore::new(dir.path(), "one");
        let second = LocalKvStore::new(dir.path(), "two");
        first.write("users", &vec!["a".to_string()]).await.unwrap();
        let other: Vec<String> = second.read("users").await;
        assert!(other.is_empty());
    }
}
