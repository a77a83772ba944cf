//! Persisting generated images and handing back their public URL.
//!
//! Files land in `assets.output_dir` as `<file_prefix>_<dni>_<uuid>.<ext>`.
//! The uuid keeps concurrent requests for the same DNI from colliding, so
//! the directory needs no locking; it is only ever appended to.

use crate::config::{AssetsConfig, ServerConfig};
use crate::types::Dni;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to create {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persists bytes and returns a URL they can be fetched from.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn persist(&self, dni: &Dni, bytes: &[u8], ext: &str) -> Result<String, StoreError>;
}

/// Writes into a local directory that the HTTP server exposes under
/// `static_prefix`.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    dir: PathBuf,
    file_prefix: String,
    base_url: String,
}

impl LocalAssetStore {
    pub fn new(assets: &AssetsConfig, server: &ServerConfig) -> Self {
        Self {
            dir: assets.output_dir.clone(),
            file_prefix: assets.file_prefix.clone(),
            base_url: format!(
                "{}{}",
                server.public_url.trim_end_matches('/'),
                server.static_prefix.trim_end_matches('/')
            ),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self, dni: &Dni, ext: &str) -> String {
        format!("{}_{}_{}.{}", self.file_prefix, dni, Uuid::new_v4(), ext)
    }

    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url, file_name)
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn persist(&self, dni: &Dni, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let file_name = self.file_name(dni, ext);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;

        info!("Stored {} ({} bytes)", path.display(), bytes.len());
        Ok(self.url_for(&file_name))
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Mock store that keeps persisted payloads in memory.
    #[derive(Default)]
    pub struct MockStore {
        pub persisted: Mutex<Vec<(String, Vec<u8>, String)>>,
    }

    impl MockStore {
        pub fn get_persisted(&self) -> Vec<(String, Vec<u8>, String)> {
            self.persisted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AssetStore for MockStore {
        async fn persist(&self, dni: &Dni, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
            let mut persisted = self.persisted.lock().unwrap();
            persisted.push((dni.to_string(), bytes.to_vec(), ext.to_string()));
            Ok(format!("mem://{}/{}.{}", dni, persisted.len(), ext))
        }
    }

    fn store_in(dir: &Path) -> LocalAssetStore {
        LocalAssetStore::new(
            &AssetsConfig {
                output_dir: dir.join("public/generated"),
                ..AssetsConfig::default()
            },
            &ServerConfig {
                public_url: "https://cards.example.org/".to_string(),
                static_prefix: "/generated".to_string(),
                ..ServerConfig::default()
            },
        )
    }

    fn dni() -> Dni {
        Dni::parse("12345678").unwrap()
    }

    #[test]
    fn file_names_are_prefixed_and_unique() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(tmp.path());
        let a = store.file_name(&dni(), "png");
        let b = store.file_name(&dni(), "png");
        assert!(a.starts_with("agv_12345678_"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[test]
    fn url_joins_public_url_and_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(tmp.path());
        assert_eq!(
            store.url_for("agv_1.png"),
            "https://cards.example.org/generated/agv_1.png"
        );
    }

    #[tokio::test]
    async fn persist_creates_dir_and_writes_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(tmp.path());
        let url = store.persist(&dni(), b"png-bytes", "png").await.unwrap();

        let file_name = url.rsplit('/').next().unwrap();
        let written = std::fs::read(store.dir().join(file_name)).unwrap();
        assert_eq!(written, b"png-bytes");
        assert!(url.starts_with("https://cards.example.org/generated/agv_12345678_"));
    }

    #[tokio::test]
    async fn longest_accepted_dni_persists() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(tmp.path());
        let longest = Dni::parse(&"9".repeat(crate::types::DNI_MAX_DIGITS)).unwrap();
        let url = store.persist(&longest, b"png-bytes", "png").await.unwrap();
        assert!(url.contains("agv_99999999999_"));
    }

    #[tokio::test]
    async fn concurrent_persists_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(store_in(tmp.path()));
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.persist(&dni(), &[i], "png").await.unwrap() })
            })
            .collect();
        let mut urls = Vec::new();
        for h in handles {
            urls.push(h.await.unwrap());
        }
        urls.sort();
        urls.dedup();
        assert_eq!(urls.len(), 8);
        assert_eq!(std::fs::read_dir(store.dir()).unwrap().count(), 8);
    }

    #[tokio::test]
    async fn unwritable_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let store = LocalAssetStore::new(
            &AssetsConfig {
                output_dir: blocker.join("sub"),
                ..AssetsConfig::default()
            },
            &ServerConfig::default(),
        );
        let err = store.persist(&dni(), b"x", "png").await.unwrap_err();
        assert!(matches!(err, StoreError::CreateDir { .. }));
    }
}
