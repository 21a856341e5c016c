//! Blob storage for original and composited PDFs.
//!
//! The workflow only ever sees [`BlobLocator`]s; what a locator means is up
//! to the backend. Both backends here are content-addressed with Blake3, so
//! uploading the same bytes twice yields the same locator.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::RngCore;
use signflow_core::{now_millis, BlobLocator};
use thiserror::Error;
use tokio::sync::RwLock;

const LOCATOR_PREFIX: &str = "blake3-";

/// Errors from a blob backend.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    /// Worth retrying: the backend may succeed on a later attempt.
    #[error("transient blob store failure: {0}")]
    Transient(String),

    #[error("blob store failure: {0}")]
    Backend(String),
}

impl BlobError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BlobError::Transient(_))
    }
}

impl From<io::Error> for BlobError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => BlobError::NotFound(e.to_string()),
            io::ErrorKind::Interrupted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock => BlobError::Transient(e.to_string()),
            _ => BlobError::Backend(e.to_string()),
        }
    }
}

pub type BlobResult<T> = std::result::Result<T, BlobError>;

/// Object storage for document bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return their locator.
    async fn put(&self, bytes: Bytes) -> BlobResult<BlobLocator>;

    /// Fetch the bytes behind a locator.
    async fn get(&self, locator: &BlobLocator) -> BlobResult<Bytes>;

    /// A time-limited URL for direct download.
    async fn signed_url(&self, locator: &BlobLocator, ttl: Duration) -> BlobResult<String>;

    /// Remove a blob. Deleting a missing blob is not an error.
    async fn delete(&self, locator: &BlobLocator) -> BlobResult<()>;
}

/// Content address of `bytes`.
pub fn content_locator(bytes: &[u8]) -> BlobLocator {
    BlobLocator::new(format!("{}{}", LOCATOR_PREFIX, blake3::hash(bytes).to_hex()))
}

/// The hex digest of a well-formed locator, or `None`.
fn digest_of(locator: &BlobLocator) -> Option<&str> {
    let digest = locator.as_str().strip_prefix(LOCATOR_PREFIX)?;
    let well_formed = digest.len() == 64 && digest.bytes().all(|b| b.is_ascii_hexdigit());
    well_formed.then_some(digest)
}

fn expiry(ttl: Duration) -> i64 {
    now_millis().saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64)
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory blob store for tests and embedding.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<BlobLocator, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn contains(&self, locator: &BlobLocator) -> bool {
        self.blobs.read().await.contains_key(locator)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Bytes) -> BlobResult<BlobLocator> {
        let locator = content_locator(&bytes);
        self.blobs.write().await.insert(locator.clone(), bytes);
        Ok(locator)
    }

    async fn get(&self, locator: &BlobLocator) -> BlobResult<Bytes> {
        self.blobs
            .read()
            .await
            .get(locator)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(locator.to_string()))
    }

    async fn signed_url(&self, locator: &BlobLocator, ttl: Duration) -> BlobResult<String> {
        if !self.contains(locator).await {
            return Err(BlobError::NotFound(locator.to_string()));
        }
        Ok(format!("memory://{}?expires={}", locator, expiry(ttl)))
    }

    async fn delete(&self, locator: &BlobLocator) -> BlobResult<()> {
        self.blobs.write().await.remove(locator);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Filesystem
// ─────────────────────────────────────────────────────────────────────────────

/// Blob store rooted at a local directory.
///
/// Blobs live at `<root>/<first two hex chars>/<digest>`. Signed URLs carry
/// a keyed Blake3 MAC over the path and expiry.
pub struct FsBlobStore {
    root: PathBuf,
    url_key: [u8; 32],
}

impl FsBlobStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> BlobResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        let mut url_key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut url_key);
        tracing::info!(root = %root.display(), "opened filesystem blob store");
        Ok(Self { root, url_key })
    }

    /// Use a fixed key for signing URLs, so URLs verify across restarts.
    pub fn with_url_key(mut self, key: [u8; 32]) -> Self {
        self.url_key = key;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, locator: &BlobLocator) -> BlobResult<PathBuf> {
        let digest =
            digest_of(locator).ok_or_else(|| BlobError::NotFound(locator.to_string()))?;
        Ok(self.root.join(&digest[..2]).join(digest))
    }

    fn url_mac(&self, path: &Path, expires: i64) -> String {
        let mut hasher = blake3::Hasher::new_keyed(&self.url_key);
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(&expires.to_le_bytes());
        hasher.finalize().to_hex().to_string()
    }

    /// Check a URL produced by [`BlobStore::signed_url`] against `now`.
    pub fn verify_url(&self, url: &str, now: i64) -> bool {
        let Some(rest) = url.strip_prefix("file://") else {
            return false;
        };
        let Some((path, query)) = rest.split_once('?') else {
            return false;
        };
        let mut expires = None;
        let mut sig = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse::<i64>().ok(),
                Some(("sig", v)) => sig = Some(v),
                _ => {}
            }
        }
        match (expires, sig) {
            (Some(expires), Some(sig)) => {
                now <= expires && self.url_mac(Path::new(path), expires) == sig
            }
            _ => false,
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bytes: Bytes) -> BlobResult<BlobLocator> {
        let locator = content_locator(&bytes);
        let path = self.path_for(&locator)?;

        if tokio::fs::try_exists(&path).await? {
            return Ok(locator);
        }
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // Write aside, then rename, so readers never see a partial file.
        let tmp = path.with_extension(format!("tmp{}", rand::thread_rng().next_u32()));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(%locator, size = bytes.len(), "stored blob");
        Ok(locator)
    }

    async fn get(&self, locator: &BlobLocator) -> BlobResult<Bytes> {
        let path = self.path_for(locator)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(locator.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn signed_url(&self, locator: &BlobLocator, ttl: Duration) -> BlobResult<String> {
        let path = self.path_for(locator)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(BlobError::NotFound(locator.to_string()));
        }
        let expires = expiry(ttl);
        Ok(format!(
            "file://{}?expires={}&sig={}",
            path.display(),
            expires,
            self.url_mac(&path, expires)
        ))
    }

    async fn delete(&self, locator: &BlobLocator) -> BlobResult<()> {
        let path = self.path_for(locator)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_is_content_addressed() {
        let store = MemoryBlobStore::new();
        let a = store.put(Bytes::from_static(b"%PDF-1.5 a")).await.unwrap();
        let again = store.put(Bytes::from_static(b"%PDF-1.5 a")).await.unwrap();
        let b = store.put(Bytes::from_static(b"%PDF-1.5 b")).await.unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get(&a).await.unwrap(), Bytes::from_static(b"%PDF-1.5 a"));
    }

    #[tokio::test]
    async fn test_memory_delete_and_missing() {
        let store = MemoryBlobStore::new();
        let locator = store.put(Bytes::from_static(b"x")).await.unwrap();
        store.delete(&locator).await.unwrap();
        store.delete(&locator).await.unwrap();

        assert!(matches!(store.get(&locator).await, Err(BlobError::NotFound(_))));
        assert!(matches!(
            store.signed_url(&locator, Duration::from_secs(60)).await,
            Err(BlobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_signed_url_names_locator() {
        let store = MemoryBlobStore::new();
        let locator = store.put(Bytes::from_static(b"x")).await.unwrap();
        let url = store.signed_url(&locator, Duration::from_secs(60)).await.unwrap();
        assert!(url.starts_with(&format!("memory://{}?expires=", locator)));
    }

    #[tokio::test]
    async fn test_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        let locator = store.put(Bytes::from_static(b"%PDF-1.7")).await.unwrap();
        assert_eq!(locator, content_locator(b"%PDF-1.7"));
        assert_eq!(store.get(&locator).await.unwrap(), Bytes::from_static(b"%PDF-1.7"));

        store.delete(&locator).await.unwrap();
        assert!(matches!(store.get(&locator).await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fs_rejects_foreign_locators() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        for bad in ["../../etc/passwd", "blake3-zz", "sha256-abcd"] {
            assert!(matches!(
                store.get(&BlobLocator::new(bad)).await,
                Err(BlobError::NotFound(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_fs_signed_url_verifies_until_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path())
            .await
            .unwrap()
            .with_url_key([7; 32]);
        let locator = store.put(Bytes::from_static(b"doc")).await.unwrap();

        let url = store
            .signed_url(&locator, Duration::from_secs(300))
            .await
            .unwrap();
        let now = now_millis();
        assert!(store.verify_url(&url, now));
        assert!(!store.verify_url(&url, now + 301_000));
        assert!(!store.verify_url(&url.replace("sig=", "sig=0"), now));

        let other = FsBlobStore::open(dir.path()).await.unwrap();
        assert!(!other.verify_url(&url, now));
    }

    #[test]
    fn test_transient_classification() {
        let e: BlobError = io::Error::new(io::ErrorKind::TimedOut, "slow disk").into();
        assert!(e.is_transient());
        let e: BlobError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert!(!e.is_transient());
    }
}
