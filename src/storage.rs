//! Cloud storage access: object key extraction, bucket downloads, and a
//! rebindable client handle for credential rotation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

/// Vocal stems live under this bucket prefix.
const VOCALS_PREFIX: &str = "vocals";

static OBJECT_KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"vocals/([^/?]+)").unwrap());

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("failed to read service account key {path}: {source}")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("service account key is not valid JSON: {0}")]
    InvalidKeyFile(#[from] serde_json::Error),
    #[error("request for {key} failed: {source}")]
    Request { key: String, source: reqwest::Error },
    #[error("failed to write downloaded object to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Identifier of a vocal stem inside the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectKey {
    pub file_name: String,
}

impl ObjectKey {
    /// Full object path within the bucket, e.g. `vocals/abc123_vocals.mp3`.
    pub fn bucket_path(&self) -> String {
        format!("{}/{}", VOCALS_PREFIX, self.file_name)
    }
}

/// Extract the object key from a storage reference.
///
/// The key is the path segment following the literal `vocals/`, terminated
/// by the next `/`, `?`, or the end of the string. References without a
/// `vocals/` segment are not recognized.
pub fn extract_object_key(reference: &str) -> Option<ObjectKey> {
    OBJECT_KEY_RE
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .map(|m| ObjectKey {
            file_name: m.as_str().to_string(),
        })
}

/// Remote object source. Implemented by the Firebase bucket client and by
/// test doubles.
pub trait ObjectStore: Send + Sync {
    /// Download `key` into `dest`, returning the number of bytes written.
    fn download_to(&self, key: &str, dest: &Path) -> Result<u64, StorageError>;
}

/// Firebase Storage bucket client.
///
/// Objects are fetched through the public download endpoint
/// (`/v0/b/<bucket>/o/<key>?alt=media`); the service-account key is
/// validated and kept for the credential page, while request-level
/// authentication is delegated to the storage service's token rules.
pub struct FirebaseBucket {
    bucket: String,
    project_id: Option<String>,
    client: reqwest::blocking::Client,
}

impl FirebaseBucket {
    pub fn new(bucket: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            project_id: None,
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| reqwest::blocking::Client::new()),
        }
    }

    /// Build a client from a service-account key file.
    ///
    /// The key must parse as JSON; its `project_id` is surfaced on the
    /// credential page.
    pub fn from_key_file(bucket: &str, key_path: &Path) -> Result<Self, StorageError> {
        let raw = fs::read_to_string(key_path).map_err(|source| StorageError::KeyFile {
            path: key_path.to_path_buf(),
            source,
        })?;
        let key: serde_json::Value = serde_json::from_str(&raw)?;
        let project_id = key
            .get("project_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let mut store = Self::new(bucket);
        store.project_id = project_id;
        Ok(store)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    fn object_url(&self, key: &str) -> String {
        // Object paths are url-encoded as a single path segment.
        let encoded = key.replace('/', "%2F");
        format!(
            "https://firebasestorage.googleapis.com/v0/b/{}/o/{}?alt=media",
            self.bucket, encoded
        )
    }
}

impl ObjectStore for FirebaseBucket {
    fn download_to(&self, key: &str, dest: &Path) -> Result<u64, StorageError> {
        let url = self.object_url(key);
        log::debug!("downloading {} from bucket {}", key, self.bucket);

        let mut response = self
            .client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|source| StorageError::Request {
                key: key.to_string(),
                source,
            })?;

        let mut file = fs::File::create(dest).map_err(|source| StorageError::Write {
            path: dest.to_path_buf(),
            source,
        })?;

        let bytes = std::io::copy(&mut response, &mut file).map_err(|source| {
            StorageError::Write {
                path: dest.to_path_buf(),
                source,
            }
        })?;

        log::debug!("downloaded {} bytes to {}", bytes, dest.display());
        Ok(bytes)
    }
}

/// Shared, rebindable storage client.
///
/// Credential rotation swaps the inner client under a write lock; inflight
/// downloads keep their own `Arc` and finish against the old credentials.
#[derive(Clone)]
pub struct StorageHandle {
    inner: Arc<RwLock<Arc<dyn ObjectStore>>>,
}

impl StorageHandle {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Current client; cheap to call per request.
    pub fn current(&self) -> Arc<dyn ObjectStore> {
        self.inner
            .read()
            .expect("storage handle lock poisoned")
            .clone()
    }

    /// Atomically replace the client.
    pub fn rebind(&self, store: Arc<dyn ObjectStore>) {
        *self.inner.write().expect("storage handle lock poisoned") = store;
    }
}
