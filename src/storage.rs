//! Persistent key/value storage behind a backend-agnostic adapter
//!
//! Two persistent backends exist, one per host environment. Interactive hosts
//! keep every key in a single JSON document; headless hosts keep one
//! JSON-encoded file per key. Callers only ever see [`Storage`].

use crate::environment::HostEnvironment;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

/// File name of the document backend inside the storage directory
pub const DOCUMENT_FILE: &str = "credentials.json";

/// Directory name of the per-key backend inside the storage directory
pub const KEY_DIR: &str = "keys";

/// A physical key/value store
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Read the given keys; absent keys are omitted from the result
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    /// Write all entries, or fail without committing any of them
    async fn set(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Delete the given keys; missing keys are ignored
    async fn remove(&self, keys: &[&str]) -> Result<()>;
}

/// Uniform access to whichever backend the host environment selected
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
}

impl Storage {
    /// Wrap an explicit backend
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Open the persistent backend matching the host environment
    pub fn for_environment(environment: HostEnvironment, dir: &Path) -> Self {
        let backend: Arc<dyn StorageBackend> = match environment {
            HostEnvironment::Interactive => Arc::new(DocumentBackend::new(dir.join(DOCUMENT_FILE))),
            HostEnvironment::Headless => Arc::new(KeyFileBackend::new(dir.join(KEY_DIR))),
        };
        debug!(backend = backend.name(), dir = %dir.display(), "Opened credential storage");
        Self { backend }
    }

    /// Name of the active backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Read the given keys
    pub async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        self.backend.get(keys).await
    }

    /// Write the given entries
    pub async fn set(&self, entries: &[(&str, &str)]) -> Result<()> {
        self.backend.set(entries).await
    }

    /// Delete the given keys
    pub async fn remove(&self, keys: &[&str]) -> Result<()> {
        self.backend.remove(keys).await
    }
}

/// All keys in one JSON object document, rewritten atomically on every change
pub struct DocumentBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl DocumentBackend {
    /// Create a backend storing its document at `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    async fn read_document(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, document: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent).await?;
        }

        let content = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = write_private(&tmp, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for DocumentBackend {
    fn name(&self) -> &'static str {
        "document"
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;

        Ok(keys
            .iter()
            .filter_map(|key| document.remove(*key).map(|value| ((*key).to_string(), value)))
            .collect())
    }

    #[instrument(skip(self, entries), fields(path = %self.path.display()))]
    async fn set(&self, entries: &[(&str, &str)]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;

        for (key, value) in entries {
            document.insert((*key).to_string(), (*value).to_string());
        }

        self.write_document(&document).await?;
        debug!(count = entries.len(), "Stored entries");
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut document = self.read_document().await?;

        let before = document.len();
        for key in keys {
            document.remove(*key);
        }

        if document.len() != before {
            self.write_document(&document).await?;
        }
        Ok(())
    }
}

/// One file per key holding the JSON-encoded value
pub struct KeyFileBackend {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl KeyFileBackend {
    /// Create a backend keeping its files under `dir`
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if !valid {
            return Err(AppError::StorageError(format!("Invalid storage key '{key}'")));
        }

        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl StorageBackend for KeyFileBackend {
    fn name(&self) -> &'static str {
        "key-file"
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let _guard = self.lock.lock().await;
        let mut result = HashMap::new();

        for key in keys {
            let path = self.key_path(key)?;
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            let value: String = serde_json::from_str(&content)?;
            result.insert((*key).to_string(), value);
        }

        Ok(result)
    }

    #[instrument(skip(self, entries), fields(dir = %self.dir.display()))]
    async fn set(&self, entries: &[(&str, &str)]) -> Result<()> {
        let _guard = self.lock.lock().await;
        create_private_dir(&self.dir).await?;

        let encoded = entries
            .iter()
            .map(|(key, value)| -> Result<(PathBuf, String)> {
                Ok((self.key_path(key)?, serde_json::to_string(value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        // Stage every value and remember what each target held before
        let mut staged = Vec::with_capacity(encoded.len());
        let mut previous = Vec::with_capacity(encoded.len());
        for (path, content) in encoded {
            let tmp = path.with_extension("json.tmp");
            let prior = match write_private(&tmp, content.as_bytes()).await {
                Ok(()) => read_existing(&path).await,
                Err(e) => Err(e),
            };
            staged.push((tmp, path));

            match prior {
                Ok(prior) => previous.push(prior),
                Err(e) => {
                    discard(&staged).await;
                    return Err(e.into());
                }
            }
        }

        for (index, (tmp, path)) in staged.iter().enumerate() {
            if let Err(e) = tokio::fs::rename(tmp, path).await {
                for ((_, committed), prior) in staged[..index].iter().zip(&previous) {
                    let restored = match prior {
                        Some(content) => write_private(committed, content).await,
                        None => tokio::fs::remove_file(committed).await,
                    };
                    if let Err(restore_error) = restored {
                        warn!(path = %committed.display(), error = %restore_error, "Failed to roll back entry");
                    }
                }
                discard(&staged[index..]).await;
                return Err(e.into());
            }
        }

        debug!(count = entries.len(), "Stored entries");
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.lock.lock().await;

        for key in keys {
            match tokio::fs::remove_file(self.key_path(key)?).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Create `dir` readable by the owner only
async fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)).await?;
    }
    Ok(())
}

/// Write `content` to `path` with owner-only permissions
async fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(path, content).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

/// Current content of a regular file, `None` when there is none
async fn read_existing(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_file() => tokio::fs::read(path).await.map(Some),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove staged temp files, ignoring failures
async fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (tmp, _) in staged {
        let _ = tokio::fs::remove_file(tmp).await;
    }
}

/// Process-local backend, used for tests and dry runs
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set` calls committed so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let entries = self.entries.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| ((*key).to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut stored = self.entries.lock().await;
        for (key, value) in entries {
            stored.insert((*key).to_string(), (*value).to_string());
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut stored = self.entries.lock().await;
        for key in keys {
            stored.remove(*key);
        }
        Ok(())
    }
}
