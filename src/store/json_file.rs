//! JSON-file backed config store.
//!
//! File layout: `{"keywords": ["taksi", ...], "admins": [123456789]}`.
//! The file is the source of truth: every snapshot re-reads it, so hand
//! edits (the only way to grant admin rights) take effect on the next
//! message. Mutations re-read the file under the write lock before
//! rewriting it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::pipeline::types::Keyword;
use crate::store::traits::{ConfigSnapshot, ConfigStore};

pub struct JsonFileStore {
    /// `None` keeps everything in memory (for tests).
    path: Option<PathBuf>,
    /// Last snapshot read or written. Only authoritative without a path.
    state: RwLock<ConfigSnapshot>,
}

impl JsonFileStore {
    /// Open the store at `path`, creating it with default keywords if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let state = load_or_create(&path).await?;

        info!(
            path = %path.display(),
            keywords = state.keywords.len(),
            admins = state.admins.len(),
            "Config store opened"
        );

        Ok(Self {
            path: Some(path),
            state: RwLock::new(state),
        })
    }

    /// A store that never touches disk.
    pub fn in_memory(initial: ConfigSnapshot) -> Self {
        Self {
            path: None,
            state: RwLock::new(initial),
        }
    }

    /// Apply `change` to the current contents and persist the result if it
    /// reports a modification.
    async fn update<F>(&self, change: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut ConfigSnapshot) -> bool,
    {
        let mut state = self.state.write().await;
        let mut current = match &self.path {
            Some(path) => load_or_create(path).await?,
            None => state.clone(),
        };
        if !change(&mut current) {
            *state = current;
            return Ok(false);
        }
        if let Some(path) = &self.path {
            write_snapshot(path, &current).await?;
        }
        *state = current;
        Ok(true)
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn snapshot(&self) -> Result<ConfigSnapshot, StoreError> {
        let Some(path) = &self.path else {
            return Ok(self.state.read().await.clone());
        };
        // Readers wait out an in-flight mutation.
        let mut state = self.state.write().await;
        let current = load_or_create(path).await?;
        *state = current.clone();
        Ok(current)
    }

    async fn add_keyword(&self, keyword: Keyword) -> Result<bool, StoreError> {
        let added = self
            .update(|snapshot| snapshot.keywords.insert(keyword.clone()))
            .await?;
        if added {
            debug!(keyword = %keyword, "Keyword added");
        }
        Ok(added)
    }

    async fn remove_keyword(&self, keyword: &Keyword) -> Result<bool, StoreError> {
        let removed = self
            .update(|snapshot| snapshot.keywords.remove(keyword))
            .await?;
        if removed {
            debug!(keyword = %keyword, "Keyword removed");
        }
        Ok(removed)
    }
}

/// Read the file, writing the defaults first if it does not exist.
async fn load_or_create(path: &Path) -> Result<ConfigSnapshot, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
            path: path.display().to_string(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let defaults = ConfigSnapshot::with_default_keywords();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| io_error(parent, source))?;
            }
            write_snapshot(path, &defaults).await?;
            info!(path = %path.display(), "Created config store with default keywords");
            Ok(defaults)
        }
        Err(source) => Err(io_error(path, source)),
    }
}

/// Write via a sibling temp file so readers never see a partial file.
async fn write_snapshot(path: &Path, snapshot: &ConfigSnapshot) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(snapshot)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, json)
        .await
        .map_err(|source| io_error(&tmp, source))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
