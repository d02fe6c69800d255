use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use unmc_ics_core::{Error, Result, cache::CacheBackend};

const CACHE_EXTENSION: &str = "page";

/// Entry header: [expires_at (8 bytes LE)] + [created_at (8 bytes LE)]
const HEADER_SIZE: usize = 16;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

fn create_cache_entry(data: &[u8], ttl: Duration, now: u64) -> Vec<u8> {
    let expires_at = now.saturating_add(ttl.as_secs());

    let mut entry = Vec::with_capacity(HEADER_SIZE + data.len());
    entry.extend_from_slice(&expires_at.to_le_bytes());
    entry.extend_from_slice(&now.to_le_bytes());
    entry.extend_from_slice(data);
    entry
}

/// Payload of an unexpired entry, `None` when expired or truncated.
fn read_cache_entry(raw: &[u8], now: u64) -> Option<&[u8]> {
    let (header, data) = raw.split_at_checked(HEADER_SIZE)?;
    let expires_at = u64::from_le_bytes(header[0..8].try_into().ok()?);

    (now <= expires_at).then_some(data)
}

/// One file per key under the user's cache directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    cache_dir: PathBuf,
}

impl FileCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| Error::Config(format!("Failed to create cache directory: {e}")))?;

        Ok(Self { cache_dir })
    }

    pub fn with_default_dir(app_name: &str) -> Result<Self> {
        Self::new(default_cache_dir(app_name)?)
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_file_path(&self, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);

        self.cache_dir
            .join(format!("{:x}.{CACHE_EXTENSION}", hasher.finish()))
    }
}

fn default_cache_dir(app_name: &str) -> Result<PathBuf> {
    let base = if cfg!(target_os = "windows") {
        std::env::var_os("LOCALAPPDATA").map(PathBuf::from)
    } else if cfg!(target_os = "macos") {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join("Library").join("Caches"))
    } else {
        std::env::var_os("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
    };

    base.map(|dir| dir.join(app_name))
        .ok_or_else(|| Error::Config("Cannot determine cache directory".to_string()))
}

#[async_trait]
impl CacheBackend for FileCache {
    async fn set_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        tokio::fs::write(
            self.cache_file_path(key),
            create_cache_entry(value, ttl, now_secs()),
        )
        .await
        .map_err(|e| Error::Internal(format!("Failed to write cache file: {e}")))
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let content = match tokio::fs::read(self.cache_file_path(key)).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Internal(format!("Failed to read cache file: {e}"))),
        };

        if let Some(data) = read_cache_entry(&content, now_secs()) {
            return Ok(Some(data.to_vec()));
        }

        tracing::debug!("Dropping stale cache entry for {}", key);
        self.delete(key).await?;
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.cache_file_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Internal(format!("Failed to delete cache file: {e}"))),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.cache_dir)
            .await
            .map_err(|e| Error::Internal(format!("Failed to read cache directory: {e}")))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Internal(format!("Failed to read directory entry: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == CACHE_EXTENSION) {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| Error::Internal(format!("Failed to delete cache file: {e}")))?;
            }
        }

        Ok(())
    }
}
