use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Byte-oriented key/value store with expiry, provided by the binaries.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn set_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;
    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Stores fetched timetable pages by URL.
#[derive(Clone)]
pub struct CacheManager<C: CacheBackend> {
    cache: C,
}

impl<C: CacheBackend> CacheManager<C> {
    pub const fn new(cache: C) -> Self {
        Self { cache }
    }

    pub fn page_cache_key(url: &str) -> String {
        format!("page:{url}")
    }

    pub async fn cache_page(&self, url: &str, markup: &str, ttl: Duration) -> Result<()> {
        self.cache
            .set_raw(&Self::page_cache_key(url), markup.as_bytes(), ttl)
            .await
    }

    /// Cached page for `url`. Entries that are not valid UTF-8 count as a miss.
    pub async fn get_cached_page(&self, url: &str) -> Result<Option<String>> {
        let Some(raw) = self.cache.get_raw(&Self::page_cache_key(url)).await? else {
            return Ok(None);
        };

        match String::from_utf8(raw) {
            Ok(markup) => Ok(Some(markup)),
            Err(_) => {
                tracing::warn!("Discarding unreadable cache entry for {}", url);
                self.remove_page(url).await?;
                Ok(None)
            }
        }
    }

    pub async fn remove_page(&self, url: &str) -> Result<()> {
        self.cache.delete(&Self::page_cache_key(url)).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.cache.clear().await
    }
}
