use std::time::Duration;

use reqwest::{Client, Url};

use crate::{
    Error, Result,
    cache::{CacheBackend, CacheManager},
    layout::{DEFAULT_TIMEOUT_SECS, TIMETABLE_HOST, TIMETABLE_PATH_PREFIX},
};

/// Check that `url` points at a list-view timetable on the UNMC timetabling host.
///
/// The port is not checked since it changes between academic years.
pub fn validate_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;

    if parsed.host_str() != Some(TIMETABLE_HOST) {
        return Err(Error::InvalidUrl(format!(
            "{url}: the timetable must be served from {TIMETABLE_HOST}"
        )));
    }

    if !parsed.path().starts_with(TIMETABLE_PATH_PREFIX) {
        return Err(Error::InvalidUrl(format!(
            "{url}: make sure the timetable is in list view"
        )));
    }

    Ok(parsed)
}

/// Downloads timetable pages.
#[derive(Debug, Clone)]
pub struct TimetableClient {
    client: Client,
}

impl TimetableClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("unmc-ics/", env!("CARGO_PKG_VERSION")))
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::ACCEPT,
                    reqwest::header::HeaderValue::from_static("text/html,*/*;q=0.8"),
                );
                headers
            })
            .build()?;

        Ok(Self { client })
    }

    /// GET the page at `url` and return its body.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        tracing::info!("Fetching timetable: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| handle_error_req(url, e))?;

        if !response.status().is_success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                message: format!("HTTP {} error", response.status()),
            });
        }

        let markup = response
            .text()
            .await
            .map_err(|e| handle_error_req(url, e))?;
        tracing::debug!("Fetched {} bytes from {}", markup.len(), url);

        Ok(markup)
    }

    /// Like [`fetch`](Self::fetch), but served from `cache` when possible.
    ///
    /// Cache failures only cost a refetch; they never fail the request.
    pub async fn fetch_cached<C: CacheBackend>(
        &self,
        url: &str,
        cache: &CacheManager<C>,
        ttl: Duration,
    ) -> Result<String> {
        match cache.get_cached_page(url).await {
            Ok(Some(markup)) => {
                tracing::debug!("Timetable cache hit: {}", url);
                return Ok(markup);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Timetable cache read failed: {}", e),
        }

        let markup = self.fetch(url).await?;

        if let Err(e) = cache.cache_page(url, &markup, ttl).await {
            tracing::warn!("Timetable cache write failed: {}", e);
        }

        Ok(markup)
    }
}

fn handle_error_req(url: &str, error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::Timeout
    } else if error.is_request() || error.is_connect() {
        Error::Fetch {
            url: url.to_string(),
            message: format!("Request failed: {error}"),
        }
    } else {
        Error::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;

    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl CacheBackend for MemoryCache {
        async fn set_raw(&self, key: &str, value: &[u8], _ttl: Duration) -> Result<()> {
            self.entries
                .lock()
                .await
                .insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.entries.lock().await.get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.entries.lock().await.remove(key);
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            self.entries.lock().await.clear();
            Ok(())
        }
    }

    #[test]
    fn test_validate_url() {
        let url = "http://timetablingunmc.nottingham.ac.uk:8016/reporting/TextSpreadsheet;programme+of+study;id;UG/M1059/M6UCMPSC/F/02%0D%0A?days=1-5&weeks=1-52";
        assert!(validate_url(url).is_ok());
        assert!(
            validate_url("http://timetablingunmc.nottingham.ac.uk:8006/reporting/TextSpreadsheet;x")
                .is_ok()
        );

        for bad in [
            "not a url",
            "http://example.com/reporting/TextSpreadsheet;x",
            "http://timetablingunmc.nottingham.ac.uk:8016/reporting/Individual;x",
        ] {
            assert!(matches!(validate_url(bad), Err(Error::InvalidUrl(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn test_fetch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/reporting/TextSpreadsheet"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>Monday</p>"))
            .mount(&mock_server)
            .await;

        let client = TimetableClient::new().unwrap();
        let markup = client
            .fetch(&format!("{}/reporting/TextSpreadsheet", mock_server.uri()))
            .await
            .unwrap();
        assert_eq!(markup, "<p>Monday</p>");
    }

    #[tokio::test]
    async fn test_fetch_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = TimetableClient::new().unwrap();
        let err = client
            .fetch(&format!("{}/missing", mock_server.uri()))
            .await
            .unwrap_err();
        match err {
            Error::Fetch { message, .. } => assert!(message.contains("404")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let client = TimetableClient::with_timeout(1).unwrap();
        let err = client.fetch(&mock_server.uri()).await.unwrap_err();
        assert!(matches!(err, Error::Timeout), "{err:?}");
    }

    #[tokio::test]
    async fn test_fetch_cached() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<table></table>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = TimetableClient::new().unwrap();
        let cache = CacheManager::new(MemoryCache::default());
        let url = format!("{}/reporting/TextSpreadsheet", mock_server.uri());
        let ttl = Duration::from_secs(60);

        let first = client.fetch_cached(&url, &cache, ttl).await.unwrap();
        let second = client.fetch_cached(&url, &cache, ttl).await.unwrap();
        assert_eq!(first, "<table></table>");
        assert_eq!(first, second);
        assert_eq!(
            cache.get_cached_page(&url).await.unwrap().as_deref(),
            Some("<table></table>")
        );

        cache.remove_page(&url).await.unwrap();
        assert!(cache.get_cached_page(&url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_a_miss() {
        let backend = MemoryCache::default();
        backend
            .set_raw(
                &CacheManager::<MemoryCache>::page_cache_key("http://x"),
                &[0xff, 0xfe],
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let cache = CacheManager::new(backend);
        assert!(cache.get_cached_page("http://x").await.unwrap().is_none());
    }
}
