use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use unmc_ics_core::layout::DEFAULT_TIMEOUT_SECS;

use crate::handlers::create_app;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PAGE_CACHE_TTL_SECS: u64 = 60 * 60;

/// Settings read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    /// Page caching is disabled when unset.
    pub redis_url: Option<String>,
    pub page_cache_ttl: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        let request_timeout_secs =
            parse_var(&lookup, "REQUEST_TIMEOUT")?.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let page_cache_ttl = Duration::from_secs(
            parse_var(&lookup, "PAGE_CACHE_TTL")?.unwrap_or(DEFAULT_PAGE_CACHE_TTL_SECS),
        );
        let redis_url = lookup("REDIS_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            port,
            request_timeout_secs,
            redis_url,
            page_cache_ttl,
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|value| value.trim().parse::<T>())
        .transpose()
        .with_context(|| format!("Invalid value for {key}"))
}

pub async fn start_server(config: ServerConfig) -> Result<()> {
    let app = create_app(&config).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("UNMC ICS Server starting on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.page_cache_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("REQUEST_TIMEOUT", " 30 "),
            ("REDIS_URL", "redis://localhost:6379"),
            ("PAGE_CACHE_TTL", "60"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.page_cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("REQUEST_TIMEOUT", "ten")]).is_err());
        assert!(config(&[("PORT", "70000")]).is_err());
        assert_eq!(config(&[("REDIS_URL", "  ")]).unwrap().redis_url, None);
    }
}
